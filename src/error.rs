//! Unified error type for the I/O boundaries of the engine.
//!
//! The correlation core itself never fails: missing data is reported as
//! `None`. Errors only come from reading or writing files.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving engine data.
#[derive(Debug, Error)]
pub enum GeoSyncError {
    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A GPX document could not be parsed or written.
    #[error("GPX error on {path}: {source}")]
    Gpx {
        path: PathBuf,
        #[source]
        source: gpx::errors::GpxError,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GeoSyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn gpx(path: impl Into<PathBuf>, source: gpx::errors::GpxError) -> Self {
        Self::Gpx {
            path: path.into(),
            source,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GeoSyncError>;
