//! Engine configuration.
//!
//! Every section has sensible defaults, so a configuration file only needs to
//! mention the values it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSyncError, Result};

/// Parameters for [`MultiTrack::rebuild`](crate::MultiTrack::rebuild).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Movement that always starts a new track, in meters.
    /// Default: 1000.0
    pub distance_delta: f64,

    /// Idle gap that starts a new track when the device did not move, in seconds.
    /// Default: 21600 (6 hours)
    pub time_gap_delta: f64,

    /// Honour only the first split boundary.
    /// Default: false
    pub merge: bool,

    /// File name of the track the engine exports itself. Skipped by folder loads.
    /// Default: "_track.gpx"
    pub own_track_file_name: String,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            distance_delta: 1000.0,
            time_gap_delta: 21600.0,
            merge: false,
            own_track_file_name: "_track.gpx".to_string(),
        }
    }
}

/// Parameters for [`ClockCalibrator`](crate::ClockCalibrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Half-width of the tolerance interval around each candidate offset, in seconds.
    /// Default: 60
    pub time_delta: i64,

    /// Initial search radius around each reference group, in meters.
    /// Default: 5.0
    pub min_dist_delta: f64,

    /// Largest search radius, in meters. Track points farther away are never considered.
    /// Default: 50.0
    pub max_dist_delta: f64,

    /// Radius increment between widening iterations, in meters.
    /// Default: 5.0
    pub distance_step: f64,

    /// Minimum number of agreeing reference groups for a result. Clamped to at least 1.
    /// Default: 3
    pub min_files_num: usize,

    /// Maximum number of reference groups taken into the search.
    /// Default: 10
    pub max_files_num: usize,

    /// Stop once the best spread is below `spread_stop_multiple * time_delta`.
    /// Default: 2
    pub spread_stop_multiple: i64,

    /// Fixed conversion used for the spatial windowing step only.
    /// Default: 11000.0
    pub meters_per_degree: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            time_delta: 60,
            min_dist_delta: 5.0,
            max_dist_delta: 50.0,
            distance_step: 5.0,
            min_files_num: 3,
            max_files_num: 10,
            spread_stop_multiple: 2,
            meters_per_degree: 11_000.0,
        }
    }
}

impl CalibrationConfig {
    /// Spread below which the widening loop stops, in seconds.
    pub fn spread_threshold(&self) -> i64 {
        self.spread_stop_multiple * self.time_delta
    }

    /// Check the values that would make the widening loop misbehave.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_dist_delta", self.min_dist_delta),
            ("max_dist_delta", self.max_dist_delta),
            ("distance_step", self.distance_step),
            ("meters_per_degree", self.meters_per_degree),
        ] {
            if !value.is_finite() {
                return Err(GeoSyncError::Config(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if self.distance_step <= 0.0 {
            return Err(GeoSyncError::Config(format!(
                "distance_step must be positive, got {}",
                self.distance_step
            )));
        }
        if self.meters_per_degree <= 0.0 {
            return Err(GeoSyncError::Config(format!(
                "meters_per_degree must be positive, got {}",
                self.meters_per_degree
            )));
        }
        if self.time_delta < 0 {
            return Err(GeoSyncError::Config(format!(
                "time_delta must not be negative, got {}",
                self.time_delta
            )));
        }
        if self.min_dist_delta > self.max_dist_delta {
            return Err(GeoSyncError::Config(format!(
                "min_dist_delta {} exceeds max_dist_delta {}",
                self.min_dist_delta, self.max_dist_delta
            )));
        }
        Ok(())
    }
}

/// Parameters for [`AddressCache`](crate::AddressCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressCacheConfig {
    /// A cached address is reused for coordinates closer than this, in meters.
    /// Default: 50.0
    pub min_distance: f64,

    /// Flush to the store once more than this many entries were added.
    /// Default: 100
    pub flush_threshold: usize,

    /// Cache a `geo_point` pseudo-address when the resolver finds nothing.
    /// Default: false
    pub use_geo_point: bool,
}

impl Default for AddressCacheConfig {
    fn default() -> Self {
        Self {
            min_distance: 50.0,
            flush_threshold: 100,
            use_geo_point: false,
        }
    }
}

/// All engine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rebuild: RebuildConfig,
    pub calibration: CalibrationConfig,
    pub address_cache: AddressCacheConfig,
}

impl EngineConfig {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| GeoSyncError::io(path, e))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.calibration.validate()?;
        Ok(config)
    }
}
