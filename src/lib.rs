//! # geosync
//!
//! Geo-temporal correlation engine for geotagging photo and video captures.
//!
//! This library provides:
//! - GPS tracks with time-indexed interpolation ([`Track`], [`MultiTrack`])
//! - Re-segmentation of raw point streams into coherent tracks ([`MultiTrack::rebuild`])
//! - A spatial address cache with approximate-match reuse ([`AddressCache`])
//! - Camera clock drift calibration against GPS tracks ([`ClockCalibrator`])
//! - GPX ingestion and export
//!
//! ## Features
//!
//! - **`parallel`** - Prepare calibration candidate sets in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use geosync::{GpsPoint, Track, TrackPoint};
//!
//! let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
//! let mut track = Track::new();
//! track.add(TrackPoint::new(GpsPoint::new(10.0, 20.0), 100.0, t0));
//! track.add(TrackPoint::new(
//!     GpsPoint::new(10.001, 20.002),
//!     110.0,
//!     t0 + chrono::Duration::seconds(10),
//! ));
//!
//! let (coord, elevation) = track.interpolate(t0 + chrono::Duration::seconds(5)).unwrap();
//! assert!((coord.latitude - 10.0005).abs() < 1e-9);
//! assert!((elevation - 105.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{GeoSyncError, Result};

// Engine configuration
pub mod config;
pub use config::{AddressCacheConfig, CalibrationConfig, EngineConfig, RebuildConfig};

// Geographic utilities (distance, degree windowing)
pub mod geo_utils;

// Tracks, multi-tracks, rebuild and GPX io
pub mod track;
pub use track::{MultiTrack, Track, TrackPoint};

// Spatial address cache and its collaborators
pub mod address;
pub use address::{Address, AddressCache, AddressResolver, AddressStore, JsonFileStore};

// Calibration inputs
pub mod reference;
pub use reference::{
    CaptureRecord, CoordinateSource, ReferenceGroup, TimeZoneLookup, TimeZoneSource,
};

// Camera clock calibration
pub mod calibration;
pub use calibration::{
    Calibration, ClockCalibrator, CorrectedGroup, apply_calibration, locate_groups,
};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use geosync::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a set of points.
///
/// Starts out inverted (south 90, north -90, west 180, east -180) so that the
/// first [`Bounds::extend`] collapses it onto that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    /// Bounds that contain nothing yet.
    pub fn empty() -> Self {
        Self {
            min_lat: 90.0,
            max_lat: -90.0,
            min_lng: 180.0,
            max_lng: -180.0,
        }
    }

    /// Grow the bounds to include `point`.
    pub fn extend(&mut self, point: &GpsPoint) {
        self.min_lat = self.min_lat.min(point.latitude);
        self.max_lat = self.max_lat.max(point.latitude);
        self.min_lng = self.min_lng.min(point.longitude);
        self.max_lng = self.max_lng.max(point.longitude);
    }

    /// True until the first point has been added.
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}
