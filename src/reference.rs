//! Calibration inputs: reference groups and the capture-record interface.
//!
//! A reference group is the evidence for one physical capture event: a
//! coordinate confirmed by hand plus the capture time as the (possibly
//! drifting) camera clock recorded it.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::GpsPoint;

/// Read-only view of a captured file, whatever it was loaded from.
///
/// Only the file path, tags and coordinate are required; the rest default to
/// "unknown".
pub trait CaptureRecord {
    fn file_path(&self) -> &Path;

    fn tags(&self) -> &[String];

    fn coordinate(&self) -> Option<GpsPoint>;

    fn elevation(&self) -> Option<f64> {
        None
    }

    fn camera(&self) -> Option<&str> {
        None
    }

    fn utc_time(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Where a reference group's coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Recorded by the device itself.
    #[default]
    Device,
    /// Entered or confirmed by hand. Only these count as ground truth.
    Manual,
    /// Interpolated from a GPS track.
    Track,
}

/// How to assign a time zone to a group.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeZoneSource {
    /// Look the zone up from a coordinate.
    ByCoordinate(GpsPoint),
    /// Use an IANA zone name as given.
    ByName(String),
}

/// Coordinate to IANA time zone name lookup.
pub trait TimeZoneLookup {
    fn zone_at(&self, coordinate: &GpsPoint) -> Option<String>;
}

impl<F> TimeZoneLookup for F
where
    F: Fn(&GpsPoint) -> Option<String>,
{
    fn zone_at(&self, coordinate: &GpsPoint) -> Option<String> {
        self(coordinate)
    }
}

/// One capture event used as calibration evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGroup {
    pub name: String,
    pub camera: String,
    pub coordinate: Option<GpsPoint>,
    #[serde(default)]
    pub coordinate_source: CoordinateSource,
    /// Capture time as read from the camera clock, without zone information.
    pub local_time: NaiveDateTime,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl ReferenceGroup {
    pub fn new(
        name: impl Into<String>,
        camera: impl Into<String>,
        local_time: NaiveDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            camera: camera.into(),
            coordinate: None,
            coordinate_source: CoordinateSource::Device,
            local_time,
            time_zone: None,
        }
    }

    /// Attach a coordinate confirmed by hand.
    pub fn with_manual_coordinate(mut self, coordinate: GpsPoint) -> Self {
        self.coordinate = Some(coordinate);
        self.coordinate_source = CoordinateSource::Manual;
        self
    }

    /// Build a group from a capture record's path, camera and coordinate.
    pub fn from_record<R: CaptureRecord>(
        record: &R,
        local_time: NaiveDateTime,
        coordinate_source: CoordinateSource,
    ) -> Self {
        let name = record
            .file_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            camera: record.camera().unwrap_or_default().to_string(),
            coordinate: record.coordinate(),
            coordinate_source,
            local_time,
            time_zone: None,
        }
    }

    /// The local capture time reinterpreted as UTC.
    ///
    /// This is not a true UTC instant, only a zero point that candidate
    /// offsets are measured from.
    pub fn baseline(&self) -> DateTime<Utc> {
        self.local_time.and_utc()
    }

    /// Whether the group can serve as calibration ground truth.
    pub fn is_confirmed(&self) -> bool {
        self.coordinate.is_some() && self.coordinate_source == CoordinateSource::Manual
    }

    /// Assign the group's time zone. Returns the zone set, if any.
    pub fn set_time_zone(
        &mut self,
        source: TimeZoneSource,
        lookup: &dyn TimeZoneLookup,
    ) -> Option<&str> {
        let zone = match source {
            TimeZoneSource::ByCoordinate(coordinate) => lookup.zone_at(&coordinate),
            TimeZoneSource::ByName(name) => Some(name),
        };
        if let Some(zone) = &zone {
            info!("[Reference] {} got time zone {}", self.name, zone);
        }
        self.time_zone = zone;
        self.time_zone.as_deref()
    }
}
