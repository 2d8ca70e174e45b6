//! # Tracks
//!
//! Time-indexed GPS tracks:
//! - [`TrackPoint`] - immutable spatio-temporal sample
//! - [`Track`] - time-sorted points with a running bounding box and
//!   binary-search interpolation
//! - [`MultiTrack`] - insertion-ordered collection of tracks with rebuild,
//!   GPX ingestion and export

mod gpx_io;
mod multi_track;

pub use multi_track::MultiTrack;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{Bounds, GpsPoint};

/// A single GPS sample: where the device was, at what elevation, and when (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    coordinate: GpsPoint,
    elevation: f64,
    time: DateTime<Utc>,
}

impl TrackPoint {
    pub fn new(coordinate: GpsPoint, elevation: f64, time: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            elevation,
            time,
        }
    }

    pub fn coordinate(&self) -> GpsPoint {
        self.coordinate
    }

    pub fn latitude(&self) -> f64 {
        self.coordinate.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.coordinate.longitude
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Signed number of seconds from `from` to `to`.
///
/// Nanosecond resolution; spans too long for that (about 292 years) fall
/// back to microseconds.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => delta.num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6,
    }
}

/// One continuous recorded path segment.
///
/// Points are kept in insertion order. Interpolation requires the track to be
/// sorted by time: appends in non-decreasing time order keep it sorted, any
/// out-of-order append requires a [`Track::sort_by_time`] call first.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    points: Vec<TrackPoint>,
    bounds: Bounds,
    sorted: bool,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    /// Create an empty track.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            bounds: Bounds::empty(),
            sorted: true,
        }
    }

    /// Build a track from points in any order. The result is sorted.
    pub fn from_points(points: impl IntoIterator<Item = TrackPoint>) -> Self {
        let mut track = Self::new();
        for point in points {
            track.add(point);
        }
        track.sort_by_time();
        track
    }

    /// Append a point and grow the bounding box.
    pub fn add(&mut self, point: TrackPoint) {
        if let Some(last) = self.points.last() {
            if point.time < last.time {
                self.sorted = false;
            }
        }
        self.bounds.extend(&point.coordinate);
        self.points.push(point);
    }

    /// Stable sort by timestamp. Idempotent.
    pub fn sort_by_time(&mut self) {
        if !self.sorted {
            self.points.sort_by_key(|p| p.time);
            self.sorted = true;
        }
    }

    /// Whether the points are known to be in non-decreasing time order.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Running bounding box of every point ever added.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn first(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    /// First and last timestamp of a sorted, non-empty track.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.points.first()?.time, self.points.last()?.time))
    }

    /// Estimate where the device was at `time`.
    ///
    /// Returns `None` when `time` lies outside the track. A timestamp that
    /// matches a point exactly returns that point unchanged; otherwise
    /// latitude, longitude and elevation are linearly interpolated between the
    /// bracketing points. Elevation is reported as `0.0` when both bracketing
    /// elevations are equal.
    ///
    /// O(log n). An unsorted track never matches.
    pub fn interpolate(&self, time: DateTime<Utc>) -> Option<(GpsPoint, f64)> {
        if !self.sorted {
            warn!(
                "[Track] Interpolation on an unsorted track of {} points refused",
                self.points.len()
            );
            return None;
        }

        let first = self.points.first()?;
        let last = self.points.last()?;
        if time < first.time || time > last.time {
            return None;
        }

        // First point at or after `time`; always in range because time <= last.time
        let idx = self.points.partition_point(|p| p.time < time);
        let right = &self.points[idx];
        if right.time == time {
            return Some((right.coordinate, right.elevation));
        }

        // idx > 0 because time > first.time
        let left = &self.points[idx - 1];
        let k = seconds_between(left.time, time) / seconds_between(left.time, right.time);

        let latitude = left.latitude() + k * (right.latitude() - left.latitude());
        let longitude = left.longitude() + k * (right.longitude() - left.longitude());
        let elevation = if right.elevation != left.elevation {
            left.elevation + k * (right.elevation - left.elevation)
        } else {
            0.0
        };

        Some((GpsPoint::new(latitude, longitude), elevation))
    }
}
