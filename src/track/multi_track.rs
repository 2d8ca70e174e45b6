//! Collections of tracks and the rebuild (re-segmentation) algorithm.

use std::collections::HashMap;
use std::ops::Add;

use chrono::{DateTime, Utc};
use log::info;

use super::{Track, TrackPoint, seconds_between};
use crate::geo_utils::haversine_distance;
use crate::reference::CaptureRecord;
use crate::{GpsPoint, RebuildConfig};

/// 1900-01-01T00:00:01Z, the timestamp of the rebuild sentinel.
const SENTINEL_TIMESTAMP: i64 = -2_208_988_799;

/// A point far away from, and long before, any real data.
///
/// Seeding the rebuild walk with it makes the first real point open a track.
fn rebuild_sentinel() -> TrackPoint {
    let time = DateTime::<Utc>::from_timestamp(SENTINEL_TIMESTAMP, 0)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    TrackPoint::new(GpsPoint::new(-90.0, 180.0), 0.0, time)
}

/// An insertion-ordered collection of [`Track`]s.
///
/// There is no ordering guarantee between tracks, and lookups that could be
/// answered by several tracks take the first one inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiTrack {
    pub(super) tracks: Vec<Track>,
}

impl MultiTrack {
    /// Create an empty multi-track.
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    /// Append a new empty track and return it for further appends.
    pub fn add_track(&mut self) -> &mut Track {
        self.push_track(Track::new())
    }

    /// Append an existing track and return it for further appends.
    pub fn push_track(&mut self, track: Track) -> &mut Track {
        self.tracks.push(track);
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    /// Append every track of `other`, keeping their order.
    pub fn extend_from(&mut self, other: MultiTrack) {
        self.tracks.extend(other.tracks);
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Total number of points across all tracks.
    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Iterate over every point of every track, track by track.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.tracks.iter().flat_map(|t| t.points().iter())
    }

    /// Sort every track by time.
    pub fn sort_tracks(&mut self) {
        for track in &mut self.tracks {
            track.sort_by_time();
        }
    }

    /// Estimate the position at `time` from the first track that covers it.
    ///
    /// Tracks are tried in insertion order. When several tracks overlap in time
    /// the earliest inserted one wins, regardless of which is "closer".
    pub fn interpolate(&self, time: DateTime<Utc>) -> Option<(GpsPoint, f64)> {
        self.tracks.iter().find_map(|track| track.interpolate(time))
    }

    /// Rebuild using the thresholds of a [`RebuildConfig`].
    pub fn rebuild_with(&mut self, config: &RebuildConfig) -> usize {
        self.rebuild(config.distance_delta, config.time_gap_delta, config.merge)
    }

    /// Re-segment every point of every track into new tracks.
    ///
    /// All points are sorted by time; a point with the same timestamp as the
    /// previous accepted point is dropped. A new track starts when the device
    /// moved at least `distance_delta` meters since the previous point, or when
    /// it stayed within `distance_delta` but more than `time_gap_delta` seconds
    /// went by.
    ///
    /// With `merge` set only the first such boundary is honoured: it opens a
    /// second track and every remaining point goes there.
    ///
    /// Returns the number of tracks after the rebuild.
    pub fn rebuild(&mut self, distance_delta: f64, time_gap_delta: f64, merge: bool) -> usize {
        info!(
            "[Rebuild] Start rebuilding multi track with {} tracks",
            self.tracks.len()
        );

        let mut points: Vec<TrackPoint> = self.points().copied().collect();
        points.sort_by_key(|p| p.time());

        let mut rebuilt: Vec<Track> = Vec::new();
        let mut current: Option<Track> = None;
        let mut prev = rebuild_sentinel();
        let mut split_taken = false;

        for point in points {
            if point.time() == prev.time() {
                continue;
            }
            let time_delta = seconds_between(prev.time(), point.time());
            let dist = haversine_distance(&prev.coordinate(), &point.coordinate());
            let boundary = dist >= distance_delta
                || (time_delta > time_gap_delta && dist < distance_delta);

            let split = match current {
                None => true,
                Some(_) => boundary && !(merge && split_taken),
            };

            if split {
                if let Some(done) = current.take() {
                    info!(
                        "[Rebuild] Split: dist = {} m, time_delta = {} s, vel = {} m/s ({} km/h), \
                         prev = {}, next = {}, num_points = {}",
                        dist as i64,
                        time_delta as i64,
                        (dist / time_delta) as i64,
                        (dist / time_delta * 3.6) as i64,
                        prev.time(),
                        point.time(),
                        done.len()
                    );
                    rebuilt.push(done);
                    split_taken = true;
                }
                current = Some(Track::new());
            }

            if let Some(track) = current.as_mut() {
                track.add(point);
            }
            prev = point;
        }
        rebuilt.extend(current);

        self.tracks = rebuilt;
        info!(
            "[Rebuild] Finished rebuilding multi track with {} tracks",
            self.tracks.len()
        );
        self.tracks.len()
    }

    /// Build tracks from captures that already carry a coordinate and a UTC time.
    ///
    /// With `split_by_camera` every camera gets its own track, in order of first
    /// appearance; captures without a camera (or all captures, without
    /// splitting) go to a catch-all track placed last. Empty tracks are dropped
    /// and every track is sorted.
    pub fn from_records<R: CaptureRecord>(records: &[R], split_by_camera: bool) -> Self {
        let mut multi = MultiTrack::new();
        let mut camera_tracks: HashMap<String, Track> = HashMap::new();
        let mut camera_order: Vec<String> = Vec::new();
        let mut catch_all = Track::new();

        for record in records {
            let (Some(coordinate), Some(time)) = (record.coordinate(), record.utc_time()) else {
                continue;
            };
            let point = TrackPoint::new(coordinate, record.elevation().unwrap_or(0.0), time);

            match record.camera().filter(|_| split_by_camera) {
                Some(camera) => {
                    let track = camera_tracks.entry(camera.to_string()).or_insert_with(|| {
                        camera_order.push(camera.to_string());
                        Track::new()
                    });
                    track.add(point);
                }
                None => catch_all.add(point),
            }
        }

        for camera in camera_order {
            if let Some(track) = camera_tracks.remove(&camera) {
                multi.push_track(track);
            }
        }
        multi.push_track(catch_all);

        multi.tracks.retain(|t| !t.is_empty());
        multi.sort_tracks();
        multi
    }
}

impl Add for MultiTrack {
    type Output = MultiTrack;

    /// Concatenate two multi-tracks, `self` first.
    fn add(mut self, other: MultiTrack) -> MultiTrack {
        self.extend_from(other);
        self
    }
}
