//! GPX ingestion and export for [`MultiTrack`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use geo::Point;
use gpx::{Gpx, GpxVersion, TrackSegment, Waypoint};
use log::{info, warn};
use time::OffsetDateTime;

use super::{MultiTrack, Track, TrackPoint};
use crate::error::{GeoSyncError, Result};
use crate::GpsPoint;

fn gpx_time_to_utc(time: gpx::Time) -> Option<DateTime<Utc>> {
    let odt: OffsetDateTime = time.into();
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

fn utc_to_gpx_time(time: DateTime<Utc>) -> Option<gpx::Time> {
    let nanos = time.timestamp_nanos_opt()?;
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
        .ok()
        .map(gpx::Time::from)
}

fn read_gpx(path: &Path) -> Result<Gpx> {
    let file = File::open(path).map_err(|e| GeoSyncError::io(path, e))?;
    let reader = BufReader::new(file);
    gpx::read(reader).map_err(|e| GeoSyncError::gpx(path, e))
}

/// Convert one GPX segment into a track, dropping points without a valid
/// timestamp or coordinate.
fn segment_to_track(segment: &TrackSegment) -> Track {
    let mut track = Track::new();
    for waypoint in &segment.points {
        let Some(time) = waypoint.time.clone().and_then(gpx_time_to_utc) else {
            continue;
        };
        let point = waypoint.point();
        let coordinate = GpsPoint::new(point.y(), point.x());
        if !coordinate.is_valid() {
            continue;
        }
        track.add(TrackPoint::new(
            coordinate,
            waypoint.elevation.unwrap_or(0.0),
            time,
        ));
    }
    track.sort_by_time();
    track
}

fn is_gpx_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gpx"))
}

impl MultiTrack {
    /// Load every track segment of a GPX file as its own track.
    ///
    /// Points without a timestamp are dropped. Nothing is appended when the
    /// file cannot be read or parsed. Returns the number of points loaded.
    pub fn load_gpx_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let gpx = read_gpx(path)?;

        let loaded: Vec<Track> = gpx
            .tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .map(segment_to_track)
            .filter(|t| !t.is_empty())
            .collect();
        let point_count: usize = loaded.iter().map(Track::len).sum();

        // Reuse a trailing empty track instead of leaving it behind
        if self.tracks.last().is_some_and(Track::is_empty) && !loaded.is_empty() {
            self.tracks.pop();
        }
        self.tracks.extend(loaded);

        info!(
            "[Gpx] Loaded {} points from {}",
            point_count,
            path.display()
        );
        Ok(point_count)
    }

    /// Load every `*.gpx` file of a folder (not recursive), in file name order.
    ///
    /// The file called `own_track_file_name` is skipped so the engine never
    /// re-ingests a track it exported itself. Files that fail to parse are
    /// logged and skipped. Returns the number of points loaded.
    pub fn load_gpx_folder(
        &mut self,
        folder: impl AsRef<Path>,
        own_track_file_name: &str,
    ) -> Result<usize> {
        let folder = folder.as_ref();
        info!("[Gpx] {}: Loading gpx files", folder.display());

        let entries = fs::read_dir(folder).map_err(|e| GeoSyncError::io(folder, e))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_gpx_file(path))
            .collect();
        paths.sort();

        let mut total = 0;
        for path in paths {
            let is_own_track = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name == own_track_file_name);
            if is_own_track {
                continue;
            }
            match self.load_gpx_file(&path) {
                Ok(count) => total += count,
                Err(e) => warn!("[Gpx] Skipping {}: {}", path.display(), e),
            }
        }
        Ok(total)
    }

    /// Convert to a GPX 1.1 document: one `<trk>` with one `<trkseg>` per track.
    pub fn to_gpx(&self) -> Gpx {
        let mut gpx = Gpx {
            version: GpxVersion::Gpx11,
            creator: Some("geosync".to_string()),
            ..Default::default()
        };

        for track in &self.tracks {
            let mut segment = TrackSegment::new();
            for p in track.points() {
                let mut waypoint = Waypoint::new(Point::new(p.longitude(), p.latitude()));
                waypoint.elevation = Some(p.elevation());
                waypoint.time = utc_to_gpx_time(p.time());
                segment.points.push(waypoint);
            }
            let mut gpx_track = gpx::Track::new();
            gpx_track.segments.push(segment);
            gpx.tracks.push(gpx_track);
        }
        gpx
    }

    /// Write all tracks to a GPX file.
    pub fn save_gpx(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| GeoSyncError::io(path, e))?;
        let writer = BufWriter::new(file);
        gpx::write(&self.to_gpx(), writer).map_err(|e| GeoSyncError::gpx(path, e))?;
        info!(
            "[Gpx] Multi track with {} tracks saved to {}",
            self.tracks.len(),
            path.display()
        );
        Ok(())
    }
}
