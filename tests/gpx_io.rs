//! Tests for GPX loading and export

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use geosync::{GeoSyncError, GpsPoint, MultiTrack, Track, TrackPoint};
use tempfile::tempdir;

const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="10.0" lon="20.0"><ele>100</ele><time>2023-06-01T12:00:00Z</time></trkpt>
      <trkpt lat="10.001" lon="20.002"><ele>110</ele><time>2023-06-01T12:00:10Z</time></trkpt>
      <trkpt lat="10.002" lon="20.004"><ele>120</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="11.0" lon="21.0"><time>2023-06-01T13:00:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

fn write_sample(dir: &Path, name: &str) {
    fs::write(dir.join(name), SAMPLE_GPX).unwrap();
}

#[test]
fn test_load_gpx_file_drops_points_without_time() {
    let dir = tempdir().unwrap();
    write_sample(dir.path(), "walk.gpx");

    let mut multi = MultiTrack::new();
    let loaded = multi.load_gpx_file(dir.path().join("walk.gpx")).unwrap();

    assert_eq!(loaded, 3);
    assert_eq!(multi.len(), 2);
    assert_eq!(multi.tracks()[0].len(), 2);
    // Missing elevation defaults to zero
    assert_eq!(multi.tracks()[1].points()[0].elevation(), 0.0);

    let t = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 5).unwrap();
    let (coord, elevation) = multi.interpolate(t).unwrap();
    assert!((coord.latitude - 10.0005).abs() < 1e-9);
    assert!((elevation - 105.0).abs() < 1e-9);
}

#[test]
fn test_load_gpx_file_reuses_trailing_empty_track() {
    let dir = tempdir().unwrap();
    write_sample(dir.path(), "walk.gpx");

    let mut multi = MultiTrack::new();
    multi.add_track();
    multi.load_gpx_file(dir.path().join("walk.gpx")).unwrap();
    assert_eq!(multi.len(), 2);
    assert!(multi.tracks().iter().all(|t| !t.is_empty()));
}

#[test]
fn test_load_invalid_gpx_appends_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.gpx");
    fs::write(&path, "<gpx><trk>").unwrap();

    let mut multi = MultiTrack::new();
    let result = multi.load_gpx_file(&path);
    assert!(matches!(result, Err(GeoSyncError::Gpx { .. })));
    assert!(multi.is_empty());
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let mut multi = MultiTrack::new();
    let result = multi.load_gpx_file(dir.path().join("missing.gpx"));
    assert!(matches!(result, Err(GeoSyncError::Io { .. })));
}

#[test]
fn test_load_folder_skips_own_track_and_bad_files() {
    let dir = tempdir().unwrap();
    write_sample(dir.path(), "a.gpx");
    write_sample(dir.path(), "B.GPX");
    write_sample(dir.path(), "_track.gpx");
    fs::write(dir.path().join("broken.gpx"), "not xml").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut multi = MultiTrack::new();
    let loaded = multi.load_gpx_folder(dir.path(), "_track.gpx").unwrap();

    assert_eq!(loaded, 6);
    assert_eq!(multi.len(), 4);
}

#[test]
fn test_save_and_reload() {
    let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
    let mut multi = MultiTrack::new();
    multi.push_track(Track::from_points(vec![
        TrackPoint::new(GpsPoint::new(10.0, 20.0), 100.0, t0),
        TrackPoint::new(
            GpsPoint::new(10.001, 20.002),
            110.0,
            t0 + chrono::Duration::seconds(10),
        ),
    ]));
    multi.push_track(Track::from_points(vec![TrackPoint::new(
        GpsPoint::new(11.0, 21.0),
        5.0,
        t0 + chrono::Duration::hours(1),
    )]));

    let dir = tempdir().unwrap();
    let path = dir.path().join("_track.gpx");
    multi.save_gpx(&path).unwrap();

    let mut reloaded = MultiTrack::new();
    reloaded.load_gpx_file(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.point_count(), 3);

    let first = reloaded.tracks()[0].points()[0];
    assert_eq!(first.time(), t0);
    assert!((first.latitude() - 10.0).abs() < 1e-9);
    assert!((first.elevation() - 100.0).abs() < 1e-9);
}

#[test]
fn test_to_gpx_layout() {
    let mut multi = MultiTrack::new();
    multi.add_track();
    multi.add_track();
    let gpx = multi.to_gpx();
    assert_eq!(gpx.tracks.len(), 2);
    assert!(gpx.tracks.iter().all(|t| t.segments.len() == 1));
    assert_eq!(gpx.creator.as_deref(), Some("geosync"));
}
