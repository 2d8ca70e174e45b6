//! Tests for camera clock calibration

use chrono::{DateTime, Duration, TimeZone, Utc};
use geosync::{
    Calibration, CalibrationConfig, ClockCalibrator, CoordinateSource, GeoSyncError, GpsPoint,
    MultiTrack, ReferenceGroup, Track, TrackPoint, apply_calibration, locate_groups,
};

const CAMERA: &str = "canon";
/// Real capture time minus camera clock time
const TRUE_OFFSET: i64 = 120;
const STEP_DEG: f64 = 0.002;
const STEP_SECONDS: i64 = 10;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 8, 0, 0).unwrap()
}

/// A straight walk north: one point every 10 s, 0.002 degrees apart.
fn walk() -> MultiTrack {
    let points = (0..200).map(|i| {
        TrackPoint::new(
            GpsPoint::new(45.0 + i as f64 * STEP_DEG, 7.0),
            300.0 + i as f64,
            t0() + Duration::seconds(i * STEP_SECONDS),
        )
    });
    let mut multi = MultiTrack::new();
    multi.push_track(Track::from_points(points));
    multi
}

/// A group shot at track index `index`, `east` degrees off the track, with a
/// camera clock that is `TRUE_OFFSET + jitter` seconds behind.
fn group(name: &str, index: i64, east: f64, jitter: i64) -> ReferenceGroup {
    let utc = t0() + Duration::seconds(index * STEP_SECONDS);
    let local = (utc - Duration::seconds(TRUE_OFFSET + jitter)).naive_utc();
    ReferenceGroup::new(name, CAMERA, local)
        .with_manual_coordinate(GpsPoint::new(45.0 + index as f64 * STEP_DEG, 7.0 + east))
}

fn cluster() -> Vec<ReferenceGroup> {
    vec![
        group("g1", 10, 0.0, -10),
        group("g2", 50, 0.0, 0),
        group("g3", 100, 0.0, 5),
        group("g4", 150, 0.0, 10),
    ]
}

#[test]
fn test_calibrate_finds_clustered_offset() {
    let tracks = walk();
    let groups = cluster();
    let config = CalibrationConfig::default();
    let threshold = config.spread_threshold();

    let calibration = ClockCalibrator::new(CAMERA, &tracks, &groups, config)
        .calibrate()
        .unwrap()
        .expect("four agreeing groups should calibrate");

    assert!(calibration.offset_seconds >= 110.0 && calibration.offset_seconds <= 130.0);
    assert!(calibration.spread < threshold);
    assert!(calibration.used_groups.len() >= 3);
    assert!(calibration.settled);
    assert_eq!(calibration.camera, CAMERA);
    assert_eq!(calibration.distance_delta, 5.0);
}

#[test]
fn test_calibrate_two_groups_is_not_enough() {
    let tracks = walk();
    let groups = vec![group("g1", 10, 0.0, 0), group("g2", 50, 0.0, 0)];

    let result = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default())
        .calibrate()
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_calibrate_lower_min_files() {
    let tracks = walk();
    let groups = vec![group("g1", 10, 0.0, 0), group("g2", 50, 0.0, 0)];
    let config = CalibrationConfig {
        min_files_num: 2,
        ..CalibrationConfig::default()
    };

    let calibration = ClockCalibrator::new(CAMERA, &tracks, &groups, config)
        .calibrate()
        .unwrap()
        .unwrap();
    assert_eq!(calibration.offset_seconds, TRUE_OFFSET as f64);
    assert_eq!(calibration.spread, 0);
}

#[test]
fn test_calibrate_ignores_outlier_group() {
    let tracks = walk();
    let mut groups = cluster();
    groups.push(group("wrong_clock", 120, 0.0, 3000));

    let calibration = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default())
        .calibrate()
        .unwrap()
        .unwrap();
    assert!(calibration.offset_seconds >= 110.0 && calibration.offset_seconds <= 130.0);
    assert!(!calibration.used_groups.contains(&"wrong_clock".to_string()));
    assert_eq!(calibration.used_groups.len(), 4);
}

#[test]
fn test_calibrate_widens_search_radius() {
    // 0.0015 degrees is 16.5 m at 11000 m per degree
    let tracks = walk();
    let groups: Vec<ReferenceGroup> = vec![
        group("g1", 10, 0.0015, 0),
        group("g2", 50, 0.0015, 0),
        group("g3", 100, 0.0015, 0),
    ];

    let calibration = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default())
        .calibrate()
        .unwrap()
        .unwrap();
    assert_eq!(calibration.distance_delta, 20.0);
    assert_eq!(calibration.offset_seconds, TRUE_OFFSET as f64);
}

#[test]
fn test_calibrate_without_tracks() {
    let tracks = MultiTrack::new();
    let groups = cluster();
    let result = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default())
        .calibrate()
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_calibrate_without_confirmed_groups() {
    let tracks = walk();
    let mut groups = cluster();
    for g in &mut groups {
        g.coordinate_source = CoordinateSource::Device;
    }
    let calibrator = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default());
    assert!(calibrator.reference_groups().is_empty());
    assert!(calibrator.calibrate().unwrap().is_none());
}

#[test]
fn test_calibrate_groups_far_from_tracks() {
    let tracks = walk();
    let groups: Vec<ReferenceGroup> = (0..4)
        .map(|i| group(&format!("g{}", i), i * 40, 0.1, 0))
        .collect();
    let result = ClockCalibrator::new(CAMERA, &tracks, &groups, CalibrationConfig::default())
        .calibrate()
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_calibrator_selects_camera_and_limits_files() {
    let tracks = walk();
    let mut groups = cluster();
    let mut other = group("other", 20, 0.0, 0);
    other.camera = "phone".to_string();
    groups.insert(0, other);

    let config = CalibrationConfig {
        max_files_num: 2,
        ..CalibrationConfig::default()
    };
    let calibrator = ClockCalibrator::new(CAMERA, &tracks, &groups, config);
    let names: Vec<&str> = calibrator
        .reference_groups()
        .iter()
        .map(|g| g.name.as_str())
        .collect();
    assert_eq!(names, vec!["g1", "g2"]);
    assert!(calibrator.calibrate().unwrap().is_none());
}

#[test]
fn test_calibrate_rejects_bad_config() {
    let tracks = walk();
    let groups = cluster();
    let config = CalibrationConfig {
        distance_step: 0.0,
        ..CalibrationConfig::default()
    };
    let result = ClockCalibrator::new(CAMERA, &tracks, &groups, config).calibrate();
    assert!(matches!(result, Err(GeoSyncError::Config(_))));
}

#[test]
fn test_calibrate_rejects_nan_distance_step() {
    let tracks = walk();
    let groups = vec![group("g1", 10, 0.0, 0)];
    let config = CalibrationConfig {
        distance_step: f64::NAN,
        ..CalibrationConfig::default()
    };
    let result = ClockCalibrator::new(CAMERA, &tracks, &groups, config).calibrate();
    assert!(matches!(result, Err(GeoSyncError::Config(_))));
}

fn calibration(offset_seconds: f64) -> Calibration {
    Calibration {
        camera: CAMERA.to_string(),
        offset_seconds,
        spread: 0,
        distance_delta: 5.0,
        offsets: vec![offset_seconds as i64],
        used_groups: Vec::new(),
        settled: true,
    }
}

#[test]
fn test_corrected_time_adds_offset() {
    let c = calibration(120.5);
    let baseline = t0();
    assert_eq!(
        c.corrected_time(baseline),
        baseline + Duration::milliseconds(120_500)
    );
    assert_eq!(calibration(-30.0).corrected_time(baseline), baseline - Duration::seconds(30));
}

#[test]
fn test_apply_and_locate_groups() {
    let tracks = walk();
    let mut groups = cluster();
    // A capture of the same camera without any coordinate, at track index 30
    let utc = t0() + Duration::seconds(30 * STEP_SECONDS);
    groups.push(ReferenceGroup::new(
        "unplaced",
        CAMERA,
        (utc - Duration::seconds(TRUE_OFFSET)).naive_utc(),
    ));
    groups.push(ReferenceGroup::new("phone", "phone", utc.naive_utc()));

    let mut corrected = apply_calibration(&groups, &calibration(TRUE_OFFSET as f64));
    assert_eq!(corrected.len(), 5);

    let located = locate_groups(&tracks, &mut corrected);
    assert_eq!(located, 1);

    let unplaced = corrected.iter().find(|g| g.name == "unplaced").unwrap();
    assert_eq!(unplaced.utc_time, utc);
    assert_eq!(unplaced.coordinate_source, CoordinateSource::Track);
    let coord = unplaced.coordinate.unwrap();
    assert!((coord.latitude - (45.0 + 30.0 * STEP_DEG)).abs() < 1e-9);
    assert_eq!(unplaced.elevation, Some(330.0));

    // Hand-placed groups are never moved
    let g1 = corrected.iter().find(|g| g.name == "g1").unwrap();
    assert_eq!(g1.coordinate_source, CoordinateSource::Manual);
    assert!(g1.elevation.is_none());
}
