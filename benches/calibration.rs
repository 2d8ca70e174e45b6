//! Benchmarks for camera clock calibration.
//!
//! Run with: `cargo bench --bench calibration`
//!
//! Uses a synthetic walk with GPS noise and reference groups whose camera
//! clock is off by a known amount.

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geosync::{
    CalibrationConfig, ClockCalibrator, GpsPoint, MultiTrack, ReferenceGroup, Track, TrackPoint,
};
use rand::Rng;

const CAMERA: &str = "bench";
const OFFSET_SECONDS: i64 = 3_725;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 6, 0, 0).unwrap()
}

/// A noisy walk north-east, one point per second, about 1.4 m per step.
fn generate_walk(points: usize) -> Vec<TrackPoint> {
    let mut rng = rand::thread_rng();
    let noise_deg = 3.0 / 111_000.0;
    (0..points)
        .map(|i| {
            let lat = 45.0 + i as f64 * 0.00001 + rng.gen_range(-noise_deg..noise_deg);
            let lng = 7.0 + i as f64 * 0.00001 + rng.gen_range(-noise_deg..noise_deg);
            TrackPoint::new(
                GpsPoint::new(lat, lng),
                0.0,
                start() + Duration::seconds(i as i64),
            )
        })
        .collect()
}

/// `count` groups placed on the walk, with a few wrong clocks mixed in.
fn generate_groups(points: &[TrackPoint], count: usize) -> Vec<ReferenceGroup> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let p = points[rng.gen_range(0..points.len())];
            let jitter = if i % 5 == 4 {
                rng.gen_range(600..3600)
            } else {
                rng.gen_range(-20..20)
            };
            let local = (p.time() - Duration::seconds(OFFSET_SECONDS + jitter)).naive_utc();
            ReferenceGroup::new(format!("group-{}", i), CAMERA, local)
                .with_manual_coordinate(p.coordinate())
        })
        .collect()
}

fn bench_calibrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibrate");
    group.sample_size(10);

    let points = generate_walk(50_000);
    let mut tracks = MultiTrack::new();
    tracks.push_track(Track::from_points(points.iter().copied()));

    for count in [3, 6, 10] {
        let groups = generate_groups(&points, count);
        let config = CalibrationConfig {
            max_files_num: count,
            ..CalibrationConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("groups", count), &groups, |b, g| {
            b.iter(|| {
                ClockCalibrator::new(CAMERA, black_box(&tracks), g, config.clone()).calibrate()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_calibrate);
criterion_main!(benches);
