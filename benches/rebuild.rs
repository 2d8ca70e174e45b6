//! Benchmarks for track rebuilding and interpolation.
//!
//! Run with: `cargo bench --bench rebuild`

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geosync::{GpsPoint, MultiTrack, Track, TrackPoint};
use rand::Rng;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 6, 0, 0).unwrap()
}

/// A day of logging: `days` walks, one point every 5 s, with a night pause
/// and a long jump between days.
fn generate_days(days: usize, points_per_day: usize) -> MultiTrack {
    let mut rng = rand::thread_rng();
    let mut multi = MultiTrack::new();

    for day in 0..days {
        let day_start = start() + Duration::days(day as i64);
        let (mut lat, mut lng) = (45.0 + day as f64 * 0.5, 7.0);
        let track = multi.add_track();
        for i in 0..points_per_day {
            lat += rng.gen_range(-0.0001..0.0002);
            lng += rng.gen_range(-0.0001..0.0002);
            track.add(TrackPoint::new(
                GpsPoint::new(lat, lng),
                rng.gen_range(200.0..400.0),
                day_start + Duration::seconds(i as i64 * 5),
            ));
        }
    }
    multi
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    for days in [1, 7, 30] {
        let multi = generate_days(days, 5_000);
        group.bench_with_input(BenchmarkId::new("days", days), &multi, |b, m| {
            b.iter(|| {
                let mut copy = m.clone();
                copy.rebuild(black_box(1000.0), black_box(21600.0), false)
            })
        });
    }

    group.finish();
}

fn bench_interpolate(c: &mut Criterion) {
    let multi = generate_days(7, 5_000);
    let track: &Track = &multi.tracks()[3];
    let (first, last) = track.time_span().unwrap();
    let middle = first + (last - first) / 2;

    c.bench_function("interpolate_single_track", |b| {
        b.iter(|| track.interpolate(black_box(middle)))
    });

    // Worst case for the multi-track scan: only the last track covers the instant
    let late = multi.tracks()[6].time_span().unwrap().0 + Duration::seconds(1);
    c.bench_function("interpolate_multi_track_last", |b| {
        b.iter(|| multi.interpolate(black_box(late)))
    });
}

criterion_group!(benches, bench_rebuild, bench_interpolate);
criterion_main!(benches);
