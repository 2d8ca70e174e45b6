//! geosync CLI - Inspect tracks, rebuild them and calibrate camera clocks
//!
//! Usage:
//!   geosync-cli rebuild <path> [--distance-delta <m>] [--time-gap <s>] [--merge] [--output <file>]
//!   geosync-cli locate <path> <time>...
//!   geosync-cli calibrate <path> <groups.json> --camera <id> [--output <file>]
//!
//! `<path>` is either a single GPX file or a folder of them. Every command
//! accepts `--config <file>` with an `EngineConfig` JSON document.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use geosync::{
    ClockCalibrator, EngineConfig, GeoSyncError, MultiTrack, ReferenceGroup, Result,
    apply_calibration, locate_groups,
};

#[derive(Parser)]
#[command(name = "geosync-cli")]
#[command(
    about = "Track rebuilding, interpolation and camera clock calibration",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (JSON); missing fields use the defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-segment tracks by distance and time gaps
    Rebuild {
        /// GPX file or folder of GPX files
        path: PathBuf,

        /// Split when consecutive points are at least this far apart (meters)
        #[arg(long)]
        distance_delta: Option<f64>,

        /// Split on pauses longer than this (seconds)
        #[arg(long)]
        time_gap: Option<f64>,

        /// Keep everything after the first split in one track
        #[arg(long)]
        merge: bool,

        /// Write the rebuilt tracks to this GPX file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Interpolate coordinates for UTC instants (RFC 3339)
    Locate {
        /// GPX file or folder of GPX files
        path: PathBuf,

        /// Instants to locate, e.g. 2023-06-01T12:00:05Z
        #[arg(required = true)]
        times: Vec<String>,
    },

    /// Estimate a camera's clock offset from reference groups
    Calibrate {
        /// GPX file or folder of GPX files
        path: PathBuf,

        /// JSON array of reference groups
        groups: PathBuf,

        /// Camera to calibrate
        #[arg(long)]
        camera: String,

        /// Write the corrected groups to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Rebuild {
            path,
            distance_delta,
            time_gap,
            merge,
            output,
        } => {
            let mut rebuild = config.rebuild.clone();
            if let Some(distance_delta) = distance_delta {
                rebuild.distance_delta = distance_delta;
            }
            if let Some(time_gap) = time_gap {
                rebuild.time_gap_delta = time_gap;
            }
            rebuild.merge |= merge;
            run_rebuild(&path, &config, &rebuild, output.as_deref(), cli.verbose)
        }
        Commands::Locate { path, times } => run_locate(&path, &config, &times),
        Commands::Calibrate {
            path,
            groups,
            camera,
            output,
        } => run_calibrate(&path, &groups, &camera, &config, output.as_deref(), cli.verbose),
    }
}

/// Load a single GPX file or every GPX file of a folder
fn load_tracks(path: &Path, config: &EngineConfig) -> Result<MultiTrack> {
    let mut tracks = MultiTrack::new();
    if path.is_dir() {
        tracks.load_gpx_folder(path, &config.rebuild.own_track_file_name)?;
    } else {
        tracks.load_gpx_file(path)?;
    }
    println!(
        "Loaded {} tracks with {} points from {}",
        tracks.len(),
        tracks.point_count(),
        path.display()
    );
    Ok(tracks)
}

fn print_tracks(tracks: &MultiTrack) {
    for (i, track) in tracks.tracks().iter().enumerate() {
        match track.time_span() {
            Some((start, end)) => {
                let center = track.bounds().center();
                println!(
                    "  Track {}: {} points, {} .. {}, center ({:.5}, {:.5})",
                    i + 1,
                    track.len(),
                    start.to_rfc3339(),
                    end.to_rfc3339(),
                    center.latitude,
                    center.longitude
                )
            }
            None => println!("  Track {}: empty", i + 1),
        }
    }
}

fn run_rebuild(
    path: &Path,
    config: &EngineConfig,
    rebuild: &geosync::RebuildConfig,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let mut tracks = load_tracks(path, config)?;
    if verbose {
        println!("\n[Before]");
        print_tracks(&tracks);
    }

    let count = tracks.rebuild_with(rebuild);
    println!(
        "\nRebuilt into {} tracks (distance delta {} m, time gap {} s, merge {})",
        count, rebuild.distance_delta, rebuild.time_gap_delta, rebuild.merge
    );
    print_tracks(&tracks);

    if let Some(output) = output {
        tracks.save_gpx(output)?;
        println!("\nSaved rebuilt tracks to {}", output.display());
    }
    Ok(())
}

fn run_locate(path: &Path, config: &EngineConfig, times: &[String]) -> Result<()> {
    let tracks = load_tracks(path, config)?;

    for raw in times {
        let time: DateTime<Utc> = match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                eprintln!("  [ERR] {}: {}", raw, e);
                continue;
            }
        };
        match tracks.interpolate(time) {
            Some((coord, elevation)) => println!(
                "  {} -> {:.6}, {:.6}, elevation {:.1} m",
                time.to_rfc3339(),
                coord.latitude,
                coord.longitude,
                elevation
            ),
            None => println!("  {} -> outside every track", time.to_rfc3339()),
        }
    }
    Ok(())
}

fn run_calibrate(
    path: &Path,
    groups_path: &Path,
    camera: &str,
    config: &EngineConfig,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let tracks = load_tracks(path, config)?;
    let file = File::open(groups_path).map_err(|e| GeoSyncError::Io {
        path: groups_path.to_path_buf(),
        source: e,
    })?;
    let groups: Vec<ReferenceGroup> = serde_json::from_reader(BufReader::new(file))?;
    println!("Loaded {} reference groups", groups.len());

    let calibrator = ClockCalibrator::new(camera, &tracks, &groups, config.calibration.clone());
    if verbose {
        println!("\n[References for {}]", camera);
        for group in calibrator.reference_groups() {
            println!("  - {} ({})", group.name, group.local_time);
        }
    }

    let Some(calibration) = calibrator.calibrate()? else {
        println!("\n{}: no clock offset found", camera);
        return Ok(());
    };

    println!(
        "\n{}: offset {} s, spread {} s at {} m from {} groups{}",
        camera,
        calibration.offset_seconds,
        calibration.spread,
        calibration.distance_delta,
        calibration.used_groups.len(),
        if calibration.settled { "" } else { " (check the spread)" }
    );

    let mut corrected = apply_calibration(&groups, &calibration);
    locate_groups(&tracks, &mut corrected);
    for group in &corrected {
        match group.coordinate {
            Some(coord) => println!(
                "  {} {} -> {:.6}, {:.6}",
                group.name,
                group.utc_time.to_rfc3339(),
                coord.latitude,
                coord.longitude
            ),
            None => println!("  {} {} -> no coordinate", group.name, group.utc_time.to_rfc3339()),
        }
    }

    if let Some(output) = output {
        let file = File::create(output).map_err(|e| GeoSyncError::Io {
            path: output.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &corrected)?;
        writer.flush().map_err(|e| GeoSyncError::Io {
            path: output.to_path_buf(),
            source: e,
        })?;
        println!("\nSaved corrected groups to {}", output.display());
    }
    Ok(())
}
