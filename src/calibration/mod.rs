//! # Camera Clock Calibration
//!
//! Estimates how far a camera's clock is off from UTC using a GPS track and a
//! handful of reference groups whose true location was confirmed by hand.
//!
//! ## Algorithm
//!
//! 1. Index every track point in an R-tree
//! 2. For each reference group collect the track points within
//!    `max_dist_delta` and tag each with `point time - group baseline`
//! 3. Starting at `min_dist_delta`, keep only candidates within the current
//!    radius and run the recursive intersection search over the offset sets
//! 4. Widen the radius by `distance_step` until the best spread drops below
//!    `spread_stop_multiple * time_delta` or the radius passes `max_dist_delta`
//!
//! The median of the best intersection is the offset: adding it to a group's
//! baseline gives the UTC instant of the capture.

mod candidates;
mod search;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CalibrationConfig;
use crate::error::Result;
use crate::reference::{CoordinateSource, ReferenceGroup};
use crate::{GpsPoint, MultiTrack};

use candidates::{GroupCandidates, build_track_index, collect_candidates};
use search::{IntersectionSearch, SearchResult, median};

/// Outcome of a successful calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub camera: String,
    /// Median agreeing offset in seconds. `utc = baseline + offset`.
    pub offset_seconds: f64,
    /// `max - min` of the agreeing offsets, seconds.
    pub spread: i64,
    /// Search radius the result was found at, meters.
    pub distance_delta: f64,
    /// The agreeing offsets, sorted.
    pub offsets: Vec<i64>,
    /// Names of the groups whose candidates agree with the offset.
    pub used_groups: Vec<String>,
    /// Whether the spread ended below the stopping threshold.
    pub settled: bool,
}

impl Calibration {
    /// The offset as a duration, rounded to milliseconds.
    pub fn offset(&self) -> Duration {
        Duration::milliseconds((self.offset_seconds * 1000.0).round() as i64)
    }

    /// Corrected UTC instant for a baseline (a camera-clock time read as UTC).
    pub fn corrected_time(&self, baseline: DateTime<Utc>) -> DateTime<Utc> {
        baseline + self.offset()
    }
}

/// A reference group with its calibrated capture instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedGroup {
    pub name: String,
    pub camera: String,
    pub utc_time: DateTime<Utc>,
    pub coordinate: Option<GpsPoint>,
    pub coordinate_source: CoordinateSource,
    pub elevation: Option<f64>,
}

/// Corrected UTC instants for every group of the calibrated camera.
pub fn apply_calibration(
    groups: &[ReferenceGroup],
    calibration: &Calibration,
) -> Vec<CorrectedGroup> {
    groups
        .iter()
        .filter(|g| g.camera == calibration.camera)
        .map(|g| CorrectedGroup {
            name: g.name.clone(),
            camera: g.camera.clone(),
            utc_time: calibration.corrected_time(g.baseline()),
            coordinate: g.coordinate,
            coordinate_source: g.coordinate_source,
            elevation: None,
        })
        .collect()
}

/// Interpolate a coordinate for every group not confirmed by hand.
///
/// Groups outside every track keep what they had. Returns the number of
/// groups that got a track coordinate.
pub fn locate_groups(tracks: &MultiTrack, groups: &mut [CorrectedGroup]) -> usize {
    let mut located = 0;
    for group in groups
        .iter_mut()
        .filter(|g| g.coordinate_source != CoordinateSource::Manual)
    {
        if let Some((coordinate, elevation)) = tracks.interpolate(group.utc_time) {
            group.coordinate = Some(coordinate);
            group.coordinate_source = CoordinateSource::Track;
            group.elevation = Some(elevation);
            located += 1;
        } else {
            debug!(
                "[Calibrate] {}: {} is outside every track",
                group.name, group.utc_time
            );
        }
    }
    info!(
        "[Calibrate] Located {} of {} groups on the tracks",
        located,
        groups.len()
    );
    located
}

/// Estimates one camera's clock offset against a set of GPS tracks.
pub struct ClockCalibrator<'a> {
    camera: String,
    tracks: &'a MultiTrack,
    groups: Vec<&'a ReferenceGroup>,
    config: CalibrationConfig,
}

impl<'a> ClockCalibrator<'a> {
    /// Prepare a calibrator for `camera`.
    ///
    /// Only the first `max_files_num` groups of the camera with a manually
    /// confirmed coordinate are used as references.
    pub fn new(
        camera: impl Into<String>,
        tracks: &'a MultiTrack,
        groups: &'a [ReferenceGroup],
        config: CalibrationConfig,
    ) -> Self {
        let camera = camera.into();
        let groups = groups
            .iter()
            .filter(|g| g.camera == camera && g.is_confirmed())
            .take(config.max_files_num)
            .collect();
        Self {
            camera,
            tracks,
            groups,
            config,
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// The reference groups the calibration works from.
    pub fn reference_groups(&self) -> &[&'a ReferenceGroup] {
        &self.groups
    }

    /// Run the calibration.
    ///
    /// `Ok(None)` means the data was insufficient; the reason is logged. An
    /// error is only returned for an unusable configuration.
    pub fn calibrate(&self) -> Result<Option<Calibration>> {
        self.config.validate()?;
        let camera = self.camera.as_str();

        if self.tracks.point_count() == 0 {
            warn!("[Calibrate] {}: No tracks loaded, calibration stopped", camera);
            return Ok(None);
        }
        if self.groups.is_empty() {
            warn!(
                "[Calibrate] {}: No reference groups with a manually set coordinate, calibration stopped",
                camera
            );
            return Ok(None);
        }

        let index = build_track_index(self.tracks);
        let max_radius = self.config.max_dist_delta / self.config.meters_per_degree;
        let prepared = collect_candidates(&index, &self.groups, max_radius);
        if prepared.is_empty() {
            info!(
                "[Calibrate] {}: No reference groups closer than {} m to the tracks, calibration stopped",
                camera, self.config.max_dist_delta
            );
            return Ok(None);
        }
        info!(
            "[Calibrate] {}: Start using {} of {} reference groups close to the tracks",
            camera,
            prepared.len(),
            self.groups.len()
        );
        for group in &prepared {
            debug!(
                "[Calibrate] {}: {} has {} candidate points",
                camera,
                group.group.name,
                group.candidates.len()
            );
        }

        let mut search = IntersectionSearch::new(
            self.config.time_delta,
            self.config.min_files_num.max(1),
            self.config.spread_threshold(),
            prepared.len(),
        );
        let mut distance = self.config.min_dist_delta;
        loop {
            let radius = distance / self.config.meters_per_degree;
            let sets: Vec<(usize, Vec<i64>)> = prepared
                .iter()
                .enumerate()
                .map(|(i, group)| (i, group.offsets_within(radius)))
                .filter(|(_, offsets)| !offsets.is_empty())
                .collect();

            search.set_distance(distance);
            search.run(&sets);
            self.log_step(&prepared, distance, search.best());

            if search.is_settled() || distance > self.config.max_dist_delta {
                break;
            }
            distance += self.config.distance_step;
        }

        let settled = search.is_settled();
        let Some(best) = search.into_best() else {
            info!(
                "[Calibrate] {}: No common offset for at least {} reference groups",
                camera, self.config.min_files_num
            );
            return Ok(None);
        };

        let used_groups = self.agreeing_groups(&prepared, &best);
        let mut message = format!(
            "{}: Offset {} s, spread {} s, distance delta {} m, from {} reference groups",
            camera,
            best.median,
            best.spread,
            best.distance_delta,
            used_groups.len()
        );
        if settled {
            info!("[Calibrate] {}", message);
        } else {
            message.push_str(", check the spread");
            warn!("[Calibrate] {}", message);
        }
        for name in &used_groups {
            info!("[Calibrate] {}: {}", camera, name);
        }

        Ok(Some(Calibration {
            camera: self.camera.clone(),
            offset_seconds: best.median,
            spread: best.spread,
            distance_delta: best.distance_delta,
            offsets: best.offsets,
            used_groups,
            settled,
        }))
    }

    fn agrees(&self, offset: i64, median: f64) -> bool {
        (offset as f64 - median).abs() <= self.config.time_delta as f64
    }

    fn agreeing_groups(
        &self,
        prepared: &[GroupCandidates<'_>],
        best: &SearchResult,
    ) -> Vec<String> {
        let radius = best.distance_delta / self.config.meters_per_degree;
        prepared
            .iter()
            .filter(|group| {
                group
                    .offsets_within(radius)
                    .into_iter()
                    .any(|o| self.agrees(o, best.median))
            })
            .map(|group| group.group.name.clone())
            .collect()
    }

    fn log_step(
        &self,
        prepared: &[GroupCandidates<'_>],
        distance: f64,
        best: Option<&SearchResult>,
    ) {
        let camera = self.camera.as_str();
        let radius = distance / self.config.meters_per_degree;

        for group in prepared {
            let offsets = group.offsets_within(radius);
            let name = &group.group.name;
            let agreeing: Vec<i64> = match best {
                Some(best) => offsets
                    .iter()
                    .copied()
                    .filter(|&o| self.agrees(o, best.median))
                    .collect(),
                None => Vec::new(),
            };

            if let (Some(&min), Some(&max), Some(med)) =
                (agreeing.first(), agreeing.last(), median(&agreeing))
            {
                let listed = if agreeing.len() > 2 {
                    format!("{} .. {}", min, max)
                } else {
                    agreeing
                        .iter()
                        .map(|o| o.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                info!(
                    "[Calibrate] {}: YES {}: distance delta {} m, spread {} s, median {} s, {} offsets: {}",
                    camera,
                    name,
                    distance,
                    max - min,
                    med,
                    agreeing.len(),
                    listed
                );
            } else if let (Some(&min), Some(&max), Some(med)) =
                (offsets.first(), offsets.last(), median(&offsets))
            {
                info!(
                    "[Calibrate] {}: NO  {}: distance delta {} m, median {} s, {} closest points spread {} s from {} to {}",
                    camera,
                    name,
                    distance,
                    med,
                    offsets.len(),
                    max - min,
                    min,
                    max
                );
            } else {
                info!(
                    "[Calibrate] {}: NO  {}: no track points closer than {} m",
                    camera, name, distance
                );
            }
        }

        match best {
            Some(best) => info!(
                "[Calibrate] {}: Step result at {} m: median offset {} s, {} offsets, spread {} s, {} groups",
                camera,
                distance,
                best.median,
                best.offsets.len(),
                best.spread,
                best.groups
            ),
            None => info!(
                "[Calibrate] {}: Step result at {} m: no common offset",
                camera, distance
            ),
        }
    }
}
