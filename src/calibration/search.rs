//! Recursive intersection search over per-group offset sets.
//!
//! Every group contributes a sorted set of candidate clock offsets. The search
//! picks one group at a time and narrows all other sets to the offsets that
//! agree with it within `time_delta`. Branches die as soon as nothing agrees
//! any more, so the walk stays small in practice even though the tree of group
//! orderings is factorial.

use log::{debug, error};

/// Offsets in `sorted` within `delta` of `value` (inclusive).
pub(crate) fn within(sorted: &[i64], value: i64, delta: i64) -> bool {
    let start = sorted.partition_point(|&o| o < value - delta);
    sorted.get(start).is_some_and(|&o| o <= value + delta)
}

/// Offsets of `set` that lie within `delta` of any offset of `anchor`.
pub(crate) fn narrow(set: &[i64], anchor: &[i64], delta: i64) -> Vec<i64> {
    set.iter()
        .copied()
        .filter(|&o| within(anchor, o, delta))
        .collect()
}

/// Median of a sorted slice; the mean of the middle pair for even lengths.
pub(crate) fn median(sorted: &[i64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(sorted[mid] as f64)
    } else {
        Some((sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0)
    }
}

/// An accepted intersection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchResult {
    /// `max - min` of the offsets, seconds.
    pub spread: i64,
    pub median: f64,
    /// Sorted agreeing offsets.
    pub offsets: Vec<i64>,
    /// Number of groups that contributed to the intersection.
    pub groups: usize,
    /// Search radius the result was found at, meters.
    pub distance_delta: f64,
}

/// Branch-and-bound state. The best result survives across radius steps.
#[derive(Debug)]
pub(crate) struct IntersectionSearch {
    time_delta: i64,
    min_groups: usize,
    spread_threshold: i64,
    max_depth: usize,
    distance_delta: f64,
    depth: usize,
    best: Option<SearchResult>,
    /// Branches visited over the whole search.
    pub branches: usize,
    /// Intersections that had enough groups, accepted or not.
    pub intersections: usize,
}

impl IntersectionSearch {
    pub fn new(
        time_delta: i64,
        min_groups: usize,
        spread_threshold: i64,
        max_depth: usize,
    ) -> Self {
        Self {
            time_delta,
            min_groups: min_groups.max(1),
            spread_threshold,
            max_depth,
            distance_delta: 0.0,
            depth: 0,
            best: None,
            branches: 0,
            intersections: 0,
        }
    }

    /// Radius that results found from now on are tagged with.
    pub fn set_distance(&mut self, distance_delta: f64) {
        self.distance_delta = distance_delta;
    }

    pub fn best(&self) -> Option<&SearchResult> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<SearchResult> {
        self.best
    }

    /// Whether the best result is already tight enough to stop.
    pub fn is_settled(&self) -> bool {
        self.best
            .as_ref()
            .is_some_and(|b| b.spread < self.spread_threshold)
    }

    /// Search `sets`: `(group index, sorted non-empty offsets)` pairs.
    pub fn run(&mut self, sets: &[(usize, Vec<i64>)]) {
        if sets.is_empty() {
            return;
        }
        self.descend(sets, 0);
        debug!(
            "[Calibrate] Search at {} m visited {} branches, {} intersections",
            self.distance_delta, self.branches, self.intersections
        );
    }

    fn descend(&mut self, sets: &[(usize, Vec<i64>)], merged: usize) {
        debug_assert!(
            self.depth <= self.max_depth,
            "intersection search deeper than the number of groups"
        );
        self.branches += 1;
        self.depth += 1;

        match sets {
            [] => error!("[Calibrate] Intersection search reached an empty branch"),
            [(_, offsets)] => self.evaluate(offsets, merged),
            _ => {
                for (group, anchor) in sets {
                    if self.is_settled() {
                        break;
                    }
                    if anchor.is_empty() {
                        continue;
                    }
                    let narrowed: Vec<(usize, Vec<i64>)> = sets
                        .iter()
                        .filter(|(other, offsets)| other != group && !offsets.is_empty())
                        .map(|(other, offsets)| (*other, narrow(offsets, anchor, self.time_delta)))
                        .filter(|(_, offsets)| !offsets.is_empty())
                        .collect();

                    if sets.len() > narrowed.len() + 1 {
                        self.evaluate(anchor, merged);
                    }
                    if !narrowed.is_empty() {
                        self.descend(&narrowed, merged + 1);
                    }
                }
            }
        }

        self.depth -= 1;
    }

    fn evaluate(&mut self, offsets: &[i64], merged: usize) {
        let groups = merged + 1;
        if groups < self.min_groups {
            return;
        }
        let (Some(&min), Some(&max), Some(median)) =
            (offsets.first(), offsets.last(), median(offsets))
        else {
            return;
        };
        self.intersections += 1;

        let spread = max - min;
        if self.best.as_ref().map_or(true, |b| spread < b.spread) {
            self.best = Some(SearchResult {
                spread,
                median,
                offsets: offsets.to_vec(),
                groups,
                distance_delta: self.distance_delta,
            });
        }
    }
}
