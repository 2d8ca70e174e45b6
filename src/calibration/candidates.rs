//! Candidate offsets: track points near each reference group, tagged with
//! how far the camera clock would be off if the group was captured then.

use chrono::{DateTime, Utc};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::geo_utils::degree_distance;
use crate::reference::ReferenceGroup;
use crate::{GpsPoint, MultiTrack};

/// A track point in the R-tree, stored as `[lat, lng]` with its UTC time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimedCoord {
    lat: f64,
    lng: f64,
    time: DateTime<Utc>,
}

impl RTreeObject for TimedCoord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for TimedCoord {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Index every point of every track.
pub(crate) fn build_track_index(tracks: &MultiTrack) -> RTree<TimedCoord> {
    let points: Vec<TimedCoord> = tracks
        .points()
        .map(|p| TimedCoord {
            lat: p.latitude(),
            lng: p.longitude(),
            time: p.time(),
        })
        .collect();
    RTree::bulk_load(points)
}

/// A track point near a reference group and the clock offset it implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub coordinate: GpsPoint,
    /// `track point time - group baseline`, whole seconds.
    pub offset: i64,
}

/// All candidates of one reference group within the widest search radius.
#[derive(Debug, Clone)]
pub(crate) struct GroupCandidates<'a> {
    pub group: &'a ReferenceGroup,
    pub center: GpsPoint,
    pub candidates: Vec<Candidate>,
}

impl GroupCandidates<'_> {
    /// Offsets of the candidates within `radius_deg` degrees of the group,
    /// sorted and de-duplicated.
    pub fn offsets_within(&self, radius_deg: f64) -> Vec<i64> {
        let mut offsets: Vec<i64> = self
            .candidates
            .iter()
            .filter(|c| degree_distance(&c.coordinate, &self.center) <= radius_deg)
            .map(|c| c.offset)
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

fn collect_for_group<'a>(
    index: &RTree<TimedCoord>,
    group: &'a ReferenceGroup,
    radius_deg: f64,
) -> Option<GroupCandidates<'a>> {
    let center = group.coordinate?;
    let baseline = group.baseline();
    let candidates: Vec<Candidate> = index
        .locate_within_distance([center.latitude, center.longitude], radius_deg * radius_deg)
        .map(|p| Candidate {
            coordinate: GpsPoint::new(p.lat, p.lng),
            offset: (p.time - baseline).num_seconds(),
        })
        .collect();

    if candidates.is_empty() {
        None
    } else {
        Some(GroupCandidates {
            group,
            center,
            candidates,
        })
    }
}

/// Candidates for every group within `radius_deg` degrees.
///
/// Groups without a coordinate or without any nearby track point are left
/// out. The remaining groups keep their input order.
pub(crate) fn collect_candidates<'a>(
    index: &RTree<TimedCoord>,
    groups: &[&'a ReferenceGroup],
    radius_deg: f64,
) -> Vec<GroupCandidates<'a>> {
    #[cfg(feature = "parallel")]
    {
        groups
            .par_iter()
            .filter_map(|&group| collect_for_group(index, group, radius_deg))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        groups
            .iter()
            .filter_map(|&group| collect_for_group(index, group, radius_deg))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_offsets_within_filters_and_dedups() {
        let local = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let group = ReferenceGroup::new("g", "cam", local);
        let near = |offset| Candidate {
            coordinate: GpsPoint::new(45.0, 7.0),
            offset,
        };
        let set = GroupCandidates {
            group: &group,
            center: GpsPoint::new(45.0, 7.0),
            candidates: vec![
                near(30),
                near(10),
                // Two loggers recording the same instant
                near(10),
                Candidate {
                    coordinate: GpsPoint::new(45.01, 7.0),
                    offset: 20,
                },
            ],
        };

        assert_eq!(set.offsets_within(0.001), vec![10, 30]);
        assert_eq!(set.offsets_within(0.1), vec![10, 20, 30]);
    }
}
