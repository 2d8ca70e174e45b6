//! R-tree indexed coordinates for nearest-neighbor cache lookups.

use std::hash::{Hash, Hasher};

use rstar::{AABB, PointDistance, RTreeObject};

use crate::GpsPoint;

/// A cached coordinate in the R-tree, stored as `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedCoord {
    pub lat: f64,
    pub lng: f64,
}

impl From<GpsPoint> for IndexedCoord {
    fn from(point: GpsPoint) -> Self {
        Self {
            lat: point.latitude,
            lng: point.longitude,
        }
    }
}

impl IndexedCoord {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lng)
    }
}

impl RTreeObject for IndexedCoord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedCoord {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Exact-coordinate map key.
///
/// Two keys are equal only when both coordinates are bit-for-bit equal
/// (`-0.0` is folded into `0.0`).
#[derive(Debug, Clone, Copy)]
pub struct CoordKey {
    lat_bits: u64,
    lng_bits: u64,
}

fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl From<GpsPoint> for CoordKey {
    fn from(point: GpsPoint) -> Self {
        Self {
            lat_bits: normalized_bits(point.latitude),
            lng_bits: normalized_bits(point.longitude),
        }
    }
}

impl PartialEq for CoordKey {
    fn eq(&self, other: &Self) -> bool {
        self.lat_bits == other.lat_bits && self.lng_bits == other.lng_bits
    }
}

impl Eq for CoordKey {}

impl Hash for CoordKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lat_bits.hash(state);
        self.lng_bits.hash(state);
    }
}
