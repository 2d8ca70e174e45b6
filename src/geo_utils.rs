//! # Geographic Utilities
//!
//! Distance helpers shared by the track, cache and calibration modules.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`degree_distance`] | Planar distance in degrees, used for coarse windowing |
//!
//! All functions expect WGS84 coordinates in degrees.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns meters along the Earth's surface (spherical Earth, radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use geosync::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Convert meters to approximate degrees at a given latitude.
///
/// At the equator 1 degree is about 111,320 meters; longitude degrees shrink
/// with `cos(latitude)`, so the larger (conservative) value is returned.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Planar distance between two points measured in degrees.
///
/// Much cheaper than [`haversine_distance`] and only meaningful for small
/// windows, where it is compared against a radius converted with a fixed
/// meters-per-degree factor.
#[inline]
pub fn degree_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let dlat = p1.latitude - p2.latitude;
    let dlng = p1.longitude - p2.longitude;
    (dlat * dlat + dlng * dlng).sqrt()
}
