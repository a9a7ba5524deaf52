use geo::{HaversineBearing, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate, degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        a.haversine_distance(&b)
    }

    /// Initial bearing to `other` in degrees, normalized to [0, 360).
    /// 0 = north, 90 = east.
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        a.haversine_bearing(b).rem_euclid(360.0)
    }

    /// Linear interpolation between two points.
    ///
    /// Plain lat/lon lerp, not a geodesic; the animation consumes
    /// high-resolution poly-lines where consecutive points are meters
    /// apart, so the error is negligible.
    pub fn lerp(&self, other: &GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: (1.0 - t) * self.lat + t * other.lat,
            lon: (1.0 - t) * self.lon + t * other.lon,
        }
    }
}

/// Incident coordinates plus an explicit "location known" flag.
///
/// (0.0, 0.0) is the wire sentinel for "unknown", but the flag is the
/// only authoritative signal; a real fix near the equator/prime-meridian
/// must never be misread by comparing values against the sentinel.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IncidentLocation {
    pub point: GeoPoint,
    pub known: bool,
}

impl IncidentLocation {
    pub fn known(lat: f64, lon: f64) -> Self {
        IncidentLocation {
            point: GeoPoint::new(lat, lon),
            known: true,
        }
    }

    pub fn unknown() -> Self {
        IncidentLocation {
            point: GeoPoint::new(0.0, 0.0),
            known: false,
        }
    }
}
