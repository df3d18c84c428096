#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distance on a spherical earth.
//!
//! Inputs are degrees. Latitudes outside `[-90, 90]` are not rejected: the
//! formula still returns a finite value, it just no longer describes a
//! physical point. `NaN` inputs yield `NaN`.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers on a sphere of [`EARTH_RADIUS_KM`].
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_km_with_radius(lat1, lon1, lat2, lon2, EARTH_RADIUS_KM)
}

/// Haversine distance in kilometers on a sphere of `radius_km`.
///
/// The haversine term is clamped to `[0, 1]` so rounding near antipodal
/// points cannot push `asin` out of its domain.
#[must_use]
pub fn distance_km_with_radius(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius_km: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    c * radius_km
}

/// The fixed coordinate every event distance is measured from.
///
/// One monitor point exists per process; distances are never recomputed
/// against another origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Sphere radius used for distance calculations.
    pub earth_radius_km: f64,
}

impl MonitorPoint {
    /// Creates a monitor point on the default earth sphere.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            earth_radius_km: EARTH_RADIUS_KM,
        }
    }

    /// Overrides the sphere radius.
    #[must_use]
    pub const fn with_earth_radius(mut self, earth_radius_km: f64) -> Self {
        self.earth_radius_km = earth_radius_km;
        self
    }

    /// Distance in kilometers from this point to `(latitude, longitude)`.
    #[must_use]
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        distance_km_with_radius(
            self.latitude,
            self.longitude,
            latitude,
            longitude,
            self.earth_radius_km,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MADRID: (f64, f64) = (40.4168, -3.7038);
    const BARCELONA: (f64, f64) = (41.3874, 2.1686);

    #[test]
    fn identical_points_are_zero() {
        for (lat, lon) in [(0.0, 0.0), MADRID, (-89.9, 179.9), (90.0, -180.0)] {
            assert!(distance_km(lat, lon, lat, lon).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let there = distance_km(MADRID.0, MADRID.1, BARCELONA.0, BARCELONA.1);
        let back = distance_km(BARCELONA.0, BARCELONA.1, MADRID.0, MADRID.1);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn madrid_to_barcelona_is_about_504_km() {
        let d = distance_km(MADRID.0, MADRID.1, BARCELONA.0, BARCELONA.1);
        assert!((d - 504.0).abs() <= 5.0, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
        assert!(!d.is_nan());
    }

    #[test]
    fn custom_radius_scales_linearly() {
        let earth = distance_km(MADRID.0, MADRID.1, BARCELONA.0, BARCELONA.1);
        let half = distance_km_with_radius(
            MADRID.0,
            MADRID.1,
            BARCELONA.0,
            BARCELONA.1,
            EARTH_RADIUS_KM / 2.0,
        );
        assert!((earth / 2.0 - half).abs() < 1e-9);
    }

    #[test]
    fn monitor_point_measures_from_its_origin() {
        let point = MonitorPoint::new(MADRID.0, MADRID.1);
        let d = point.distance_to(BARCELONA.0, BARCELONA.1);
        assert!((d - distance_km(MADRID.0, MADRID.1, BARCELONA.0, BARCELONA.1)).abs() < 1e-9);
    }
}
