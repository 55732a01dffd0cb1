//! Locations and distance metrics
//!
//! Proximity queries take their distance function as an injected
//! [`DistanceMetric`] so deployments can swap great-circle distance for a
//! road-network estimate without touching the directory.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A point on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A labelled location (intersection, district, address)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub label: String,
    #[serde(flatten)]
    pub point: GeoPoint,
}

impl Location {
    pub fn new(label: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            label: label.into(),
            point: GeoPoint::new(lat, lon),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Distance capability used for responder proximity queries
pub trait DistanceMetric: Send + Sync + std::fmt::Debug {
    /// Distance between two points in kilometres
    fn distance_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64;
}

/// Great-circle distance
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceMetric for Haversine {
    fn distance_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
        let dlat = (b.lat - a.lat).to_radians();
        let dlon = (b.lon - a.lon).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }
}

/// Euclidean distance treating `lat`/`lon` as kilometre offsets on a flat grid
#[derive(Debug, Clone, Copy, Default)]
pub struct Planar;

impl DistanceMetric for Planar {
    fn distance_km(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        ((b.lat - a.lat).powi(2) + (b.lon - a.lon).powi(2)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint::new(40.7128, -74.0060);
        assert_eq!(Haversine.distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.2 km everywhere
        let a = GeoPoint::new(10.0, 20.0);
        let b = GeoPoint::new(11.0, 20.0);
        let d = Haversine.distance_km(&a, &b);
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = GeoPoint::new(51.5074, -0.1278);
        let b = GeoPoint::new(48.8566, 2.3522);
        let ab = Haversine.distance_km(&a, &b);
        let ba = Haversine.distance_km(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
        assert!((ab - 343.5).abs() < 2.0, "London-Paris got {}", ab);
    }

    #[test]
    fn test_planar_distance() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(3.0, 4.0);
        assert_eq!(Planar.distance_km(&a, &b), 5.0);
    }

    #[test]
    fn test_location_flattens_point() {
        let loc = Location::new("Downtown", 1.5, -2.0);
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["label"], "Downtown");
        assert_eq!(json["lat"], 1.5);
        assert_eq!(json["lon"], -2.0);
    }
}
