use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Readings at or above this distance are labelled in kilometers
const KILOMETER_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Haversine distance to `other` in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }
}

/// A single position sample from the location provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            timestamp: Utc::now(),
        }
    }
}

/// Great-circle distance between the rider and the destination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceReading {
    pub meters: f64,
}

impl DistanceReading {
    pub fn between(from: &Coordinate, to: &Coordinate) -> Self {
        Self {
            meters: from.distance_to(to),
        }
    }

    /// "500 m" below a kilometer, "1.50 km" from there on
    pub fn label(&self) -> String {
        // round first so 999.6 m does not print as "1000 m"
        let meters = self.meters.round();
        if meters < KILOMETER_THRESHOLD {
            format!("{:.0} m", meters)
        } else {
            format!("{:.2} km", self.meters / 1000.0)
        }
    }
}
