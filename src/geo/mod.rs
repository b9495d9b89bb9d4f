// src/geo/mod.rs
//! Positions, great-circle distance and fix filtering

pub mod distance;
pub mod filter;

use serde::{Deserialize, Serialize};

pub use distance::{path_km, segment_km, EARTH_RADIUS_KM};
pub use filter::{FilterVerdict, GeoFilter};

/// A captured latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within ±90° latitude, ±180° longitude.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.lat.abs() <= 90.0 && self.lng.abs() <= 180.0
    }
}

/// A single reported device position with its accuracy radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: Position,
    pub accuracy_m: f64,
}

impl Fix {
    pub fn new(lat: f64, lng: f64, accuracy_m: f64) -> Self {
        Self {
            position: Position::new(lat, lng),
            accuracy_m,
        }
    }
}
