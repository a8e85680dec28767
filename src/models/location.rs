use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// Costa Rica, as used to bound the report map.
pub const COSTA_RICA: BoundingBox = BoundingBox {
    south: 8.0,
    west: -86.0,
    north: 11.5,
    east: -82.5,
};

/// Centre of the country; the initial marker position of the report form.
pub const DEFAULT_CENTER: Coordinates = Coordinates::new(9.7489, -83.7534);

impl BoundingBox {
    pub fn contains(&self, point: Coordinates) -> bool {
        point.lat.is_finite()
            && point.lng.is_finite()
            && (self.south..=self.north).contains(&point.lat)
            && (self.west..=self.east).contains(&point.lng)
    }
}
