pub mod kml;
pub mod network;

/// A WGS-84 position in decimal degrees. KML stores longitude first; everything
/// past the parser uses (lat, lon).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinate { lat, lon }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from(value: (f64, f64)) -> Self {
        Coordinate {
            lat: value.0,
            lon: value.1,
        }
    }
}
