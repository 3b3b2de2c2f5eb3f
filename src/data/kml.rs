use super::Coordinate;

/// Geometry of a single placemark as it appears in the KML document.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    LineString(Vec<Coordinate>),
    Point(Coordinate),
    /// Placemark carried no geometry we read (polygons, models, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    pub name: String,
    pub geometry: Geometry,
}
