use crate::data::Coordinate;
use crate::data::network::NodeRegistry;
use crate::errors::{Error, ErrorKind, Result};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres using the full haversine formula.
///
/// Earlier versions of this tool used a small-angle shortcut for the angular
/// term, which drifts at larger separations. Snapping results can differ from
/// those versions when two candidate nodes are almost equidistant.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat * 0.5).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Result of snapping a point to the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap<'a> {
    pub name: &'a str,
    pub distance_m: f64,
}

/// Linear scan for the closest node. Ties go to the entry that comes first in
/// the registry.
pub fn nearest(point: Coordinate, registry: &NodeRegistry) -> Result<Snap<'_>> {
    let mut best: Option<Snap> = None;
    for node in registry.iter() {
        let distance_m = distance(point, node.coords);
        match best {
            Some(current) if current.distance_m <= distance_m => (),
            _ => best = Some(Snap { name: &node.name, distance_m }),
        }
    }
    best.ok_or_else(|| Error::new(ErrorKind::EmptyRegistry, "node registry has no entries"))
}
