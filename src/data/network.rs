use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use super::Coordinate;
use super::kml::{Geometry, Placemark};
use crate::errors::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub coords: Coordinate,
}

/// Named snapping targets, kept in source order so that nearest-node ties
/// always resolve to the same entry.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry::default()
    }

    /// Adds a node unless the name is already taken. Returns whether it was added.
    pub fn insert(&mut self, name: impl Into<String>, coords: Coordinate) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.nodes.push(Node { name, coords });
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|node| node.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds the registry from the node document. Placemarks without a point
    /// are ignored and repeated names keep their first position.
    pub fn from_placemarks(placemarks: Vec<Placemark>) -> Self {
        let mut registry = NodeRegistry::new();
        for placemark in placemarks {
            match placemark.geometry {
                Geometry::Point(coords) => {
                    if !registry.insert(placemark.name.clone(), coords) {
                        warn!(node = placemark.name.as_str(); "Duplicate node name, keeping first occurrence");
                    }
                },
                _ => {
                    debug!(placemark = placemark.name.as_str(); "Skipping node placemark without a point");
                },
            }
        }
        registry
    }
}

impl<S: Into<String>> FromIterator<(S, Coordinate)> for NodeRegistry {
    fn from_iter<I: IntoIterator<Item = (S, Coordinate)>>(iter: I) -> Self {
        let mut registry = NodeRegistry::new();
        for (name, coords) in iter {
            registry.insert(name, coords);
        }
        registry
    }
}

/// A hand-drawn road segment. Only its endpoints matter downstream; the router
/// decides the actual path.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGeometry {
    pub name: String,
    coords: Vec<Coordinate>,
}

impl EdgeGeometry {
    pub fn new(name: impl Into<String>, coords: Vec<Coordinate>) -> Result<Self> {
        let name = name.into();
        if coords.len() < 2 {
            return Err(Error::parse(format!(
                "edge '{}' has {} coordinate(s), at least 2 are required",
                name,
                coords.len()
            )));
        }
        Ok(EdgeGeometry { name, coords })
    }

    pub fn origin(&self) -> Coordinate {
        self.coords[0]
    }

    pub fn destination(&self) -> Coordinate {
        self.coords[self.coords.len() - 1]
    }

    pub fn from_placemarks(placemarks: Vec<Placemark>) -> Result<Vec<Self>> {
        let mut edges = Vec::new();
        for placemark in placemarks {
            match placemark.geometry {
                Geometry::LineString(coords) => edges.push(EdgeGeometry::new(placemark.name, coords)?),
                _ => {
                    debug!(placemark = placemark.name.as_str(); "Skipping edge placemark without a line");
                },
            }
        }
        Ok(edges)
    }
}

/// One output row. Column order follows field order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEdge {
    pub edge_name: String,
    #[serde(skip)]
    pub distance_m: f64,
    #[serde(skip)]
    pub duration_s: f64,
    pub distance_km: f64,
    pub duration_min: f64,
    pub avg_speed_kmh: f64,
    pub from_node: String,
    pub to_node: String,
    #[serde(rename = "u_ij")]
    pub capacity: u32,
    #[serde(rename = "a_ij")]
    pub flow_rate_proxy: f64,
}

impl EnrichedEdge {
    /// Computes the derived columns from a routed leg. A zero travel time would
    /// make speed and flow rate undefined, so it is rejected instead.
    pub fn derive(
        edge_name: &str,
        distance_m: f64,
        duration_s: f64,
        from_node: &str,
        to_node: &str,
        capacity: u32,
    ) -> Result<Self> {
        if duration_s <= 0.0 {
            return Err(Error::new(
                ErrorKind::DegenerateDuration,
                format!("route duration is {} s", duration_s),
            ));
        }

        let distance_km = distance_m / 1000.0;
        let duration_min = duration_s / 60.0;

        Ok(EnrichedEdge {
            edge_name: edge_name.to_string(),
            distance_m,
            duration_s,
            distance_km,
            duration_min,
            avg_speed_kmh: distance_km / (duration_min / 60.0),
            from_node: from_node.to_string(),
            to_node: to_node.to_string(),
            capacity,
            flow_rate_proxy: capacity as f64 / (duration_min * 60.0),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEdge {
    pub edge_name: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything the enrichment produced, in input order.
#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    pub records: Vec<EnrichedEdge>,
    pub skipped: Vec<SkippedEdge>,
}

impl EdgeTable {
    pub fn skipped_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.kind).or_insert(0) += 1;
        }
        counts
    }
}
