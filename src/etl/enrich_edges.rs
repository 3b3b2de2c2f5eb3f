use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::UserConfig;
use crate::capacity::CapacityTable;
use crate::data::network::{EdgeGeometry, EdgeTable, EnrichedEdge, NodeRegistry, SkippedEdge};
use crate::errors::{Error, ErrorKind, Result};
use crate::etl::Etl;
use crate::etl::parse_kml::load_placemarks;
use crate::geo::{nearest, Snap};
use crate::routing::{Pacer, RouteService};

pub const ETL_NAME: &str = "enrich_edges";

/// Header of the output table, in the order downstream tools expect.
pub const COLUMNS: [&str; 8] = [
    "edge_name",
    "distance_km",
    "duration_min",
    "avg_speed_kmh",
    "from_node",
    "to_node",
    "u_ij",
    "a_ij",
];

pub struct Input {
    pub edges: Vec<EdgeGeometry>,
    pub registry: NodeRegistry,
}

/// Joins edge geometry, the node registry and routing answers into output
/// rows, one edge at a time.
pub struct Enricher<'a, S: RouteService + ?Sized> {
    pub registry: &'a NodeRegistry,
    pub capacity: &'a CapacityTable,
    pub router: &'a S,
    pub pacer: Pacer,
    pub max_snap_distance_m: Option<f64>,
}

impl<'a, S: RouteService + ?Sized> Enricher<'a, S> {
    fn check_snap(&self, edge: &EdgeGeometry, endpoint: &str, snap: &Snap) {
        if let Some(max_distance_m) = self.max_snap_distance_m {
            if snap.distance_m > max_distance_m {
                warn!(
                    edge = edge.name.as_str(),
                    endpoint = endpoint,
                    node = snap.name,
                    distance_m = snap.distance_m,
                    max_distance_m = max_distance_m;
                    "Endpoint snapped to a distant node"
                );
            }
        }
    }

    pub fn enrich_edge(&mut self, edge: &EdgeGeometry) -> Result<EnrichedEdge> {
        let origin = edge.origin();
        let destination = edge.destination();

        let from_node = nearest(origin, self.registry)?;
        let to_node = nearest(destination, self.registry)?;
        self.check_snap(edge, "origin", &from_node);
        self.check_snap(edge, "destination", &to_node);

        self.pacer.wait();
        let leg = self.router.route(origin, destination)?;

        EnrichedEdge::derive(
            &edge.name,
            leg.distance_m,
            leg.duration_s,
            from_node.name,
            to_node.name,
            self.capacity.capacity(&edge.name),
        )
    }

    /// Enriches every edge in order. Routing failures and zero durations drop
    /// the edge and are recorded in the table; any other error ends the run.
    pub fn enrich_all<'e, I>(&mut self, edges: I) -> Result<EdgeTable>
    where
        I: Iterator<Item = &'e EdgeGeometry>,
    {
        if self.registry.is_empty() {
            return Err(Error::new(ErrorKind::EmptyRegistry, "node registry has no entries"));
        }

        let mut table = EdgeTable::default();
        for edge in edges {
            match self.enrich_edge(edge) {
                Ok(record) => table.records.push(record),
                Err(err) if err.kind.is_recoverable() => {
                    warn!(
                        edge = edge.name.as_str(),
                        kind = err.kind.as_str(),
                        err = err.message.as_str();
                        "Skipping edge"
                    );
                    table.skipped.push(SkippedEdge {
                        edge_name: edge.name.clone(),
                        kind: err.kind,
                        message: err.message,
                    });
                },
                Err(err) => return Err(err.context(format!("edge '{}'", edge.name))),
            }
        }
        Ok(table)
    }
}

/// Writes the table as CSV. The header is always written, even when no edge
/// survived.
pub fn write_edge_table<W: io::Write>(writer: W, records: &[EnrichedEdge]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn log_summary(table: &EdgeTable) {
    info!(written = table.records.len(), skipped = table.skipped.len(); "Edge table summary");
    for (kind, count) in table.skipped_by_kind() {
        info!(kind = kind.as_str(), count = count; "Skipped edges by kind");
    }
    for skipped in &table.skipped {
        info!(
            edge = skipped.edge_name.as_str(),
            kind = skipped.kind.as_str(),
            err = skipped.message.as_str();
            "Skipped edge"
        );
    }
}

pub struct EnrichEdgesEtl<'a, S: RouteService> {
    config: &'a UserConfig,
    capacity: CapacityTable,
    router: S,
}

impl<'a, S: RouteService> EnrichEdgesEtl<'a, S> {
    pub fn new(config: &'a UserConfig, router: S) -> Result<Self> {
        Ok(EnrichEdgesEtl {
            config,
            capacity: CapacityTable::from_config(&config.capacity)?,
            router,
        })
    }

    fn output_path(&self) -> &Path {
        Path::new(&self.config.output_path)
    }
}

impl<S: RouteService> Etl for EnrichEdgesEtl<'_, S> {
    type Input = Input;
    type Output = EdgeTable;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self) -> Result<bool> {
        Ok(!self.config.overwrite && self.output_path().try_exists()?)
    }

    fn extract(&mut self) -> Result<Self::Input> {
        let edges_path = Path::new(&self.config.edges_path);
        let edges = EdgeGeometry::from_placemarks(load_placemarks(edges_path)?)
            .map_err(|err| err.context(edges_path.display()))?;

        let nodes_path = Path::new(&self.config.nodes_path);
        let registry = NodeRegistry::from_placemarks(load_placemarks(nodes_path)?);
        if registry.is_empty() {
            return Err(Error::new(ErrorKind::EmptyRegistry, "no Point placemarks found")
                .context(nodes_path.display()));
        }

        info!(edges = edges.len(), nodes = registry.len(); "Loaded road network");
        Ok(Input { edges, registry })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mut enricher = Enricher {
            registry: &input.registry,
            capacity: &self.capacity,
            router: &self.router,
            pacer: Pacer::new(Duration::from_millis(self.config.routing.min_request_interval_ms)),
            max_snap_distance_m: self.config.max_snap_distance_m,
        };
        if self.config.progress {
            enricher.enrich_all(tqdm::tqdm(input.edges.iter()))
        } else {
            enricher.enrich_all(input.edges.iter())
        }
    }

    fn load(&mut self, output: Self::Output) -> Result<()> {
        let output_path = self.output_path();
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(output_path)?;
        write_edge_table(io::BufWriter::new(file), &output.records)
            .map_err(|err| err.context(output_path.display()))?;

        info!(path = self.config.output_path.as_str(); "Saved edge table");
        log_summary(&output);
        Ok(())
    }
}
