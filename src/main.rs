mod capacity;
mod data;
mod errors;
mod etl;
mod geo;
mod routing;

use std::env;
use std::fs::File;
use std::io;
use std::process::ExitCode;

use log::{error, info};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::capacity::CapacityConfig;
use crate::errors::{Error, Result};
use crate::etl::enrich_edges::EnrichEdgesEtl;
use crate::etl::Etl;
use crate::routing::{OsrmClient, RoutingConfig};

const DEFAULT_CONFIG_PATH: &str = "config/edges.json";

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub edges_path: String,
    pub nodes_path: String,
    pub output_path: String,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub capacity: CapacityConfig,
    /// Snapping further than this logs a warning. Unset means no limit.
    #[serde(default)]
    pub max_snap_distance_m: Option<f64>,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub progress: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| Error::config(err.to_string()).context(path))?;
    let config: UserConfig = serde_json::from_reader(io::BufReader::new(file))
        .map_err(|err| Error::from(err).context(path))?;

    if let Some(max_snap) = config.max_snap_distance_m {
        if !(max_snap >= 0.0) {
            return Err(Error::config("max_snap_distance_m must be a non-negative number").context(path));
        }
    }
    Ok(config)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run(config: &UserConfig) -> Result<()> {
    let router = OsrmClient::new(&config.routing);
    info!(base_url = config.routing.base_url.as_str(), profile = config.routing.profile.as_str(); "Using OSRM routing service");
    let mut etl = EnrichEdgesEtl::new(config, router)?;
    etl.process()
}

fn main() -> ExitCode {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let user_config = match load_user_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        },
    };
    setup_logging(&user_config.log_level);

    match run(&user_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = err.kind.as_str(), err = err.message.as_str(); "Run aborted");
            eprintln!("{}", err);
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{
            "edges_path": "data/edges.kml",
            "nodes_path": "data/nodes.kml",
            "output_path": "output/edges.csv"
        }"#).unwrap();

        let config = load_user_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.routing.base_url, "http://router.project-osrm.org");
        assert_eq!(config.routing.profile, "driving");
        assert_eq!(config.routing.min_request_interval_ms, 500);
        assert_eq!(config.capacity.default_capacity, 1000);
        assert_eq!(config.capacity.rules.len(), 3);
        assert_eq!(config.max_snap_distance_m, None);
        assert!(config.overwrite);
        assert!(config.progress);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn shipped_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/edges.json");
        let config = load_user_config(path).unwrap();
        assert!(capacity::CapacityTable::from_config(&config.capacity).is_ok());
    }

    #[test]
    fn bad_config_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{ "edges_path": "a.kml" }"#).unwrap();
        let err = load_user_config(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, errors::ErrorKind::Config);

        std::fs::write(&path, r#"{
            "edges_path": "a", "nodes_path": "b", "output_path": "c",
            "max_snap_distance_m": -1.0
        }"#).unwrap();
        let err = load_user_config(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, errors::ErrorKind::Config);

        let err = load_user_config(dir.path().join("missing.json").to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind, errors::ErrorKind::Config);
    }
}
