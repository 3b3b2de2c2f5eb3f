use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;

use crate::data::Coordinate;
use crate::errors::{Error, Result};

#[derive(Deserialize, Debug, Clone)]
pub struct RoutingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            base_url: default_base_url(),
            profile: default_profile(),
            timeout_secs: default_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://router.project-osrm.org".to_string()
}

fn default_profile() -> String {
    "driving".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_request_interval_ms() -> u64 {
    500
}

/// Travel distance and time for one origin-destination pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub duration_s: f64,
}

pub trait RouteService {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg>;
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    distance: Option<f64>,
    duration: Option<f64>,
}

/// Pulls the first leg of the first route out of an OSRM `route` response.
pub fn parse_osrm_response(body: &str) -> Result<RouteLeg> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|err| Error::routing(format!("malformed response: {}", err)))?;

    if response.code != "Ok" {
        return Err(Error::routing(format!(
            "service answered '{}': {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }

    let leg = response.routes.first()
        .and_then(|route| route.legs.first())
        .ok_or_else(|| Error::routing("response holds no route legs"))?;

    let distance_m = leg.distance.ok_or_else(|| Error::routing("leg has no distance"))?;
    let duration_s = leg.duration.ok_or_else(|| Error::routing("leg has no duration"))?;

    if !(distance_m >= 0.0 && duration_s >= 0.0) {
        return Err(Error::routing(format!(
            "leg has invalid values: distance {} m, duration {} s",
            distance_m, duration_s
        )));
    }

    Ok(RouteLeg { distance_m, duration_s })
}

/// Error for a non-success HTTP status. OSRM explains refusals such as
/// `NoRoute` or `InvalidQuery` in a JSON body, which is kept when present.
pub fn status_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<OsrmResponse>(body) {
        Ok(response) => Error::routing(format!(
            "status {}: service answered '{}': {}",
            status,
            response.code,
            response.message.unwrap_or_default()
        )),
        Err(_) => Error::routing(format!("status {}", status)),
    }
}

pub struct OsrmClient {
    agent: ureq::Agent,
    base_url: String,
    profile: String,
}

impl OsrmClient {
    pub fn new(config: &RoutingConfig) -> OsrmClient {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("edge_table/", env!("CARGO_PKG_VERSION")))
            .build();
        OsrmClient {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
        }
    }

    /// OSRM wants `lon,lat` pairs.
    pub fn route_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=false",
            self.base_url, self.profile, origin.lon, origin.lat, destination.lon, destination.lat
        )
    }
}

impl RouteService for OsrmClient {
    fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteLeg> {
        let url = self.route_url(origin, destination);
        debug!(url = url.as_str(); "Requesting route");

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(status_error(status, &body));
            },
            Err(err) => return Err(err.into()),
        };
        let body = response.into_string()
            .map_err(|err| Error::routing(format!("could not read response body: {}", err)))?;

        parse_osrm_response(&body)
    }
}

/// Keeps successive calls to the routing service at least `interval` apart.
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Pacer {
        Pacer {
            interval,
            last: None,
        }
    }

    /// Blocks until the interval since the previous call has passed. The first
    /// call never waits.
    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn parses_first_leg() {
        let body = r#"{
            "code": "Ok",
            "routes": [
                { "legs": [ { "distance": 1234.5, "duration": 98.7, "summary": "" } ],
                  "distance": 1234.5, "duration": 98.7 },
                { "legs": [ { "distance": 1.0, "duration": 1.0 } ] }
            ],
            "waypoints": []
        }"#;
        let leg = parse_osrm_response(body).unwrap();
        assert_eq!(leg, RouteLeg { distance_m: 1234.5, duration_s: 98.7 });
    }

    #[test]
    fn status_error_keeps_service_reason() {
        let err = status_error(400, r#"{"code":"NoRoute","message":"Impossible route between points"}"#);
        assert_eq!(err.kind, ErrorKind::RoutingService);
        assert!(err.message.contains("400"));
        assert!(err.message.contains("NoRoute"));
        assert!(err.message.contains("Impossible route between points"));

        let err = status_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.kind, ErrorKind::RoutingService);
        assert_eq!(err.message, "status 502");
    }

    #[test]
    fn rejects_error_code() {
        let body = r#"{ "code": "NoRoute", "message": "Impossible route between points" }"#;
        let err = parse_osrm_response(body).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RoutingService);
        assert!(err.message.contains("NoRoute"));
    }

    #[test]
    fn rejects_missing_fields() {
        for body in [
            r#"{ "code": "Ok" }"#,
            r#"{ "code": "Ok", "routes": [] }"#,
            r#"{ "code": "Ok", "routes": [ { "legs": [] } ] }"#,
            r#"{ "code": "Ok", "routes": [ { "legs": [ { "duration": 4.0 } ] } ] }"#,
            r#"{ "code": "Ok", "routes": [ { "legs": [ { "distance": 4.0 } ] } ] }"#,
            r#"{ "code": "Ok", "routes": [ { "legs": [ { "distance": -4.0, "duration": 1.0 } ] } ] }"#,
            r#"<html>Bad Gateway</html>"#,
        ] {
            let err = parse_osrm_response(body).unwrap_err();
            assert_eq!(err.kind, ErrorKind::RoutingService, "{}", body);
        }
    }

    #[test]
    fn keeps_zero_duration_for_caller() {
        let body = r#"{ "code": "Ok", "routes": [ { "legs": [ { "distance": 0.0, "duration": 0.0 } ] } ] }"#;
        let leg = parse_osrm_response(body).unwrap();
        assert_eq!(leg.duration_s, 0.0);
    }

    #[test]
    fn url_uses_lon_lat_order() {
        let client = OsrmClient::new(&RoutingConfig {
            base_url: "http://localhost:5000/".to_string(),
            ..RoutingConfig::default()
        });
        let url = client.route_url(Coordinate::new(59.0, 18.0), Coordinate::new(59.01, 18.02));
        assert_eq!(url, "http://localhost:5000/route/v1/driving/18,59;18.02,59.01?overview=false");
    }

    #[test]
    fn pacer_spaces_calls() {
        let mut pacer = Pacer::new(Duration::from_millis(30));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(30));
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn zero_interval_never_sleeps() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
