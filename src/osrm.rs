//! OSRM HTTP adapter implementing the route-optimization provider seam.
//!
//! Uses the trip service with a fixed start and end to get true
//! road-network waypoint optimization. Every failure maps to `RouteError`;
//! the planner turns that into the nearest-neighbor fallback.

use serde::Deserialize;

use crate::error::RouteError;
use crate::model::LatLng;
use crate::route::{OptimizedRoute, RouteOptimizer, StopCandidate};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, RouteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Builds a client only when `OSRM_BASE_URL` is configured. Absence of
    /// configuration means no provider, which the planner treats as
    /// fallback-only.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("OSRM_BASE_URL").ok()?;
        let config = OsrmConfig {
            base_url,
            ..OsrmConfig::default()
        };
        Self::new(config).ok()
    }
}

impl RouteOptimizer for OsrmClient {
    fn optimize(
        &self,
        origin: LatLng,
        stops: &[StopCandidate],
        destination: LatLng,
    ) -> Result<OptimizedRoute, RouteError> {
        let coords = std::iter::once(origin)
            .chain(stops.iter().map(|s| s.location))
            .chain(std::iter::once(destination))
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/trip/v1/{}/{}?roundtrip=false&source=first&destination=last",
            self.config.base_url, self.config.profile, coords
        );

        let body: OsrmTripResponse = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json()?;

        if body.code != "Ok" {
            return Err(RouteError::Api(body.code));
        }

        let trip = body
            .trips
            .into_iter()
            .next()
            .ok_or(RouteError::EmptyResponse)?;

        // Waypoints come back in input order; waypoint_index is each one's
        // position in the optimized trip. Skip the origin and destination
        // anchors, then sort the stops by trip position.
        if body.waypoints.len() != stops.len() + 2 {
            return Err(RouteError::EmptyResponse);
        }
        let mut positioned: Vec<(usize, usize)> = body.waypoints[1..=stops.len()]
            .iter()
            .enumerate()
            .map(|(input_index, wp)| (wp.waypoint_index, input_index))
            .collect();
        positioned.sort_unstable();

        Ok(OptimizedRoute {
            order: positioned.into_iter().map(|(_, i)| i).collect(),
            total_km: trip.distance / 1000.0,
            total_minutes: trip.duration / 60.0,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTripResponse {
    code: String,
    #[serde(default)]
    trips: Vec<OsrmTrip>,
    #[serde(default)]
    waypoints: Vec<OsrmWaypoint>,
}

#[derive(Debug, Deserialize)]
struct OsrmTrip {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    waypoint_index: usize,
}
