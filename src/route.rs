//! Route planning: external optimizer with nearest-neighbor fallback.
//!
//! The provider is chosen once at construction. Planning never fails: any
//! provider error degrades to the deterministic haversine heuristic, so
//! callers only ever observe reduced route quality.

use tracing::warn;

use crate::error::RouteError;
use crate::haversine::{haversine_km, travel_minutes, DEFAULT_SPEED_KMH};
use crate::model::{LatLng, ParticipantId};

/// Fixed per-stop service time (boarding/alighting) in minutes.
pub const STOP_SERVICE_MINUTES: f64 = 5.0;

/// A stop to be ordered into a route.
#[derive(Debug, Clone)]
pub struct StopCandidate {
    pub participant_id: ParticipantId,
    pub address: String,
    pub location: LatLng,
}

/// Provider result: visiting order as indices into the input stop slice,
/// plus travel totals.
#[derive(Debug, Clone)]
pub struct OptimizedRoute {
    pub order: Vec<usize>,
    pub total_km: f64,
    pub total_minutes: f64,
}

/// External road-network route optimization.
pub trait RouteOptimizer {
    fn optimize(
        &self,
        origin: LatLng,
        stops: &[StopCandidate],
        destination: LatLng,
    ) -> Result<OptimizedRoute, RouteError>;
}

/// A finished plan for one vehicle leg. `order` and `etas_minutes` are
/// aligned; ETAs are minutes from route start.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub order: Vec<usize>,
    pub etas_minutes: Vec<u32>,
    pub total_km: f64,
    pub total_minutes: u32,
}

pub struct RoutePlanner {
    provider: Option<Box<dyn RouteOptimizer>>,
    speed_kmh: f64,
}

impl RoutePlanner {
    pub fn new(provider: Option<Box<dyn RouteOptimizer>>) -> Self {
        Self {
            provider,
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }

    /// Fallback-only planner, useful when no provider is configured.
    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    pub fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }

    /// Orders `stops` into a route from `origin` to `destination`.
    pub fn plan(&self, origin: LatLng, stops: &[StopCandidate], destination: LatLng) -> PlannedRoute {
        if let Some(provider) = &self.provider {
            if !stops.is_empty() {
                match provider.optimize(origin, stops, destination) {
                    Ok(optimized) if is_permutation(&optimized.order, stops.len()) => {
                        let etas = self.cumulative_etas(origin, stops, &optimized.order);
                        let total = optimized.total_minutes
                            + stops.len() as f64 * STOP_SERVICE_MINUTES;
                        return PlannedRoute {
                            order: optimized.order,
                            etas_minutes: etas,
                            total_km: optimized.total_km,
                            total_minutes: total.round() as u32,
                        };
                    }
                    Ok(_) => {
                        warn!("provider returned an invalid visiting order, using fallback");
                    }
                    Err(err) => {
                        warn!(error = %err, "route provider failed, using nearest-neighbor fallback");
                    }
                }
            }
        }
        self.nearest_neighbor(origin, stops, destination)
    }

    /// Greedy nearest-neighbor ordering seeded at `origin`. Equidistant
    /// candidates resolve to the first in input order, keeping the result
    /// deterministic.
    fn nearest_neighbor(
        &self,
        origin: LatLng,
        stops: &[StopCandidate],
        destination: LatLng,
    ) -> PlannedRoute {
        let mut remaining: Vec<usize> = (0..stops.len()).collect();
        let mut order = Vec::with_capacity(stops.len());
        let mut position = origin;
        let mut total_km = 0.0;

        while !remaining.is_empty() {
            let mut best_slot = 0;
            let mut best_km = f64::INFINITY;
            for (slot, &stop_index) in remaining.iter().enumerate() {
                let km = haversine_km(position, stops[stop_index].location);
                if km < best_km {
                    best_km = km;
                    best_slot = slot;
                }
            }
            let stop_index = remaining.remove(best_slot);
            total_km += best_km;
            position = stops[stop_index].location;
            order.push(stop_index);
        }

        total_km += haversine_km(position, destination);

        let etas = self.cumulative_etas(origin, stops, &order);
        let total_minutes = travel_minutes(total_km, self.speed_kmh)
            + stops.len() as f64 * STOP_SERVICE_MINUTES;

        PlannedRoute {
            order,
            etas_minutes: etas,
            total_km,
            total_minutes: total_minutes.round() as u32,
        }
    }

    /// Straight-line ETA estimates along an already-ordered route. Arrival
    /// at a stop includes service time spent at earlier stops.
    fn cumulative_etas(&self, origin: LatLng, stops: &[StopCandidate], order: &[usize]) -> Vec<u32> {
        let mut etas = Vec::with_capacity(order.len());
        let mut position = origin;
        let mut elapsed = 0.0;
        for &stop_index in order {
            let leg = haversine_km(position, stops[stop_index].location);
            elapsed += travel_minutes(leg, self.speed_kmh);
            etas.push(elapsed.round() as u32);
            elapsed += STOP_SERVICE_MINUTES;
            position = stops[stop_index].location;
        }
        etas
    }
}

fn is_permutation(order: &[usize], n: usize) -> bool {
    if order.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    order
        .iter()
        .all(|&i| i < n && !std::mem::replace(&mut seen[i], true))
}
