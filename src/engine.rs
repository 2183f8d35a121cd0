//! Recalculation orchestrator.
//!
//! Entry points for participant-change events and simulated-date advances.
//! Each instance's rebalance runs in its own transaction; recalculating a
//! whole date proceeds sequentially and stops at the first failure, leaving
//! already-committed instances in place and reporting the stopping point.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::model::{
    AssignmentId, Attendance, AttendanceStatus, InstanceId, LatLng, ParticipantId,
    ProgramInstance, Route, RouteKind, RouteStop, VehicleId,
};
use crate::pending::process_pending_changes;
use crate::requirements::required_resources;
use crate::route::{PlannedRoute, RoutePlanner, StopCandidate};
use crate::staffing::allocate_staff;
use crate::store::MemoryStore;
use crate::vehicles::{allocate_vehicles, distribute_participants};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantChange {
    Add,
    Cancel,
    Leave,
}

#[derive(Debug, Clone, Serialize)]
pub enum ResourceWarning {
    StaffShortfall { required: u32, allocated: u32 },
    VehicleShortfall { required: u32, allocated: u32 },
    DriverUnassigned { vehicle_id: VehicleId },
}

/// Outcome of one instance's recalculation, consumed by dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceSummary {
    pub instance_id: InstanceId,
    pub participant_count: usize,
    pub transport_count: usize,
    pub required_staff: u32,
    pub allocated_staff: u32,
    pub required_vehicles: u32,
    pub allocated_vehicles: u32,
    pub routes: Vec<Route>,
    pub warnings: Vec<ResourceWarning>,
}

/// Result of recalculating a set of instances sequentially. `failed_at`
/// reports the first instance whose rebalance rolled back; earlier entries
/// in `processed` stay committed and later instances were not attempted.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub processed: Vec<InstanceId>,
    pub failed_at: Option<InstanceId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculationReport {
    pub changes_processed: u32,
    pub batch: BatchOutcome,
    pub summaries: Vec<RebalanceSummary>,
}

pub struct Engine {
    store: MemoryStore,
    planner: RoutePlanner,
    depot: LatLng,
    depot_address: String,
}

impl Engine {
    pub fn new(
        store: MemoryStore,
        planner: RoutePlanner,
        depot: LatLng,
        depot_address: impl Into<String>,
    ) -> Self {
        Self {
            store,
            planner,
            depot,
            depot_address: depot_address.into(),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Seam for the CRUD layer (and test fixtures) that owns the
    /// directories.
    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    /// Applies one participant-change event to attendance, then rebalances
    /// the affected instance. Unknown ids are rejected before any mutation.
    pub fn handle_participant_change(
        &mut self,
        participant_id: ParticipantId,
        instance_id: InstanceId,
        change: ParticipantChange,
    ) -> Result<RebalanceSummary, EngineError> {
        let participant = self
            .store
            .participant(participant_id)
            .cloned()
            .ok_or(EngineError::UnknownParticipant(participant_id))?;
        if self.store.instance(instance_id).is_none() {
            return Err(EngineError::UnknownInstance(instance_id));
        }

        // Attendance commits on its own; the rebalance is a separate
        // transaction over derived state.
        self.store.transaction(|store| {
            match change {
                ParticipantChange::Add => {
                    if store.attendance(participant_id, instance_id).is_some() {
                        // Re-activating a cancelled record is idempotent.
                        store.set_attendance_status(
                            participant_id,
                            instance_id,
                            AttendanceStatus::Confirmed,
                        );
                    } else {
                        store.upsert_attendance(Attendance {
                            participant_id,
                            instance_id,
                            status: AttendanceStatus::Confirmed,
                            pickup_required: participant.pickup_required,
                            dropoff_required: participant.dropoff_required,
                        });
                    }
                }
                ParticipantChange::Cancel => {
                    if store.attendance(participant_id, instance_id).is_some() {
                        store.set_attendance_status(
                            participant_id,
                            instance_id,
                            AttendanceStatus::Cancelled,
                        );
                    } else {
                        // An enrolled participant may be cancelled before
                        // the sync has derived their row; record the
                        // cancellation so the sync cannot re-add them.
                        store.upsert_attendance(Attendance {
                            participant_id,
                            instance_id,
                            status: AttendanceStatus::Cancelled,
                            pickup_required: participant.pickup_required,
                            dropoff_required: participant.dropoff_required,
                        });
                    }
                }
                ParticipantChange::Leave => {
                    store.remove_attendance(participant_id, instance_id);
                }
            }
            Ok(())
        })?;

        self.rebalance_resources(instance_id)
    }

    /// Advances the simulated clock: applies due enrollment changes, then
    /// rebalances every affected instance in (date, id) order, fail-fast.
    pub fn trigger_recalculation(
        &mut self,
        simulated_date: NaiveDate,
    ) -> Result<RecalculationReport, EngineError> {
        let outcome = process_pending_changes(&mut self.store, simulated_date)?;

        // A processed change only alters its own program's membership, so
        // the working set is that program's instances from the effective
        // date onward (collected by the processor), not every instance on
        // the touched dates.
        let mut targets: Vec<(NaiveDate, InstanceId)> = outcome
            .affected_instances
            .iter()
            .filter_map(|id| self.store.instance(*id).map(|i| (i.date, i.id)))
            .collect();
        targets.sort_unstable();

        let mut processed = Vec::new();
        let mut summaries = Vec::new();
        let mut failed_at = None;

        for (_, instance_id) in targets {
            match self.rebalance_resources(instance_id) {
                Ok(summary) => {
                    processed.push(instance_id);
                    summaries.push(summary);
                }
                Err(err) => {
                    warn!(
                        instance_id,
                        error = %err,
                        "rebalance failed, stopping batch; earlier instances stay committed"
                    );
                    failed_at = Some(instance_id);
                    break;
                }
            }
        }

        Ok(RecalculationReport {
            changes_processed: outcome.changes_processed,
            batch: BatchOutcome {
                processed,
                failed_at,
            },
            summaries,
        })
    }

    /// Recomputes requirements, assignments and routes for one instance
    /// inside a single transaction.
    pub fn rebalance_resources(
        &mut self,
        instance_id: InstanceId,
    ) -> Result<RebalanceSummary, EngineError> {
        let instance = self
            .store
            .instance(instance_id)
            .cloned()
            .ok_or(EngineError::UnknownInstance(instance_id))?;

        let planner = &self.planner;
        let depot = self.depot;
        let depot_address = self.depot_address.clone();

        let summary = self.store.transaction(move |store| {
            rebalance(store, planner, depot, &depot_address, &instance)
        })?;

        info!(
            instance_id,
            participants = summary.participant_count,
            staff = summary.allocated_staff,
            vehicles = summary.allocated_vehicles,
            routes = summary.routes.len(),
            warnings = summary.warnings.len(),
            "rebalanced resources"
        );
        Ok(summary)
    }
}

fn rebalance(
    store: &mut MemoryStore,
    planner: &RoutePlanner,
    depot: LatLng,
    depot_address: &str,
    instance: &ProgramInstance,
) -> Result<RebalanceSummary, EngineError> {
    sync_attendance_from_enrollment(store, instance);

    let confirmed: Vec<Attendance> = store
        .attendance_for_instance(instance.id)
        .into_iter()
        .filter(|a| a.status == AttendanceStatus::Confirmed)
        .cloned()
        .collect();
    let transport_ids: Vec<ParticipantId> = confirmed
        .iter()
        .filter(|a| a.needs_transport())
        .map(|a| a.participant_id)
        .collect();

    let required = required_resources(confirmed.len(), transport_ids.len());

    let staffing = allocate_staff(store, instance, required.staff);
    let vehicle_outcome = allocate_vehicles(store, instance, transport_ids.len());

    let buckets = distribute_participants(&transport_ids, vehicle_outcome.assignments.len());

    let mut routes = Vec::new();
    for (assignment, bucket) in vehicle_outcome.assignments.iter().zip(&buckets) {
        let pickup_stops = stops_for(store, instance, bucket, RouteKind::Pickup);
        if !pickup_stops.is_empty() {
            let plan = planner.plan(depot, &pickup_stops, instance.venue_location);
            routes.push(build_route(
                assignment.id,
                RouteKind::Pickup,
                depot_address,
                depot,
                &pickup_stops,
                plan,
            ));
        }

        let dropoff_stops = stops_for(store, instance, bucket, RouteKind::Dropoff);
        if !dropoff_stops.is_empty() {
            let plan = planner.plan(instance.venue_location, &dropoff_stops, depot);
            routes.push(build_route(
                assignment.id,
                RouteKind::Dropoff,
                &instance.venue_address,
                instance.venue_location,
                &dropoff_stops,
                plan,
            ));
        }
    }

    let assignment_ids: Vec<AssignmentId> =
        vehicle_outcome.assignments.iter().map(|a| a.id).collect();
    store.replace_routes(&assignment_ids, routes.clone());

    let mut warnings = Vec::new();
    if staffing.shortfall > 0 {
        warnings.push(ResourceWarning::StaffShortfall {
            required: required.staff,
            allocated: staffing.assignments.len() as u32,
        });
    }
    if vehicle_outcome.shortfall > 0 {
        warnings.push(ResourceWarning::VehicleShortfall {
            required: required.vehicles,
            allocated: vehicle_outcome.assignments.len() as u32,
        });
    }
    for vehicle_id in &vehicle_outcome.driverless {
        warnings.push(ResourceWarning::DriverUnassigned {
            vehicle_id: *vehicle_id,
        });
    }

    Ok(RebalanceSummary {
        instance_id: instance.id,
        participant_count: confirmed.len(),
        transport_count: transport_ids.len(),
        required_staff: required.staff,
        allocated_staff: staffing.assignments.len() as u32,
        required_vehicles: required.vehicles,
        allocated_vehicles: vehicle_outcome.assignments.len() as u32,
        routes,
        warnings,
    })
}

/// Brings attendance rows in line with the enrollment ledger. Enrolled
/// participants get a confirmed row if they have none; participants whose
/// enrollment lapsed lose theirs. One-off attendees (no enrollment history
/// for this program) and explicit cancellations are left untouched.
fn sync_attendance_from_enrollment(store: &mut MemoryStore, instance: &ProgramInstance) {
    let enrolled = store.enrolled_participants(instance.program_id, instance.date);

    for participant_id in &enrolled {
        if store.attendance(*participant_id, instance.id).is_some() {
            continue;
        }
        match store.participant(*participant_id).cloned() {
            Some(participant) => store.upsert_attendance(Attendance {
                participant_id: *participant_id,
                instance_id: instance.id,
                status: AttendanceStatus::Confirmed,
                pickup_required: participant.pickup_required,
                dropoff_required: participant.dropoff_required,
            }),
            None => warn!(
                participant_id = *participant_id,
                "enrollment references unknown participant, skipping"
            ),
        }
    }

    let lapsed: Vec<ParticipantId> = store
        .attendance_for_instance(instance.id)
        .into_iter()
        .filter(|a| !enrolled.contains(&a.participant_id))
        .filter(|a| !store.enrollments_for(a.participant_id, instance.program_id).is_empty())
        .map(|a| a.participant_id)
        .collect();
    for participant_id in lapsed {
        store.remove_attendance(participant_id, instance.id);
    }
}

/// Stops for one leg of a vehicle's run, keeping only participants whose
/// attendance requests that leg.
fn stops_for(
    store: &MemoryStore,
    instance: &ProgramInstance,
    bucket: &[ParticipantId],
    kind: RouteKind,
) -> Vec<StopCandidate> {
    bucket
        .iter()
        .filter_map(|participant_id| {
            let attendance = store.attendance(*participant_id, instance.id)?;
            let wanted = match kind {
                RouteKind::Pickup => attendance.pickup_required,
                RouteKind::Dropoff => attendance.dropoff_required,
            };
            if !wanted {
                return None;
            }
            let participant = store.participant(*participant_id)?;
            Some(StopCandidate {
                participant_id: *participant_id,
                address: participant.address.clone(),
                location: participant.location,
            })
        })
        .collect()
}

/// Materializes a planned leg as a persistable route: the anchor stop
/// (depot or venue) first, then participants in visiting order with dense
/// 1..N stop numbers.
fn build_route(
    assignment_id: AssignmentId,
    kind: RouteKind,
    anchor_address: &str,
    anchor_location: LatLng,
    stops: &[StopCandidate],
    plan: PlannedRoute,
) -> Route {
    let mut route_stops = Vec::with_capacity(plan.order.len() + 1);
    route_stops.push(RouteStop {
        stop_order: 1,
        participant_id: None,
        address: anchor_address.to_string(),
        location: anchor_location,
        eta_minutes: 0,
    });
    for (position, (&stop_index, &eta)) in
        plan.order.iter().zip(plan.etas_minutes.iter()).enumerate()
    {
        let stop = &stops[stop_index];
        route_stops.push(RouteStop {
            stop_order: position as u32 + 2,
            participant_id: Some(stop.participant_id),
            address: stop.address.clone(),
            location: stop.location,
            eta_minutes: eta,
        });
    }

    Route {
        vehicle_assignment_id: assignment_id,
        kind,
        estimated_distance_km: plan.total_km,
        estimated_duration_minutes: plan.total_minutes,
        stops: route_stops,
    }
}
