//! End-to-end recalculation tests over the in-memory store with the
//! nearest-neighbor fallback planner (no routing provider configured).

mod fixtures;

use std::collections::HashSet;

use care_planner::engine::{ParticipantChange, ResourceWarning};
use care_planner::error::EngineError;
use care_planner::model::{AttendanceStatus, RouteKind, StaffRole};
use care_planner::store::MemoryStore;

use fixtures::{bus, date, engine_with, participant, session, weekday_staff, DEPOT};

/// 18 confirmed participants, 10 needing transport, enrolled in one program
/// with a session on a Tuesday.
fn scenario_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for id in 1..=18u64 {
        store.add_participant(participant(id, id <= 10));
        store.insert_enrollment(id, 1, date(2024, 1, 1));
    }
    for id in 1..=6u64 {
        store.add_staff(weekday_staff(id, 76.0));
    }
    for id in 1..=3u64 {
        store.add_vehicle(bus(id));
    }
    store.add_instance(session(100, 1, date(2024, 3, 5)));
    store
}

#[test]
fn scenario_eighteen_participants_ten_transport() {
    let mut engine = engine_with(scenario_store());
    let summary = engine.rebalance_resources(100).unwrap();

    assert_eq!(summary.participant_count, 18);
    assert_eq!(summary.transport_count, 10);
    assert_eq!(summary.required_staff, 5);
    assert_eq!(summary.allocated_staff, 5);
    assert_eq!(summary.required_vehicles, 2);
    assert_eq!(summary.allocated_vehicles, 2);
    assert!(summary.warnings.is_empty());

    // 10 transport participants split 5/5, one pickup and one dropoff route
    // per vehicle.
    assert_eq!(summary.routes.len(), 4);
    let pickups: Vec<_> = summary
        .routes
        .iter()
        .filter(|r| r.kind == RouteKind::Pickup)
        .collect();
    assert_eq!(pickups.len(), 2);
    for route in &pickups {
        // Anchor plus five participants, densely numbered.
        assert_eq!(route.stops.len(), 6);
        let anchor = &route.stops[0];
        assert_eq!(anchor.stop_order, 1);
        assert!(anchor.participant_id.is_none());
        assert_eq!(anchor.location, DEPOT);
        for (index, stop) in route.stops.iter().enumerate() {
            assert_eq!(stop.stop_order, index as u32 + 1);
        }
        assert!(route.stops[1..].iter().all(|s| s.participant_id.is_some()));
    }

    // No participant rides in two vehicles.
    let mut riders = HashSet::new();
    for route in &pickups {
        for stop in &route.stops[1..] {
            assert!(riders.insert(stop.participant_id.unwrap()));
        }
    }
    assert_eq!(riders.len(), 10);
}

#[test]
fn session_has_exactly_one_lead() {
    let mut engine = engine_with(scenario_store());
    engine.rebalance_resources(100).unwrap();

    let assignments = engine.store().staff_assignments_for(100);
    let leads = assignments
        .iter()
        .filter(|a| a.role == StaffRole::Lead)
        .count();
    assert_eq!(leads, 1);
    assert_eq!(assignments[0].role, StaffRole::Lead);
}

#[test]
fn rebalance_is_idempotent_without_attendance_changes() {
    let mut engine = engine_with(scenario_store());
    let first = engine.rebalance_resources(100).unwrap();
    let second = engine.rebalance_resources(100).unwrap();

    assert_eq!(second.participant_count, first.participant_count);
    assert_eq!(second.required_staff, first.required_staff);
    assert_eq!(second.allocated_staff, first.allocated_staff);
    assert_eq!(second.required_vehicles, first.required_vehicles);
    assert_eq!(second.allocated_vehicles, first.allocated_vehicles);

    let riders_first: HashSet<u64> = first
        .routes
        .iter()
        .flat_map(|r| r.stops.iter().filter_map(|s| s.participant_id))
        .collect();
    let riders_second: HashSet<u64> = second
        .routes
        .iter()
        .flat_map(|r| r.stops.iter().filter_map(|s| s.participant_id))
        .collect();
    assert_eq!(riders_first, riders_second);

    // Routes are regenerated both times, not accumulated.
    for assignment in engine.store().vehicle_assignments_for(100) {
        assert!(engine.store().routes_for_assignment(assignment.id).len() <= 2);
    }
}

#[test]
fn overlapping_sessions_never_share_a_vehicle() {
    let mut store = scenario_store();
    // Second session same day, overlapping window, same program.
    let mut afternoon = session(101, 1, date(2024, 3, 5));
    afternoon.start_time = fixtures::time(13, 0);
    afternoon.end_time = fixtures::time(17, 0);
    store.add_instance(afternoon);

    let mut engine = engine_with(store);
    engine.rebalance_resources(100).unwrap();
    engine.rebalance_resources(101).unwrap();

    let morning_vehicles: HashSet<u64> = engine
        .store()
        .vehicle_assignments_for(100)
        .iter()
        .map(|a| a.vehicle_id)
        .collect();
    let afternoon_vehicles: HashSet<u64> = engine
        .store()
        .vehicle_assignments_for(101)
        .iter()
        .map(|a| a.vehicle_id)
        .collect();

    assert!(morning_vehicles.is_disjoint(&afternoon_vehicles));
}

#[test]
fn understaffed_session_proceeds_with_warning() {
    let mut store = MemoryStore::new();
    for id in 1..=18u64 {
        store.add_participant(participant(id, id <= 10));
        store.insert_enrollment(id, 1, date(2024, 1, 1));
    }
    store.add_staff(weekday_staff(1, 76.0));
    for id in 1..=3u64 {
        store.add_vehicle(bus(id));
    }
    store.add_instance(session(100, 1, date(2024, 3, 5)));
    let mut engine = engine_with(store);

    let summary = engine.rebalance_resources(100).unwrap();
    assert_eq!(summary.required_staff, 5);
    assert_eq!(summary.allocated_staff, 1);
    assert!(summary.warnings.iter().any(|w| matches!(
        w,
        ResourceWarning::StaffShortfall {
            required: 5,
            allocated: 1
        }
    )));
}

#[test]
fn cancellation_shrinks_counts_and_readd_restores_them() {
    let mut engine = engine_with(scenario_store());
    engine.rebalance_resources(100).unwrap();

    let cancelled = engine
        .handle_participant_change(1, 100, ParticipantChange::Cancel)
        .unwrap();
    assert_eq!(cancelled.participant_count, 17);
    assert_eq!(cancelled.transport_count, 9);

    let restored = engine
        .handle_participant_change(1, 100, ParticipantChange::Add)
        .unwrap();
    assert_eq!(restored.participant_count, 18);
    assert_eq!(restored.transport_count, 10);
}

#[test]
fn cancel_before_first_rebalance_is_not_resurrected_by_sync() {
    let mut engine = engine_with(scenario_store());

    // No rebalance has run yet, so the enrolled participant has no
    // attendance row when the cancellation arrives.
    let summary = engine
        .handle_participant_change(1, 100, ParticipantChange::Cancel)
        .unwrap();
    assert_eq!(summary.participant_count, 17);
    assert_eq!(summary.transport_count, 9);

    // The sync must keep honoring the cancellation on later rebalances.
    let again = engine.rebalance_resources(100).unwrap();
    assert_eq!(again.participant_count, 17);
    assert_eq!(
        engine.store().attendance(1, 100).unwrap().status,
        AttendanceStatus::Cancelled
    );
}

#[test]
fn rebalance_summary_serializes_for_dashboards() {
    let mut engine = engine_with(scenario_store());
    let summary = engine.rebalance_resources(100).unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["participant_count"], 18);
    assert_eq!(json["required_staff"], 5);
    assert_eq!(json["allocated_vehicles"], 2);
    assert_eq!(json["routes"].as_array().unwrap().len(), 4);
}

#[test]
fn one_off_attendee_without_enrollment_survives_rebalance() {
    let mut store = scenario_store();
    store.add_participant(participant(50, true));
    let mut engine = engine_with(store);

    let summary = engine
        .handle_participant_change(50, 100, ParticipantChange::Add)
        .unwrap();
    assert_eq!(summary.participant_count, 19);

    // A plain rebalance must not drop the drop-in attendee.
    let again = engine.rebalance_resources(100).unwrap();
    assert_eq!(again.participant_count, 19);
}

#[test]
fn unknown_ids_are_rejected_without_side_effects() {
    let mut engine = engine_with(scenario_store());

    let unknown_participant =
        engine.handle_participant_change(999, 100, ParticipantChange::Add);
    assert!(matches!(
        unknown_participant,
        Err(EngineError::UnknownParticipant(999))
    ));

    let unknown_instance = engine.handle_participant_change(1, 999, ParticipantChange::Add);
    assert!(matches!(
        unknown_instance,
        Err(EngineError::UnknownInstance(999))
    ));

    assert!(engine.store().attendance_for_instance(100).is_empty());
}

#[test]
fn transport_flags_limit_routes_to_requested_legs() {
    let mut store = MemoryStore::new();
    let mut pickup_only = participant(1, true);
    pickup_only.dropoff_required = false;
    store.add_participant(pickup_only);
    store.insert_enrollment(1, 1, date(2024, 1, 1));
    store.add_staff(weekday_staff(1, 76.0));
    store.add_vehicle(bus(1));
    store.add_instance(session(100, 1, date(2024, 3, 5)));

    let mut engine = engine_with(store);
    let summary = engine.rebalance_resources(100).unwrap();

    assert_eq!(summary.routes.len(), 1);
    assert_eq!(summary.routes[0].kind, RouteKind::Pickup);
}
