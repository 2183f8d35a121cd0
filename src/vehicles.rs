//! Vehicle allocation and participant distribution.
//!
//! Vehicles must not be double-booked across overlapping sessions on the
//! same date. Drivers come opportunistically from the session's non-lead
//! staff; a driverless vehicle is flagged for manual assignment rather than
//! failing the allocation.

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{ParticipantId, ProgramInstance, StaffRole, VehicleAssignment, VehicleId};
use crate::requirements::{required_vehicles, PREFERRED_PER_VEHICLE};
use crate::store::MemoryStore;

#[derive(Debug, Clone, Serialize)]
pub struct VehicleOutcome {
    pub assignments: Vec<VehicleAssignment>,
    /// Required vehicles that could not be sourced. Non-fatal.
    pub shortfall: u32,
    /// Vehicles assigned without a driver, awaiting manual assignment.
    pub driverless: Vec<VehicleId>,
}

/// Assigns vehicles to an instance up to the requirement for
/// `transport_count`, never downsizing an already-sufficient set.
pub fn allocate_vehicles(
    store: &mut MemoryStore,
    instance: &ProgramInstance,
    transport_count: usize,
) -> VehicleOutcome {
    let required = required_vehicles(transport_count);
    let current: Vec<VehicleAssignment> = store
        .vehicle_assignments_for(instance.id)
        .into_iter()
        .cloned()
        .collect();

    if current.len() as u32 >= required {
        return VehicleOutcome {
            driverless: driverless_of(&current),
            assignments: current,
            shortfall: 0,
        };
    }

    let additional_needed = (required - current.len() as u32) as usize;

    let free_vehicles: Vec<VehicleId> = store
        .fleet()
        .map(|v| v.id)
        .filter(|id| current.iter().all(|a| a.vehicle_id != *id))
        .filter(|id| {
            !store.vehicle_busy(
                *id,
                instance.date,
                instance.start_time,
                instance.end_time,
                instance.id,
            )
        })
        .take(additional_needed)
        .collect();

    // Non-lead session staff not already driving, matched positionally.
    let mut available_drivers: Vec<_> = {
        let taken: Vec<_> = current.iter().filter_map(|a| a.driver_staff_id).collect();
        store
            .staff_assignments_for(instance.id)
            .into_iter()
            .filter(|a| a.role != StaffRole::Lead && !taken.contains(&a.staff_id))
            .map(|a| a.staff_id)
            .collect()
    };
    available_drivers.reverse();

    let mut assignments = current;
    for vehicle_id in free_vehicles {
        let driver = available_drivers.pop();
        if driver.is_none() {
            warn!(
                vehicle_id,
                instance_id = instance.id,
                "no driver available, vehicle flagged for manual assignment"
            );
        }
        let id = store.insert_vehicle_assignment(vehicle_id, instance.id, driver);
        debug!(vehicle_id, instance_id = instance.id, ?driver, "assigning vehicle");
        assignments.push(VehicleAssignment {
            id,
            vehicle_id,
            instance_id: instance.id,
            driver_staff_id: driver,
        });
    }

    let shortfall = required.saturating_sub(assignments.len() as u32);
    if shortfall > 0 {
        warn!(
            instance_id = instance.id,
            required, shortfall, "not enough free vehicles for transport demand"
        );
    }

    VehicleOutcome {
        driverless: driverless_of(&assignments),
        assignments,
        shortfall,
    }
}

fn driverless_of(assignments: &[VehicleAssignment]) -> Vec<VehicleId> {
    assignments
        .iter()
        .filter(|a| a.driver_staff_id.is_none())
        .map(|a| a.vehicle_id)
        .collect()
}

/// Splits transport participants across vehicles: a first pass fills each
/// vehicle up to the preferred load in assignment order, then any remainder
/// round-robins one at a time. This split, not seat capacity, decides who
/// rides where and feeds route planning.
pub fn distribute_participants(
    participants: &[ParticipantId],
    vehicle_count: usize,
) -> Vec<Vec<ParticipantId>> {
    if vehicle_count == 0 {
        return Vec::new();
    }

    let mut buckets: Vec<Vec<ParticipantId>> = vec![Vec::new(); vehicle_count];
    let mut queue = participants.iter().copied();

    'fill: for bucket in &mut buckets {
        for _ in 0..PREFERRED_PER_VEHICLE {
            match queue.next() {
                Some(participant) => bucket.push(participant),
                None => break 'fill,
            }
        }
    }

    let mut index = 0;
    for participant in queue {
        buckets[index].push(participant);
        index = (index + 1) % vehicle_count;
    }

    buckets
}
