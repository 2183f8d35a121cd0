//! Resource requirement calculation.
//!
//! Pure ratios from headcounts to required staff and vehicles. The vehicle
//! count takes the maximum of a preferred loading density and a hard
//! capacity ceiling, so neither constraint can be violated.

use serde::Serialize;

/// One staff member per four participants.
pub const PARTICIPANTS_PER_STAFF: u32 = 4;

/// Preferred transport-participants per vehicle.
pub const PREFERRED_PER_VEHICLE: u32 = 5;

/// Hard capacity ceiling of transport-participants per vehicle.
pub const MAX_PER_VEHICLE: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceRequirements {
    pub staff: u32,
    pub vehicles: u32,
}

pub fn required_staff(participant_count: usize) -> u32 {
    (participant_count as u32).div_ceil(PARTICIPANTS_PER_STAFF)
}

pub fn required_vehicles(transport_count: usize) -> u32 {
    let count = transport_count as u32;
    let preferred = count.div_ceil(PREFERRED_PER_VEHICLE);
    let capacity = count.div_ceil(MAX_PER_VEHICLE);
    preferred.max(capacity)
}

pub fn required_resources(participant_count: usize, transport_count: usize) -> ResourceRequirements {
    ResourceRequirements {
        staff: required_staff(participant_count),
        vehicles: required_vehicles(transport_count),
    }
}
