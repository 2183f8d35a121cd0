//! Test fixtures for care-planner.
//!
//! Builders for a small care-service world: a depot, a venue, participants
//! scattered across nearby suburbs, weekday staff and a vehicle fleet.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveTime, Weekday};

use care_planner::engine::Engine;
use care_planner::model::{
    AvailabilityWindow, LatLng, Participant, ParticipantId, ProgramId, ProgramInstance, Staff,
    StaffId, Vehicle, VehicleId,
};
use care_planner::route::RoutePlanner;
use care_planner::store::MemoryStore;

pub const DEPOT: LatLng = (-37.8000, 144.9500);
pub const DEPOT_ADDRESS: &str = "Fleet depot, 1 Yard Rd";
pub const VENUE: LatLng = (-37.8136, 144.9631);
pub const VENUE_ADDRESS: &str = "Community hall, 20 Main St";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Deterministic home location scattered around the venue.
pub fn home_of(id: ParticipantId) -> LatLng {
    (
        -37.78 - (id % 7) as f64 * 0.012,
        144.93 + (id % 5) as f64 * 0.017,
    )
}

pub fn participant(id: ParticipantId, needs_transport: bool) -> Participant {
    Participant {
        id,
        name: format!("participant-{}", id),
        address: format!("{} Example St", id),
        location: home_of(id),
        pickup_required: needs_transport,
        dropoff_required: needs_transport,
    }
}

/// Staff available all weekdays, 8:00-18:00.
pub fn weekday_staff(id: StaffId, contracted_hours: f64) -> Staff {
    let availability = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
    .into_iter()
    .map(|weekday| AvailabilityWindow {
        weekday,
        start: time(8, 0),
        end: time(18, 0),
    })
    .collect();

    Staff {
        id,
        name: format!("staff-{}", id),
        contracted_hours,
        availability,
    }
}

pub fn bus(id: VehicleId) -> Vehicle {
    Vehicle {
        id,
        name: format!("bus-{}", id),
        seats: 12,
    }
}

/// A 9:00-15:00 session at the venue.
pub fn session(id: u64, program_id: ProgramId, on: NaiveDate) -> ProgramInstance {
    ProgramInstance {
        id,
        program_id,
        date: on,
        start_time: time(9, 0),
        end_time: time(15, 0),
        venue_address: VENUE_ADDRESS.to_string(),
        venue_location: VENUE,
    }
}

/// Engine over the given store with no routing provider configured.
pub fn engine_with(store: MemoryStore) -> Engine {
    Engine::new(store, RoutePlanner::fallback_only(), DEPOT, DEPOT_ADDRESS)
}
