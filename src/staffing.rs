//! Staff allocation.
//!
//! Selects staff for a session, preferring whoever is furthest from their
//! fortnightly contracted-hours quota. All fairness arithmetic goes through
//! `fortnight_window_for` so rankings stay consistent across sessions and
//! reporting consumers.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{ProgramInstance, StaffAssignment, StaffId, StaffRole};
use crate::store::MemoryStore;

/// The payroll fortnight containing `date`: a 14-day window starting on a
/// Monday, aligned so the same dates always land in the same window.
/// Returns (start, end) with both days inclusive.
pub fn fortnight_window_for(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    // Consecutive Mondays get consecutive week indices, so the parity below
    // never drifts.
    let week_index = monday.num_days_from_ce().div_euclid(7);
    let start = if week_index % 2 == 0 {
        monday
    } else {
        monday - Duration::days(7)
    };
    (start, start + Duration::days(13))
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffingOutcome {
    pub assignments: Vec<StaffAssignment>,
    /// How many required positions could not be filled. Non-fatal: the
    /// session proceeds understaffed.
    pub shortfall: u32,
}

struct Candidate {
    staff_id: StaffId,
    allocated_minutes: i64,
    remaining_minutes: i64,
}

/// Assigns staff to an instance up to `required`, never downsizing an
/// already-sufficient assignment set.
pub fn allocate_staff(
    store: &mut MemoryStore,
    instance: &ProgramInstance,
    required: u32,
) -> StaffingOutcome {
    let current: Vec<StaffAssignment> = store
        .staff_assignments_for(instance.id)
        .into_iter()
        .cloned()
        .collect();

    if current.len() as u32 >= required {
        return StaffingOutcome {
            assignments: current,
            shortfall: 0,
        };
    }

    let additional_needed = required - current.len() as u32;
    let weekday = instance.date.weekday();
    let window = fortnight_window_for(instance.date);

    let mut candidates: Vec<Candidate> = store
        .staff_members()
        .filter(|s| current.iter().all(|a| a.staff_id != s.id))
        .filter(|s| {
            s.availability
                .iter()
                .any(|w| w.covers(weekday, instance.start_time, instance.end_time))
        })
        .map(|s| {
            let allocated = store.allocated_minutes(s.id, window);
            Candidate {
                staff_id: s.id,
                allocated_minutes: allocated,
                remaining_minutes: (s.contracted_hours * 60.0) as i64 - allocated,
            }
        })
        .collect();

    // Furthest from quota first; ties go to whoever has fewer hours booked,
    // then lowest id for determinism.
    candidates.sort_by_key(|c| (-c.remaining_minutes, c.allocated_minutes, c.staff_id));

    let mut assignments = current;
    for candidate in candidates.into_iter().take(additional_needed as usize) {
        let role = if assignments.is_empty() {
            StaffRole::Lead
        } else {
            StaffRole::Support
        };
        let assignment = StaffAssignment {
            staff_id: candidate.staff_id,
            instance_id: instance.id,
            role,
        };
        debug!(
            staff_id = candidate.staff_id,
            instance_id = instance.id,
            remaining_minutes = candidate.remaining_minutes,
            ?role,
            "assigning staff"
        );
        store.insert_staff_assignment(assignment.clone());
        assignments.push(assignment);
    }

    let shortfall = required.saturating_sub(assignments.len() as u32);
    if shortfall > 0 {
        warn!(
            instance_id = instance.id,
            required, shortfall, "not enough available staff, session proceeds understaffed"
        );
    }

    StaffingOutcome {
        assignments,
        shortfall,
    }
}
