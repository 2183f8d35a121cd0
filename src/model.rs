//! Domain model for the allocation engine.
//!
//! Attendance and enrollment rows are the durable truth. Staff assignments,
//! vehicle assignments and routes are derived state: safe to delete and
//! regenerate at any time from attendance plus the resource directories.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub type ParticipantId = u64;
pub type StaffId = u64;
pub type VehicleId = u64;
pub type ProgramId = u64;
pub type InstanceId = u64;
pub type EnrollmentId = u64;
pub type ChangeId = u64;
pub type AssignmentId = u64;

/// Location coordinates (lat, lng).
pub type LatLng = (f64, f64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub address: String,
    pub location: LatLng,
    pub pickup_required: bool,
    pub dropoff_required: bool,
}

/// Weekly availability window for a staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    /// Whether this window fully contains [start, end) on the given weekday.
    pub fn covers(&self, weekday: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        self.weekday == weekday && self.start <= start && self.end >= end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    /// Contracted hours per fortnight (payroll quota).
    pub contracted_hours: f64,
    pub availability: Vec<AvailabilityWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub seats: u32,
}

/// One concrete dated occurrence of a recurring program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramInstance {
    pub id: InstanceId,
    pub program_id: ProgramId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub venue_address: String,
    pub venue_location: LatLng,
}

impl ProgramInstance {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Confirmed,
    Cancelled,
}

/// At most one row per (participant, instance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub participant_id: ParticipantId,
    pub instance_id: InstanceId,
    pub status: AttendanceStatus,
    pub pickup_required: bool,
    pub dropoff_required: bool,
}

impl Attendance {
    pub fn needs_transport(&self) -> bool {
        self.pickup_required || self.dropoff_required
    }
}

/// A date interval during which a participant belongs to every instance of
/// a program. `end_date`, when set, is the last enrolled day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    pub id: EnrollmentId,
    pub participant_id: ParticipantId,
    pub program_id: ProgramId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl ProgramEnrollment {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.is_none_or(|end| date <= end)
    }

    pub fn is_open(&self) -> bool {
        self.end_date.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    Pending,
    Processed,
}

/// A scheduled future add/remove of program membership, applied when the
/// simulated clock reaches its effective date. The pending -> processed
/// transition is one-way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEnrollmentChange {
    pub id: ChangeId,
    pub participant_id: ParticipantId,
    pub program_id: ProgramId,
    pub action: PendingAction,
    pub effective_date: NaiveDate,
    pub status: ChangeStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffRole {
    Lead,
    Support,
}

/// Unique per (staff, instance); a session gets at most one lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAssignment {
    pub staff_id: StaffId,
    pub instance_id: InstanceId,
    pub role: StaffRole,
}

/// Unique per (vehicle, instance). A missing driver is flagged for manual
/// assignment, never treated as an allocation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleAssignment {
    pub id: AssignmentId,
    pub vehicle_id: VehicleId,
    pub instance_id: InstanceId,
    pub driver_staff_id: Option<StaffId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    Pickup,
    Dropoff,
}

/// A planned single-vehicle run. Regenerated wholesale on every
/// recalculation, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub vehicle_assignment_id: AssignmentId,
    pub kind: RouteKind,
    pub estimated_distance_km: f64,
    pub estimated_duration_minutes: u32,
    pub stops: Vec<RouteStop>,
}

/// One stop on a route. `participant_id` is None for the single anchor stop
/// (depot or venue). `stop_order` is dense 1..N within its route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub stop_order: u32,
    pub participant_id: Option<ParticipantId>,
    pub address: String,
    pub location: LatLng,
    /// Estimated arrival, minutes from route start.
    pub eta_minutes: u32,
}
