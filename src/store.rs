//! In-memory store with snapshot transactions.
//!
//! The engine is a library; the durable store behind it is an external
//! collaborator. This implementation keeps all rows in memory and provides
//! the transaction scopes the engine relies on: one pending-change batch or
//! one instance's recalculation commits or rolls back as a unit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveTime};

use crate::error::EngineError;
use crate::model::{
    AssignmentId, Attendance, AttendanceStatus, ChangeId, ChangeStatus, EnrollmentId, InstanceId,
    Participant, ParticipantId, PendingAction, PendingEnrollmentChange, ProgramEnrollment,
    ProgramId, ProgramInstance, Route, Staff, StaffAssignment, StaffId, Vehicle,
    VehicleAssignment, VehicleId,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    participants: BTreeMap<ParticipantId, Participant>,
    staff: BTreeMap<StaffId, Staff>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    instances: BTreeMap<InstanceId, ProgramInstance>,
    attendance: Vec<Attendance>,
    enrollments: Vec<ProgramEnrollment>,
    pending_changes: Vec<PendingEnrollmentChange>,
    staff_assignments: Vec<StaffAssignment>,
    vehicle_assignments: Vec<VehicleAssignment>,
    routes: Vec<Route>,
    next_enrollment_id: EnrollmentId,
    next_change_id: ChangeId,
    next_assignment_id: AssignmentId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against this store, restoring the pre-call state on error.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStore) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Directories (owned by the CRUD layer, read-only to the engine)
    // ------------------------------------------------------------------

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant.id, participant);
    }

    pub fn add_staff(&mut self, staff: Staff) {
        self.staff.insert(staff.id, staff);
    }

    pub fn add_vehicle(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id, vehicle);
    }

    pub fn add_instance(&mut self, instance: ProgramInstance) {
        self.instances.insert(instance.id, instance);
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn staff_member(&self, id: StaffId) -> Option<&Staff> {
        self.staff.get(&id)
    }

    /// All staff in id order.
    pub fn staff_members(&self) -> impl Iterator<Item = &Staff> {
        self.staff.values()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// All vehicles in id order.
    pub fn fleet(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ProgramInstance> {
        self.instances.get(&id)
    }

    pub fn instances_on(&self, date: NaiveDate) -> Vec<&ProgramInstance> {
        self.instances.values().filter(|i| i.date == date).collect()
    }

    /// Instances of a program dated on or after `from`, in (date, id) order.
    pub fn instances_for_program_from(
        &self,
        program_id: ProgramId,
        from: NaiveDate,
    ) -> Vec<&ProgramInstance> {
        let mut found: Vec<&ProgramInstance> = self
            .instances
            .values()
            .filter(|i| i.program_id == program_id && i.date >= from)
            .collect();
        found.sort_by_key(|i| (i.date, i.id));
        found
    }

    // ------------------------------------------------------------------
    // Attendance
    // ------------------------------------------------------------------

    pub fn attendance(
        &self,
        participant_id: ParticipantId,
        instance_id: InstanceId,
    ) -> Option<&Attendance> {
        self.attendance
            .iter()
            .find(|a| a.participant_id == participant_id && a.instance_id == instance_id)
    }

    /// Rows for an instance in participant-id order.
    pub fn attendance_for_instance(&self, instance_id: InstanceId) -> Vec<&Attendance> {
        let mut rows: Vec<&Attendance> = self
            .attendance
            .iter()
            .filter(|a| a.instance_id == instance_id)
            .collect();
        rows.sort_by_key(|a| a.participant_id);
        rows
    }

    /// Inserts or replaces the row for (participant, instance).
    pub fn upsert_attendance(&mut self, row: Attendance) {
        if let Some(existing) = self
            .attendance
            .iter_mut()
            .find(|a| a.participant_id == row.participant_id && a.instance_id == row.instance_id)
        {
            *existing = row;
        } else {
            self.attendance.push(row);
        }
    }

    /// Sets the status of an existing row; missing rows are left alone.
    pub fn set_attendance_status(
        &mut self,
        participant_id: ParticipantId,
        instance_id: InstanceId,
        status: AttendanceStatus,
    ) {
        if let Some(row) = self
            .attendance
            .iter_mut()
            .find(|a| a.participant_id == participant_id && a.instance_id == instance_id)
        {
            row.status = status;
        }
    }

    pub fn remove_attendance(&mut self, participant_id: ParticipantId, instance_id: InstanceId) {
        self.attendance
            .retain(|a| !(a.participant_id == participant_id && a.instance_id == instance_id));
    }

    // ------------------------------------------------------------------
    // Enrollment ledger
    // ------------------------------------------------------------------

    pub fn enrollments_for(
        &self,
        participant_id: ParticipantId,
        program_id: ProgramId,
    ) -> Vec<&ProgramEnrollment> {
        self.enrollments
            .iter()
            .filter(|e| e.participant_id == participant_id && e.program_id == program_id)
            .collect()
    }

    pub fn open_enrollment(
        &self,
        participant_id: ParticipantId,
        program_id: ProgramId,
    ) -> Option<&ProgramEnrollment> {
        self.enrollments
            .iter()
            .find(|e| e.participant_id == participant_id && e.program_id == program_id && e.is_open())
    }

    /// Participants enrolled in a program on a date, in id order.
    pub fn enrolled_participants(&self, program_id: ProgramId, date: NaiveDate) -> Vec<ParticipantId> {
        let ids: BTreeSet<ParticipantId> = self
            .enrollments
            .iter()
            .filter(|e| e.program_id == program_id && e.covers(date))
            .map(|e| e.participant_id)
            .collect();
        ids.into_iter().collect()
    }

    pub fn insert_enrollment(
        &mut self,
        participant_id: ParticipantId,
        program_id: ProgramId,
        start_date: NaiveDate,
    ) -> EnrollmentId {
        self.next_enrollment_id += 1;
        let id = self.next_enrollment_id;
        self.enrollments.push(ProgramEnrollment {
            id,
            participant_id,
            program_id,
            start_date,
            end_date: None,
        });
        id
    }

    pub fn close_enrollment(
        &mut self,
        enrollment_id: EnrollmentId,
        end_date: NaiveDate,
    ) -> Result<(), EngineError> {
        let enrollment = self
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment_id)
            .ok_or_else(|| EngineError::Storage(format!("enrollment {} not found", enrollment_id)))?;
        enrollment.end_date = Some(end_date);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pending enrollment changes
    // ------------------------------------------------------------------

    pub fn add_pending_change(
        &mut self,
        participant_id: ParticipantId,
        program_id: ProgramId,
        action: PendingAction,
        effective_date: NaiveDate,
    ) -> ChangeId {
        self.next_change_id += 1;
        let id = self.next_change_id;
        self.pending_changes.push(PendingEnrollmentChange {
            id,
            participant_id,
            program_id,
            action,
            effective_date,
            status: ChangeStatus::Pending,
        });
        id
    }

    /// Pending changes due as of `date`, ordered by (effective_date, id).
    pub fn due_pending_changes(&self, date: NaiveDate) -> Vec<PendingEnrollmentChange> {
        let mut due: Vec<PendingEnrollmentChange> = self
            .pending_changes
            .iter()
            .filter(|c| c.status == ChangeStatus::Pending && c.effective_date <= date)
            .cloned()
            .collect();
        due.sort_by_key(|c| (c.effective_date, c.id));
        due
    }

    pub fn pending_change(&self, id: ChangeId) -> Option<&PendingEnrollmentChange> {
        self.pending_changes.iter().find(|c| c.id == id)
    }

    pub fn mark_processed(&mut self, id: ChangeId) -> Result<(), EngineError> {
        let change = self
            .pending_changes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EngineError::Storage(format!("pending change {} not found", id)))?;
        change.status = ChangeStatus::Processed;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Staff assignments
    // ------------------------------------------------------------------

    /// Assignments for an instance in insertion order (lead first by
    /// construction).
    pub fn staff_assignments_for(&self, instance_id: InstanceId) -> Vec<&StaffAssignment> {
        self.staff_assignments
            .iter()
            .filter(|a| a.instance_id == instance_id)
            .collect()
    }

    pub fn insert_staff_assignment(&mut self, assignment: StaffAssignment) {
        self.staff_assignments.push(assignment);
    }

    /// Minutes of session time already assigned to a staff member across a
    /// date window (inclusive on both ends).
    pub fn allocated_minutes(&self, staff_id: StaffId, window: (NaiveDate, NaiveDate)) -> i64 {
        self.staff_assignments
            .iter()
            .filter(|a| a.staff_id == staff_id)
            .filter_map(|a| self.instances.get(&a.instance_id))
            .filter(|i| i.date >= window.0 && i.date <= window.1)
            .map(|i| i.duration_minutes())
            .sum()
    }

    // ------------------------------------------------------------------
    // Vehicle assignments
    // ------------------------------------------------------------------

    /// Assignments for an instance in insertion order.
    pub fn vehicle_assignments_for(&self, instance_id: InstanceId) -> Vec<&VehicleAssignment> {
        self.vehicle_assignments
            .iter()
            .filter(|a| a.instance_id == instance_id)
            .collect()
    }

    /// Whether a vehicle already serves an overlapping session on `date`.
    pub fn vehicle_busy(
        &self,
        vehicle_id: VehicleId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_instance: InstanceId,
    ) -> bool {
        self.vehicle_assignments
            .iter()
            .filter(|a| a.vehicle_id == vehicle_id && a.instance_id != exclude_instance)
            .filter_map(|a| self.instances.get(&a.instance_id))
            .any(|i| i.date == date && i.start_time < end && i.end_time > start)
    }

    pub fn insert_vehicle_assignment(
        &mut self,
        vehicle_id: VehicleId,
        instance_id: InstanceId,
        driver_staff_id: Option<StaffId>,
    ) -> AssignmentId {
        self.next_assignment_id += 1;
        let id = self.next_assignment_id;
        self.vehicle_assignments.push(VehicleAssignment {
            id,
            vehicle_id,
            instance_id,
            driver_staff_id,
        });
        id
    }

    // ------------------------------------------------------------------
    // Routes (delete-then-insert only)
    // ------------------------------------------------------------------

    /// Drops every route for the given vehicle assignments and installs the
    /// replacements. Routes are fully derived; they are never patched.
    pub fn replace_routes(&mut self, assignment_ids: &[AssignmentId], new_routes: Vec<Route>) {
        self.routes
            .retain(|r| !assignment_ids.contains(&r.vehicle_assignment_id));
        self.routes.extend(new_routes);
    }

    pub fn routes_for_assignment(&self, assignment_id: AssignmentId) -> Vec<&Route> {
        self.routes
            .iter()
            .filter(|r| r.vehicle_assignment_id == assignment_id)
            .collect()
    }
}
