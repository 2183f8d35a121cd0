//! Applies due enrollment changes to the permanent ledger.
//!
//! The whole due batch commits or rolls back as one transaction: partial
//! application would leave sessions deriving attendance from a half-applied
//! enrollment state. Reprocessing is prevented by the status flag alone.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{InstanceId, PendingAction};
use crate::store::MemoryStore;

#[derive(Debug, Clone)]
pub struct PendingOutcome {
    pub changes_processed: u32,
    /// Instances whose resources must be recomputed because a processed
    /// change touches their program on or after its effective date.
    pub affected_instances: Vec<InstanceId>,
}

/// Applies every pending change with `effective_date <= simulated_date`, in
/// effective-date order, atomically.
pub fn process_pending_changes(
    store: &mut MemoryStore,
    simulated_date: NaiveDate,
) -> Result<PendingOutcome, EngineError> {
    store.transaction(|store| {
        let due = store.due_pending_changes(simulated_date);
        let mut affected: BTreeSet<InstanceId> = BTreeSet::new();
        let mut processed = 0;

        for change in due {
            match change.action {
                PendingAction::Add => {
                    if store
                        .open_enrollment(change.participant_id, change.program_id)
                        .is_some()
                    {
                        // Opening a second interval would overlap the first.
                        warn!(
                            participant_id = change.participant_id,
                            program_id = change.program_id,
                            "duplicate add for an open enrollment, skipping"
                        );
                    } else {
                        store.insert_enrollment(
                            change.participant_id,
                            change.program_id,
                            change.effective_date,
                        );
                    }
                }
                PendingAction::Remove => {
                    let open_id = store
                        .open_enrollment(change.participant_id, change.program_id)
                        .map(|e| e.id)
                        .ok_or(EngineError::EnrollmentConflict {
                            participant: change.participant_id,
                            program: change.program_id,
                        })?;
                    let end_date = change.effective_date.pred_opt().ok_or_else(|| {
                        EngineError::Storage(format!(
                            "effective date {} has no predecessor",
                            change.effective_date
                        ))
                    })?;
                    store.close_enrollment(open_id, end_date)?;
                }
            }

            store.mark_processed(change.id)?;
            processed += 1;
            debug!(
                change_id = change.id,
                participant_id = change.participant_id,
                program_id = change.program_id,
                effective_date = %change.effective_date,
                action = ?change.action,
                "applied enrollment change"
            );

            for instance in
                store.instances_for_program_from(change.program_id, change.effective_date)
            {
                affected.insert(instance.id);
            }
        }

        Ok(PendingOutcome {
            changes_processed: processed,
            affected_instances: affected.into_iter().collect(),
        })
    })
}
