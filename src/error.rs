//! Error types for the allocation engine.

use thiserror::Error;

use crate::model::{InstanceId, ParticipantId, ProgramId};

/// Errors surfaced by engine entry points.
///
/// Resource shortfalls are deliberately not errors: a session proceeds
/// understaffed and the shortfall is reported in the rebalance summary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown program instance {0}")]
    UnknownInstance(InstanceId),

    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("participant {participant} has no open enrollment in program {program}")]
    EnrollmentConflict {
        participant: ParticipantId,
        program: ProgramId,
    },

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Errors from the external route-optimization provider.
///
/// These never escape the planner: any provider failure degrades to the
/// nearest-neighbor fallback instead.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("http transport failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {0}")]
    Api(String),

    #[error("provider returned no usable route")]
    EmptyResponse,
}
