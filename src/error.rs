use thiserror::Error;

use crate::session::{Operation, SessionPhase};

pub type TimerResult<T> = Result<T, TimerError>;

/// Errors surfaced by the timer engine. None of them are fatal: every failed
/// operation leaves the session exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("format not found: {0}")]
    NotFound(String),

    #[error("stage index {index} out of range (format has {len} stages)")]
    OutOfRange { index: usize, len: usize },

    #[error("no stage after \"{stage}\"")]
    NoNextStage { stage: String },

    #[error("cannot {operation} while {phase}")]
    InvalidTransition {
        operation: Operation,
        phase: SessionPhase,
    },

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}

impl TimerError {
    /// Notices the UI should show and carry on from.
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. } | Self::NoNextStage { .. })
    }
}
