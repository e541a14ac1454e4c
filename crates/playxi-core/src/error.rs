// Error taxonomy for lineup operations.

use thiserror::Error;

use crate::ledger::transfer::BudgetExceeded;
use crate::lineup::validator::ValidationError;
use crate::model::MatchId;

/// Ordering violations against the previous match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("match {match_id} cannot be set up until match {predecessor_id} has started")]
    PredecessorNotLocked {
        match_id: MatchId,
        predecessor_id: MatchId,
    },

    #[error("set up a lineup for match {predecessor_id} before match {match_id}")]
    MissingPredecessorLineup {
        match_id: MatchId,
        predecessor_id: MatchId,
    },
}

/// Why a lineup operation was refused. Every variant except `Storage` is
/// detected before anything is written.
#[derive(Debug, Error)]
pub enum LineupError {
    #[error("invalid lineup: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceeded),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("match {match_id} is {}", lock_state(.completed))]
    LockedMatch { match_id: MatchId, completed: bool },

    #[error("match {match_id} has not started yet")]
    NotYetLocked { match_id: MatchId },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

fn lock_state(completed: &bool) -> &'static str {
    if *completed {
        "completed"
    } else {
        "locked"
    }
}

impl LineupError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LineupError::NotFound { entity, id }
    }

    /// Stable identifier for the wire protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            LineupError::Validation(_) => "validation",
            LineupError::BudgetExceeded(_) => "budget_exceeded",
            LineupError::Sequence(_) => "sequence",
            LineupError::LockedMatch { .. } => "locked_match",
            LineupError::NotYetLocked { .. } => "not_yet_locked",
            LineupError::NotFound { .. } => "not_found",
            LineupError::Storage(_) => "storage",
        }
    }

    /// Remaining transfer budget, when the error knows it.
    pub fn transfers_remaining(&self) -> Option<u32> {
        match self {
            LineupError::BudgetExceeded(e) => Some(e.transfers_remaining),
            _ => None,
        }
    }
}
