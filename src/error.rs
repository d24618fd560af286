//! Error types for match operations.
//!
//! Every rejection leaves the match untouched. `Store` is the only variant a
//! caller should retry; the rest are precondition failures.

use crate::types::{MatchId, Phase, PlayerId, VoterId};

/// Result type for match operations
pub type MatchResult<T> = Result<T, MatchError>;

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Match {0} not found")]
    NotFound(MatchId),

    #[error("Operation not allowed in phase {phase:?}")]
    InvalidPhase { phase: Phase },

    #[error("Votes are not being accepted in phase {phase:?}")]
    NotAcceptingVotes { phase: Phase },

    #[error("Voter {voter_id} already voted in round {round}")]
    DuplicateVote { voter_id: VoterId, round: u32 },

    #[error("Vote weight {weight} is outside [{min}, {max}]")]
    InvalidWeight { weight: f64, min: f64, max: f64 },

    #[error("{0} is not a participant of this match")]
    UnauthorizedParticipant(PlayerId),

    #[error("Match {0} has no open seat")]
    MatchFull(MatchId),

    #[error("Category pool has {available} labels, board needs {required}")]
    InsufficientPool { available: usize, required: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl MatchError {
    /// Stable code sent to clients in error messages
    pub fn code(&self) -> &'static str {
        match self {
            MatchError::NotFound(_) => "NOT_FOUND",
            MatchError::InvalidPhase { .. } => "INVALID_PHASE",
            MatchError::NotAcceptingVotes { .. } => "NOT_ACCEPTING_VOTES",
            MatchError::DuplicateVote { .. } => "DUPLICATE_VOTE",
            MatchError::InvalidWeight { .. } => "INVALID_WEIGHT",
            MatchError::UnauthorizedParticipant(_) => "UNAUTHORIZED_PARTICIPANT",
            MatchError::MatchFull(_) => "MATCH_FULL",
            MatchError::InsufficientPool { .. } => "INSUFFICIENT_POOL",
            MatchError::InvalidRequest(_) => "INVALID_REQUEST",
            MatchError::Config(_) => "INVALID_CONFIG",
            MatchError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::Store(_))
    }
}

/// Errors raised by a [`crate::store::MatchStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Record schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
