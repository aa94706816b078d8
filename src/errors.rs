//! Engine error types.

use thiserror::Error;

use crate::models::{MatchId, MatchState, TournamentId};

/// Errors reported by engine operations.
///
/// `ConcurrentModification` is the only variant callers are expected to
/// retry (re-read, reapply). `InconsistentBracket` and `IrreversibleState`
/// are data-integrity alarms and are surfaced to an operator rather than
/// auto-recovered.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Attempted state transition not in the lifecycle table
    #[error("invalid transition for match {match_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        match_id: MatchId,
        from: MatchState,
        to: MatchState,
    },

    /// A match left `PendingScheduling` with an unresolved team slot,
    /// or a record references a team unknown to the tournament
    #[error("match {0} references an unresolved or unknown team")]
    MissingTeams(MatchId),

    /// Optimistic concurrency check failed; caller should re-read and retry
    #[error("concurrent modification of match {match_id}: expected version {expected}, stored {stored}")]
    ConcurrentModification {
        match_id: MatchId,
        expected: i64,
        stored: i64,
    },

    /// Successor slot conflict or dangling slot pointer
    #[error("inconsistent bracket: {0}")]
    InconsistentBracket(String),

    /// No rematch-free pairing exists for the remaining field
    #[error("pairing infeasible: every remaining pairing would be a rematch")]
    PairingInfeasible,

    /// A revert would disturb an already-completed downstream match
    #[error("irreversible state: {0}")]
    IrreversibleState(String),

    /// Match not found
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    /// Tournament not found
    #[error("tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    /// Reported result rejected (bad winner, negative or short score)
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// Seed list rejected by a bracket builder
    #[error("invalid seeds: {0}")]
    InvalidSeeds(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
