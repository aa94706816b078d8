//! Persistent store boundary.
//!
//! The engine is stateless between invocations: every operation reads the
//! records it needs, plans its writes, and commits them through
//! [`MatchStore::commit`] as a single atomic [`WriteBatch`]. Each updated
//! or deleted record carries the version the planner read; a mismatch at
//! commit time fails the whole batch with
//! [`EngineError::ConcurrentModification`] and the caller retries after
//! re-reading.
//!
//! Two implementations ship with the crate: [`PgMatchStore`] for
//! PostgreSQL and [`MemoryStore`] for tests and demos.

use async_trait::async_trait;

use crate::errors::EngineResult;
use crate::models::{MatchId, MatchRecord, Team, TournamentConfig, TournamentId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgMatchStore, StoreConfig};

/// A match update guarded by the version the planner observed
#[derive(Debug, Clone)]
pub struct VersionedUpdate {
    /// The full new state of the record, version already bumped
    pub record: MatchRecord,
    /// Version the record held when it was read
    pub expected_version: i64,
}

impl VersionedUpdate {
    /// Guard an updated record with the version it held before `touch`
    #[must_use]
    pub fn new(record: MatchRecord) -> Self {
        let expected_version = record.version - 1;
        Self {
            record,
            expected_version,
        }
    }
}

/// A set of writes applied atomically: all or nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub inserts: Vec<MatchRecord>,
    pub updates: Vec<VersionedUpdate>,
    /// Record removals, version-guarded like updates
    pub deletes: Vec<(MatchId, i64)>,
    pub config_update: Option<(TournamentId, TournamentConfig)>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch contains no writes at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.config_update.is_none()
    }
}

/// Store operations the engine depends on.
///
/// Concrete storage is out of scope for the engine; anything that can hold
/// the match, team, and configuration collections and apply a
/// [`WriteBatch`] atomically qualifies.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Fetch a tournament's configuration record
    async fn tournament_config(&self, id: TournamentId) -> EngineResult<TournamentConfig>;

    /// Fetch a tournament's registered teams
    async fn teams(&self, id: TournamentId) -> EngineResult<Vec<Team>>;

    /// Fetch a single match
    async fn get_match(&self, id: MatchId) -> EngineResult<MatchRecord>;

    /// Snapshot-read every match of a tournament
    async fn list_matches(&self, tournament_id: TournamentId) -> EngineResult<Vec<MatchRecord>>;

    /// Apply a batch of writes atomically. Any version mismatch fails the
    /// whole batch with `ConcurrentModification`.
    async fn commit(&self, batch: WriteBatch) -> EngineResult<()>;
}
