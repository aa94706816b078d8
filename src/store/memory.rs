//! In-memory store for tests and demos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{MatchStore, WriteBatch};
use crate::errors::{EngineError, EngineResult};
use crate::models::{MatchId, MatchRecord, Team, TournamentConfig, TournamentId};

#[derive(Debug, Default)]
struct Inner {
    tournaments: HashMap<TournamentId, TournamentConfig>,
    teams: HashMap<TournamentId, Vec<Team>>,
    matches: HashMap<MatchId, MatchRecord>,
}

/// A `MatchStore` backed by process memory.
///
/// Commits are atomic: every version guard in the batch is validated under
/// one lock before any write is applied.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a tournament with its configuration and team list
    pub fn add_tournament(&self, id: TournamentId, config: TournamentConfig, teams: Vec<Team>) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.tournaments.insert(id, config);
        inner.teams.insert(id, teams);
    }

    /// Number of match records currently held (all tournaments)
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").matches.len()
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn tournament_config(&self, id: TournamentId) -> EngineResult<TournamentConfig> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .tournaments
            .get(&id)
            .cloned()
            .ok_or(EngineError::TournamentNotFound(id))
    }

    async fn teams(&self, id: TournamentId) -> EngineResult<Vec<Team>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .teams
            .get(&id)
            .cloned()
            .ok_or(EngineError::TournamentNotFound(id))
    }

    async fn get_match(&self, id: MatchId) -> EngineResult<MatchRecord> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .matches
            .get(&id)
            .cloned()
            .ok_or(EngineError::MatchNotFound(id))
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> EngineResult<Vec<MatchRecord>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> EngineResult<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        // Validate every guard before touching anything
        for update in &batch.updates {
            let stored = inner
                .matches
                .get(&update.record.id)
                .ok_or(EngineError::MatchNotFound(update.record.id))?;
            if stored.version != update.expected_version {
                return Err(EngineError::ConcurrentModification {
                    match_id: update.record.id,
                    expected: update.expected_version,
                    stored: stored.version,
                });
            }
        }
        for (id, expected) in &batch.deletes {
            let stored = inner.matches.get(id).ok_or(EngineError::MatchNotFound(*id))?;
            if stored.version != *expected {
                return Err(EngineError::ConcurrentModification {
                    match_id: *id,
                    expected: *expected,
                    stored: stored.version,
                });
            }
        }
        if let Some((tid, _)) = &batch.config_update
            && !inner.tournaments.contains_key(tid)
        {
            return Err(EngineError::TournamentNotFound(*tid));
        }

        for record in batch.inserts {
            inner.matches.insert(record.id, record);
        }
        for update in batch.updates {
            inner.matches.insert(update.record.id, update.record);
        }
        for (id, _) in batch.deletes {
            inner.matches.remove(&id);
        }
        if let Some((tid, config)) = batch.config_update {
            inner.tournaments.insert(tid, config);
        }

        Ok(())
    }
}
