//! Match lifecycle manager.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;

use super::machine::{ensure_transition, validate_result};
use crate::bracket::engine::plan_advance;
use crate::errors::{EngineError, EngineResult};
use crate::models::{GameScore, MatchId, MatchRecord, MatchState, Provenance, Stage, TeamId};
use crate::store::{MatchStore, VersionedUpdate, WriteBatch};

/// Drives matches through their lifecycle. The only writer of match
/// outcome fields.
#[derive(Clone)]
pub struct MatchLifecycle {
    store: Arc<dyn MatchStore>,
}

impl MatchLifecycle {
    /// Create a new lifecycle manager
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Load a match and verify the caller's version against the stored one
    async fn load_guarded(
        &self,
        match_id: MatchId,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        let record = self.store.get_match(match_id).await?;
        if record.version != expected_version {
            return Err(EngineError::ConcurrentModification {
                match_id,
                expected: expected_version,
                stored: record.version,
            });
        }
        Ok(record)
    }

    /// Commit a single updated record
    async fn commit_single(&self, record: MatchRecord) -> EngineResult<MatchRecord> {
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(record.clone()));
        self.store.commit(batch).await?;
        Ok(record)
    }

    /// `pending_scheduling -> scheduled`. Requires both slots resolved.
    pub async fn schedule(
        &self,
        match_id: MatchId,
        at: DateTime<Utc>,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        let mut record = self.load_guarded(match_id, expected_version).await?;
        record.scheduled_at = Some(at);
        ensure_transition(&record, MatchState::Scheduled)?;
        record.state = MatchState::Scheduled;
        record.touch();
        self.commit_single(record).await
    }

    /// `scheduled -> ready_up`. Time-gated or operator-triggered; the
    /// engine does not check the clock.
    pub async fn begin_ready_up(
        &self,
        match_id: MatchId,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        let mut record = self.load_guarded(match_id, expected_version).await?;
        ensure_transition(&record, MatchState::ReadyUp)?;
        record.state = MatchState::ReadyUp;
        record.touch();
        self.commit_single(record).await
    }

    /// Flag one team ready. When both flags are up the match moves to
    /// `map_banning` in the same write.
    pub async fn set_ready(
        &self,
        match_id: MatchId,
        team_id: TeamId,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        let mut record = self.load_guarded(match_id, expected_version).await?;
        if record.state != MatchState::ReadyUp {
            return Err(EngineError::InvalidTransition {
                match_id,
                from: record.state,
                to: MatchState::ReadyUp,
            });
        }

        if record.team1_id == Some(team_id) {
            record.team1_ready = true;
        } else if record.team2_id == Some(team_id) {
            record.team2_ready = true;
        } else {
            return Err(EngineError::InvalidResult(format!(
                "team {team_id} is not a participant of match {match_id}"
            )));
        }

        if record.team1_ready && record.team2_ready {
            ensure_transition(&record, MatchState::MapBanning)?;
            record.state = MatchState::MapBanning;
        }
        record.touch();
        self.commit_single(record).await
    }

    /// Close the map veto. `map_banning -> playing`.
    pub async fn lock_maps(
        &self,
        match_id: MatchId,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        let mut record = self.load_guarded(match_id, expected_version).await?;
        record.maps_locked = true;
        ensure_transition(&record, MatchState::Playing)?;
        record.state = MatchState::Playing;
        record.touch();
        self.commit_single(record).await
    }

    /// Record a final result for a live match.
    ///
    /// For bracket and playoff stages the winner (and loser, in double
    /// elimination) is routed into the successor slots in the same
    /// transaction as the completion itself.
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` - the match is not `playing`
    /// * `InvalidResult` - winner/score validation failed
    /// * `ConcurrentModification` - `expected_version` is stale
    pub async fn complete_match(
        &self,
        match_id: MatchId,
        team1_score: i64,
        team2_score: i64,
        winner_id: TeamId,
        provenance: Provenance,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        self.complete_inner(
            match_id,
            team1_score,
            team2_score,
            Vec::new(),
            winner_id,
            provenance,
            expected_version,
            false,
        )
        .await
    }

    /// Record a series result with per-map round scores. The match score
    /// is the count of maps each side took.
    pub async fn complete_series(
        &self,
        match_id: MatchId,
        games: Vec<GameScore>,
        winner_id: TeamId,
        provenance: Provenance,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        if games.is_empty() {
            return Err(EngineError::InvalidResult(
                "series result carries no game scores".to_string(),
            ));
        }
        let team1_maps = games
            .iter()
            .filter(|g| g.team1_rounds > g.team2_rounds)
            .count() as i64;
        let team2_maps = games.len() as i64 - team1_maps;
        self.complete_inner(
            match_id,
            team1_maps,
            team2_maps,
            games,
            winner_id,
            provenance,
            expected_version,
            false,
        )
        .await
    }

    /// Administrative override: complete a match from any non-terminal
    /// state (demo/auto-complete flows). Bypasses the score-consistency
    /// check but not the structural invariants.
    pub async fn force_complete(
        &self,
        match_id: MatchId,
        team1_score: i64,
        team2_score: i64,
        winner_id: TeamId,
        provenance: Provenance,
        expected_version: i64,
    ) -> EngineResult<MatchRecord> {
        self.complete_inner(
            match_id,
            team1_score,
            team2_score,
            Vec::new(),
            winner_id,
            provenance,
            expected_version,
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn complete_inner(
        &self,
        match_id: MatchId,
        team1_score: i64,
        team2_score: i64,
        games: Vec<GameScore>,
        winner_id: TeamId,
        provenance: Provenance,
        expected_version: i64,
        admin_override: bool,
    ) -> EngineResult<MatchRecord> {
        let mut record = self.load_guarded(match_id, expected_version).await?;

        if admin_override {
            if record.state == MatchState::Completed {
                return Err(EngineError::InvalidTransition {
                    match_id,
                    from: MatchState::Completed,
                    to: MatchState::Completed,
                });
            }
            if !record.teams_resolved() {
                return Err(EngineError::MissingTeams(match_id));
            }
        } else {
            ensure_transition(&record, MatchState::Completed)?;
        }

        let config = self.store.tournament_config(record.tournament_id).await?;
        if games.is_empty() {
            validate_result(
                &record,
                team1_score,
                team2_score,
                winner_id,
                &config.point_scheme,
                admin_override,
            )?;
        } else {
            // Series scores are map counts; the per-map win condition does
            // not apply, but the winner must still take more maps.
            validate_result(
                &record,
                team1_score,
                team2_score,
                winner_id,
                &config.point_scheme,
                true,
            )?;
            let winner_maps = if record.team1_id == Some(winner_id) {
                team1_score
            } else {
                team2_score
            };
            if !admin_override && winner_maps * 2 <= team1_score + team2_score {
                return Err(EngineError::InvalidResult(format!(
                    "series winner took {winner_maps} of {} maps",
                    team1_score + team2_score
                )));
            }
        }

        record.completed_from = Some(record.state);
        record.state = MatchState::Completed;
        record.team1_score = Some(team1_score);
        record.team2_score = Some(team2_score);
        record.games = games;
        record.winner_id = Some(winner_id);
        record.provenance = Some(provenance);
        record.touch();

        if let Provenance::AutoDetected { confidence } = provenance
            && confidence < 0.5
        {
            warn!("match {match_id}: accepting low-confidence auto-detected result");
        }
        info!(
            "match {match_id} completed {team1_score}-{team2_score}, winner {winner_id} ({provenance})"
        );

        let mut batch = WriteBatch::new();
        if record.stage != Stage::SwissRound {
            let plan = plan_advance(self.store.as_ref(), &record, &config).await?;
            batch.updates.extend(plan.updates);
            batch.inserts.extend(plan.inserts);
        }
        batch.updates.push(VersionedUpdate::new(record.clone()));
        self.store.commit(batch).await?;

        Ok(record)
    }
}
