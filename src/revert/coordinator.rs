//! Revert coordinator.

use log::{error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{EngineError, EngineResult};
use crate::models::{
    BracketSide, MatchId, MatchRecord, MatchState, Stage, TeamId, TournamentId,
};
use crate::store::{MatchStore, VersionedUpdate, WriteBatch};

/// Unwinds completed results. The only writer allowed to move a match
/// out of `completed`.
#[derive(Clone)]
pub struct RevertCoordinator {
    store: Arc<dyn MatchStore>,
}

impl RevertCoordinator {
    /// Create a new revert coordinator
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Revert one completed match.
    ///
    /// The match returns to the state it held immediately before
    /// completion with its result fields cleared. Successor slots the
    /// result filled are emptied, and affected successors drop back to
    /// `pending_scheduling`.
    ///
    /// With `cascade` false, a completed successor blocks the revert
    /// (`IrreversibleState`). With `cascade` true, completed successors
    /// are reverted first, deepest matches unwound before the ones that
    /// fed them.
    ///
    /// Reverting a bye or a match that is not completed is a no-op.
    /// Returns every record the revert rewrote.
    pub async fn revert_match(
        &self,
        match_id: MatchId,
        cascade: bool,
    ) -> EngineResult<Vec<MatchRecord>> {
        let mut planner = RevertPlanner::new(self.store.as_ref());
        planner.plan_revert(match_id, cascade).await?;
        let written = planner.commit().await?;
        if !written.is_empty() {
            info!("match {match_id}: reverted ({} records rewritten)", written.len());
        }
        Ok(written)
    }

    /// Revert an entire round of a stage.
    ///
    /// For the Swiss stage only the most recently paired round can be
    /// reverted: its records (byes included) are deleted outright and the
    /// tournament's round and matchday counters step back, leaving the
    /// tournament exactly as it was before the round was paired.
    ///
    /// For bracket and playoff stages every completed match of the round
    /// is reverted with cascading enabled; the bracket structure itself
    /// stays in place.
    pub async fn revert_round(
        &self,
        tournament_id: TournamentId,
        stage: Stage,
        round: u32,
    ) -> EngineResult<()> {
        let matches = self.store.list_matches(tournament_id).await?;
        let targets: Vec<MatchRecord> = matches
            .into_iter()
            .filter(|m| m.stage == stage && m.round == round)
            .collect();
        if targets.is_empty() {
            warn!("tournament {tournament_id}: no {stage:?} round {round} matches to revert");
            return Ok(());
        }

        match stage {
            Stage::SwissRound => {
                let config = self.store.tournament_config(tournament_id).await?;
                if round != config.current_round {
                    return Err(EngineError::IrreversibleState(format!(
                        "swiss round {round} is not the latest paired round ({})",
                        config.current_round
                    )));
                }

                let mut updated = config;
                updated.current_round -= 1;
                updated.current_matchday = updated.current_matchday.saturating_sub(1);

                let mut batch = WriteBatch::new();
                batch.deletes = targets.iter().map(|m| (m.id, m.version)).collect();
                batch.config_update = Some((tournament_id, updated));
                self.store.commit(batch).await?;
                info!(
                    "tournament {tournament_id}: swiss round {round} unpaired, {} matches deleted",
                    targets.len()
                );
            }
            Stage::Playoff | Stage::Bracket => {
                let mut planner = RevertPlanner::new(self.store.as_ref());
                for m in targets.iter().filter(|m| m.state == MatchState::Completed) {
                    planner.plan_revert(m.id, true).await?;
                }
                let written = planner.commit().await?;
                info!(
                    "tournament {tournament_id}: {stage:?} round {round} reverted, {} records rewritten",
                    written.len()
                );
            }
        }
        Ok(())
    }

    /// Pull one team back out of the successor slots a match routed it
    /// into, without touching the match's own result.
    ///
    /// Used when a result stands but the advancement was routed in error.
    /// A completed successor blocks the removal. A slot that does not
    /// hold the team is left alone, so the operation is idempotent.
    pub async fn revert_team_advancement(
        &self,
        match_id: MatchId,
        team_id: TeamId,
    ) -> EngineResult<Vec<MatchRecord>> {
        let record = self.store.get_match(match_id).await?;

        let mut batch = WriteBatch::new();
        let mut written = Vec::new();
        for slot_ref in [record.winner_to, record.loser_to].into_iter().flatten() {
            let mut successor = load_successor(self.store.as_ref(), match_id, slot_ref.match_id).await?;
            if successor.slot(slot_ref.slot) != Some(team_id) {
                continue;
            }
            if successor.state == MatchState::Completed {
                error!(
                    "match {match_id}: cannot pull {team_id} out of completed match {}",
                    successor.id
                );
                return Err(EngineError::IrreversibleState(format!(
                    "successor match {} already completed with {team_id} in it",
                    successor.id
                )));
            }
            successor.set_slot(slot_ref.slot, None);
            reset_to_pending(&mut successor);
            successor.touch();
            written.push(successor.clone());
            batch.updates.push(VersionedUpdate::new(successor));
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
            info!("match {match_id}: advancement of {team_id} withdrawn");
        }
        Ok(written)
    }
}

/// Accumulates the rewrites of one revert so they commit as a unit.
/// Records are mutated in place across recursion steps and version-bumped
/// exactly once at commit.
struct RevertPlanner<'a> {
    store: &'a dyn MatchStore,
    pending: HashMap<MatchId, MatchRecord>,
    deletes: Vec<(MatchId, i64)>,
}

impl<'a> RevertPlanner<'a> {
    fn new(store: &'a dyn MatchStore) -> Self {
        Self {
            store,
            pending: HashMap::new(),
            deletes: Vec::new(),
        }
    }

    async fn load(&self, match_id: MatchId) -> EngineResult<MatchRecord> {
        if let Some(record) = self.pending.get(&match_id) {
            return Ok(record.clone());
        }
        self.store.get_match(match_id).await
    }

    fn stash(&mut self, record: MatchRecord) {
        self.pending.insert(record.id, record);
    }

    /// Recursive, so the future is boxed. Depth is bounded by the depth
    /// of the bracket.
    fn plan_revert(
        &mut self,
        match_id: MatchId,
        cascade: bool,
    ) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut record = self.load(match_id).await?;

            if record.is_bye {
                warn!("match {match_id}: byes are not revertable, skipping");
                return Ok(());
            }
            if record.state != MatchState::Completed {
                warn!(
                    "match {match_id} is {}, nothing to revert",
                    record.state
                );
                return Ok(());
            }

            let mut routes = Vec::new();
            if let Some(slot_ref) = record.winner_to
                && let Some(winner) = record.winner_id
            {
                routes.push((slot_ref, winner));
            }
            if let Some(slot_ref) = record.loser_to
                && let Some(loser) = record.loser_id()
            {
                routes.push((slot_ref, loser));
            }

            for (slot_ref, team) in routes {
                let mut successor =
                    load_planner_successor(self, match_id, slot_ref.match_id).await?;
                if successor.slot(slot_ref.slot) != Some(team) {
                    continue; // never advanced, or already withdrawn
                }
                if successor.state == MatchState::Completed {
                    if !cascade {
                        error!(
                            "match {match_id}: successor {} already completed, revert blocked",
                            successor.id
                        );
                        return Err(EngineError::IrreversibleState(format!(
                            "match {match_id} feeds completed match {}",
                            successor.id
                        )));
                    }
                    self.plan_revert(successor.id, cascade).await?;
                    successor = self.load(slot_ref.match_id).await?;
                }
                successor.set_slot(slot_ref.slot, None);
                reset_to_pending(&mut successor);
                self.stash(successor);
            }

            self.plan_reset_removal(&record, cascade).await?;

            record.state = record.completed_from.take().unwrap_or(MatchState::Playing);
            record.team1_score = None;
            record.team2_score = None;
            record.games.clear();
            record.winner_id = None;
            record.provenance = None;
            self.stash(record);
            Ok(())
        })
    }

    /// A reverted first grand final takes its reset match with it.
    async fn plan_reset_removal(
        &mut self,
        record: &MatchRecord,
        cascade: bool,
    ) -> EngineResult<()> {
        if record.bracket_side != Some(BracketSide::GrandFinal) || record.predecessors.len() != 2 {
            return Ok(());
        }
        let siblings = self.store.list_matches(record.tournament_id).await?;
        let Some(reset) = siblings
            .iter()
            .find(|m| m.predecessors.as_slice() == [record.id])
        else {
            return Ok(());
        };
        if self.deletes.iter().any(|(id, _)| *id == reset.id) {
            return Ok(());
        }

        if reset.state == MatchState::Completed {
            if !cascade {
                return Err(EngineError::IrreversibleState(format!(
                    "bracket reset match {} already completed",
                    reset.id
                )));
            }
            self.plan_revert(reset.id, cascade).await?;
        }

        let version = self
            .pending
            .remove(&reset.id)
            .map_or(reset.version, |r| r.version);
        self.deletes.push((reset.id, version));
        info!("match {}: deleting bracket reset match {}", record.id, reset.id);
        Ok(())
    }

    async fn commit(self) -> EngineResult<Vec<MatchRecord>> {
        let mut batch = WriteBatch::new();
        let mut written = Vec::with_capacity(self.pending.len());
        for (_, mut record) in self.pending {
            record.touch();
            written.push(record.clone());
            batch.updates.push(VersionedUpdate::new(record));
        }
        batch.deletes = self.deletes;
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(written)
    }
}

async fn load_planner_successor(
    planner: &RevertPlanner<'_>,
    from: MatchId,
    successor_id: MatchId,
) -> EngineResult<MatchRecord> {
    match planner.load(successor_id).await {
        Err(EngineError::MatchNotFound(id)) => Err(dangling(from, id)),
        other => other,
    }
}

async fn load_successor(
    store: &dyn MatchStore,
    from: MatchId,
    successor_id: MatchId,
) -> EngineResult<MatchRecord> {
    match store.get_match(successor_id).await {
        Err(EngineError::MatchNotFound(id)) => Err(dangling(from, id)),
        other => other,
    }
}

fn dangling(from: MatchId, missing: MatchId) -> EngineError {
    error!("match {from}: successor slot points to nonexistent match {missing}");
    EngineError::InconsistentBracket(format!(
        "successor slot of match {from} points to nonexistent match {missing}"
    ))
}

/// A successor whose slot was emptied cannot stay scheduled: it no longer
/// knows who plays.
fn reset_to_pending(record: &mut MatchRecord) {
    record.state = MatchState::PendingScheduling;
    record.scheduled_at = None;
    record.team1_ready = false;
    record.team2_ready = false;
    record.maps_locked = false;
}
