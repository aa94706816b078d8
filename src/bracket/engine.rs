//! Bracket construction and advancement.

use log::{error, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::seeding::{bracket_size, seeding_order};
use crate::errors::{EngineError, EngineResult};
use crate::models::{
    BracketSide, MatchId, MatchRecord, MatchState, PointScheme, Slot, SlotRef, Stage, TeamId,
    TournamentConfig, TournamentFormat, TournamentId,
};
use crate::store::{MatchStore, VersionedUpdate, WriteBatch};

/// Builds elimination brackets and routes completed results into
/// successor slots.
#[derive(Clone)]
pub struct BracketEngine {
    store: Arc<dyn MatchStore>,
}

impl BracketEngine {
    /// Create a new bracket engine
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Build the bracket stage for a tournament from an ordered seed
    /// list, dispatching on the configured format.
    ///
    /// # Errors
    ///
    /// * `InvalidSeeds` - empty/duplicate seeds, unknown teams, or a
    ///   Swiss-format tournament (those seed playoffs from standings)
    /// * `InconsistentBracket` - the stage already has matches
    pub async fn build_bracket(
        &self,
        tournament_id: TournamentId,
        seeds: &[TeamId],
    ) -> EngineResult<Vec<MatchRecord>> {
        let config = self.store.tournament_config(tournament_id).await?;
        self.validate_seeds(tournament_id, seeds).await?;
        self.ensure_stage_empty(tournament_id, Stage::Bracket).await?;

        let records = match config.format {
            TournamentFormat::SingleElimination => {
                build_single_tree(tournament_id, Stage::Bracket, seeds, &config.point_scheme, None)?
            }
            TournamentFormat::DoubleElimination { .. } => {
                build_double_tree(tournament_id, Stage::Bracket, seeds, &config.point_scheme)?
            }
            TournamentFormat::SwissSystem => {
                return Err(EngineError::InvalidSeeds(
                    "swiss tournaments seed playoffs from standings; use build_playoffs"
                        .to_string(),
                ));
            }
        };

        self.commit_built(tournament_id, records).await
    }

    /// Build the playoff stage of a Swiss tournament: the top
    /// `teams_advance_to_playoffs` standings entries seed a
    /// single-elimination bracket.
    pub async fn build_playoffs(&self, tournament_id: TournamentId) -> EngineResult<Vec<MatchRecord>> {
        let config = self.store.tournament_config(tournament_id).await?;
        let cut = config.teams_advance_to_playoffs;
        if cut < 2 {
            return Err(EngineError::InvalidSeeds(format!(
                "playoff cut of {cut} teams cannot form a bracket"
            )));
        }
        self.ensure_stage_empty(tournament_id, Stage::Playoff).await?;

        let standings = crate::standings::StandingsCalculator::new(self.store.clone())
            .for_tournament(tournament_id)
            .await?;
        if standings.len() < cut {
            return Err(EngineError::InvalidSeeds(format!(
                "{} teams in standings, {cut} required for playoffs",
                standings.len()
            )));
        }
        let seeds: Vec<TeamId> = standings.iter().take(cut).map(|e| e.team_id).collect();

        let records =
            build_single_tree(tournament_id, Stage::Playoff, &seeds, &config.point_scheme, None)?;
        self.commit_built(tournament_id, records).await
    }

    /// Route a completed match's winner (and loser, in double
    /// elimination) into its successor slots.
    ///
    /// Idempotent: a slot already holding the advancing team is a no-op.
    /// Returns the records written or created.
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` - the match has no recorded result yet
    /// * `InconsistentBracket` - a slot holds a different team, or a slot
    ///   pointer dangles
    pub async fn advance(&self, match_id: MatchId) -> EngineResult<Vec<MatchRecord>> {
        let record = self.store.get_match(match_id).await?;
        if record.state != MatchState::Completed {
            return Err(EngineError::InvalidTransition {
                match_id,
                from: record.state,
                to: MatchState::Completed,
            });
        }
        let config = self.store.tournament_config(record.tournament_id).await?;
        let plan = plan_advance(self.store.as_ref(), &record, &config).await?;

        let written: Vec<MatchRecord> = plan
            .updates
            .iter()
            .map(|u| u.record.clone())
            .chain(plan.inserts.iter().cloned())
            .collect();

        if !written.is_empty() {
            let mut batch = WriteBatch::new();
            batch.updates = plan.updates;
            batch.inserts = plan.inserts;
            self.store.commit(batch).await?;
        }
        Ok(written)
    }

    async fn validate_seeds(
        &self,
        tournament_id: TournamentId,
        seeds: &[TeamId],
    ) -> EngineResult<()> {
        if seeds.len() < 2 {
            return Err(EngineError::InvalidSeeds(format!(
                "{} seeds cannot form a bracket",
                seeds.len()
            )));
        }
        let unique: HashSet<_> = seeds.iter().collect();
        if unique.len() != seeds.len() {
            return Err(EngineError::InvalidSeeds("duplicate seed".to_string()));
        }
        let known: HashSet<TeamId> = self
            .store
            .teams(tournament_id)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if let Some(stranger) = seeds.iter().find(|s| !known.contains(s)) {
            return Err(EngineError::InvalidSeeds(format!(
                "seed {stranger} is not registered in this tournament"
            )));
        }
        Ok(())
    }

    async fn ensure_stage_empty(
        &self,
        tournament_id: TournamentId,
        stage: Stage,
    ) -> EngineResult<()> {
        let existing = self.store.list_matches(tournament_id).await?;
        if existing.iter().any(|m| m.stage == stage) {
            return Err(EngineError::InconsistentBracket(format!(
                "{stage:?} stage of tournament {tournament_id} already has matches"
            )));
        }
        Ok(())
    }

    async fn commit_built(
        &self,
        tournament_id: TournamentId,
        records: Vec<MatchRecord>,
    ) -> EngineResult<Vec<MatchRecord>> {
        let mut batch = WriteBatch::new();
        batch.inserts = records.clone();
        self.store.commit(batch).await?;
        info!(
            "tournament {tournament_id}: bracket built with {} matches",
            records.len()
        );
        Ok(records)
    }
}

/// Successor writes implied by one completed match.
#[derive(Debug, Default)]
pub struct AdvancePlan {
    pub updates: Vec<VersionedUpdate>,
    pub inserts: Vec<MatchRecord>,
}

/// Compute the successor-slot writes for a completed match without
/// committing them, so a completion and its advancement can share one
/// transaction.
pub async fn plan_advance(
    store: &dyn MatchStore,
    completed: &MatchRecord,
    config: &TournamentConfig,
) -> EngineResult<AdvancePlan> {
    let mut plan = AdvancePlan::default();
    let Some(winner) = completed.winner_id else {
        return Err(EngineError::InconsistentBracket(format!(
            "match {} has no winner to advance",
            completed.id
        )));
    };

    let mut routes: Vec<(SlotRef, TeamId)> = Vec::new();
    if let Some(slot_ref) = completed.winner_to {
        routes.push((slot_ref, winner));
    }
    if let Some(slot_ref) = completed.loser_to
        && let Some(loser) = completed.loser_id()
    {
        routes.push((slot_ref, loser));
    }

    // Both routes of a short double-elimination bracket can target the
    // same match, so successors are loaded once and written once.
    let mut successors: HashMap<MatchId, MatchRecord> = HashMap::new();
    let mut filled: HashSet<MatchId> = HashSet::new();
    for (slot_ref, team) in routes {
        if !successors.contains_key(&slot_ref.match_id) {
            let loaded = match store.get_match(slot_ref.match_id).await {
                Err(EngineError::MatchNotFound(id)) => {
                    error!(
                        "match {}: successor slot points to nonexistent match {id}",
                        completed.id
                    );
                    return Err(EngineError::InconsistentBracket(format!(
                        "successor slot of match {} points to nonexistent match {id}",
                        completed.id
                    )));
                }
                other => other?,
            };
            successors.insert(slot_ref.match_id, loaded);
        }
        let Some(successor) = successors.get_mut(&slot_ref.match_id) else {
            continue;
        };

        match successor.slot(slot_ref.slot) {
            Some(existing) if existing == team => {} // already routed
            Some(existing) => {
                error!(
                    "match {}: successor slot already filled by {existing}, cannot place {team}",
                    successor.id
                );
                return Err(EngineError::InconsistentBracket(format!(
                    "slot {:?} of match {} already filled by a different team",
                    slot_ref.slot, successor.id
                )));
            }
            None => {
                successor.set_slot(slot_ref.slot, Some(team));
                filled.insert(successor.id);
            }
        }
    }
    for (_, mut successor) in successors {
        if filled.contains(&successor.id) {
            successor.touch();
            plan.updates.push(VersionedUpdate::new(successor));
        }
    }

    if let Some(reset) = plan_bracket_reset(store, completed, config, winner).await? {
        plan.inserts.push(reset);
    }

    Ok(plan)
}

/// The first grand final feeds from two matches; the reset from one. A
/// loss by the winners-bracket champion (slot 1) in the first grand final
/// creates the decisive reset match, once.
async fn plan_bracket_reset(
    store: &dyn MatchStore,
    completed: &MatchRecord,
    config: &TournamentConfig,
    winner: TeamId,
) -> EngineResult<Option<MatchRecord>> {
    if completed.bracket_side != Some(BracketSide::GrandFinal) {
        return Ok(None);
    }
    let TournamentFormat::DoubleElimination { bracket_reset: true } = config.format else {
        return Ok(None);
    };
    let is_first_final = completed.predecessors.len() == 2;
    let losers_champion_won = completed.team2_id == Some(winner);
    if !is_first_final || !losers_champion_won {
        return Ok(None);
    }

    let siblings = store.list_matches(completed.tournament_id).await?;
    if siblings
        .iter()
        .any(|m| m.predecessors.as_slice() == [completed.id])
    {
        return Ok(None); // reset already exists
    }

    let (Some(t1), Some(t2)) = (completed.team1_id, completed.team2_id) else {
        return Err(EngineError::InconsistentBracket(format!(
            "grand final {} completed with unresolved slots",
            completed.id
        )));
    };

    info!(
        "tournament {}: bracket reset, deciding match created",
        completed.tournament_id
    );
    let mut reset =
        MatchRecord::new(completed.tournament_id, completed.stage, completed.round + 1)
            .with_teams(t1, t2);
    reset.bracket_side = Some(BracketSide::GrandFinal);
    reset.predecessors = vec![completed.id];
    Ok(Some(reset))
}

/// Materialize a single-elimination tree. Returns records round by round,
/// bye matches already completed and their winners pre-advanced.
fn build_single_tree(
    tournament_id: TournamentId,
    stage: Stage,
    seeds: &[TeamId],
    scheme: &PointScheme,
    side: Option<BracketSide>,
) -> EngineResult<Vec<MatchRecord>> {
    Ok(flatten(single_tree_grid(tournament_id, stage, seeds, scheme, side)))
}

fn single_tree_grid(
    tournament_id: TournamentId,
    stage: Stage,
    seeds: &[TeamId],
    scheme: &PointScheme,
    side: Option<BracketSide>,
) -> Vec<Vec<MatchRecord>> {
    let size = bracket_size(seeds.len());
    let rounds = size.trailing_zeros() as usize;

    let mut grid: Vec<Vec<MatchRecord>> = (1..=rounds)
        .map(|r| {
            (0..size >> r)
                .map(|_| {
                    let mut m = MatchRecord::new(tournament_id, stage, r as u32);
                    m.bracket_side = side;
                    m
                })
                .collect()
        })
        .collect();

    // wire winner pointers upward
    for r in 0..rounds.saturating_sub(1) {
        let (current, rest) = grid.split_at_mut(r + 1);
        let current = &mut current[r];
        let next = &mut rest[0];
        for (i, m) in current.iter_mut().enumerate() {
            let successor = &mut next[i / 2];
            m.winner_to = Some(SlotRef {
                match_id: successor.id,
                slot: if i % 2 == 0 { Slot::Team1 } else { Slot::Team2 },
            });
            successor.predecessors.push(m.id);
        }
    }

    // place seeds; padding slots beyond the field stay None
    let order = seeding_order(size);
    for i in 0..size / 2 {
        grid[0][i].team1_id = seeds.get(order[2 * i] - 1).copied();
        grid[0][i].team2_id = seeds.get(order[2 * i + 1] - 1).copied();
    }

    // auto-complete byes and pre-fill their successor slots
    let mut advanced: Vec<(SlotRef, TeamId)> = Vec::new();
    for m in &mut grid[0] {
        if m.team2_id.is_some() {
            continue;
        }
        let team = m.team1_id.expect("seeding places the high seed in slot 1");
        m.is_bye = true;
        m.state = MatchState::Completed;
        m.team1_score = Some(scheme.bye_score);
        m.team2_score = Some(0);
        m.winner_id = Some(team);
        if let Some(slot_ref) = m.winner_to {
            advanced.push((slot_ref, team));
        }
    }
    if !advanced.is_empty() {
        for successor in &mut grid[1] {
            for (slot_ref, team) in &advanced {
                if slot_ref.match_id == successor.id {
                    successor.set_slot(slot_ref.slot, Some(*team));
                }
            }
        }
    }

    grid
}

/// Match count of losers-bracket round `r` (1-indexed) for a
/// power-of-two field.
fn losers_round_count(size: usize, r: usize) -> usize {
    if r == 1 {
        size / 4
    } else if r % 2 == 0 {
        // drop round: one winners-bracket loser joins each match
        let w = r / 2 + 1;
        size >> w
    } else {
        // consolidation round: losers-bracket survivors pair off
        let w = (r + 1) / 2;
        size >> (w + 1)
    }
}

/// Materialize a double-elimination bracket: winners tree, losers tree,
/// grand final. Requires a power-of-two field; bye padding is defined
/// for single elimination only.
fn build_double_tree(
    tournament_id: TournamentId,
    stage: Stage,
    seeds: &[TeamId],
    scheme: &PointScheme,
) -> EngineResult<Vec<MatchRecord>> {
    if !seeds.len().is_power_of_two() || seeds.len() < 2 {
        return Err(EngineError::InvalidSeeds(format!(
            "double elimination requires a power-of-two field, got {}",
            seeds.len()
        )));
    }
    let size = seeds.len();
    let k = size.trailing_zeros() as usize;

    let mut winners = single_tree_grid(tournament_id, stage, seeds, scheme, Some(BracketSide::Winners));

    let losers_rounds = if k >= 2 { 2 * k - 2 } else { 0 };
    let mut losers: Vec<Vec<MatchRecord>> = (1..=losers_rounds)
        .map(|r| {
            (0..losers_round_count(size, r))
                .map(|_| {
                    let mut m = MatchRecord::new(tournament_id, stage, r as u32);
                    m.bracket_side = Some(BracketSide::Losers);
                    m
                })
                .collect()
        })
        .collect();

    let mut grand_final = MatchRecord::new(tournament_id, stage, (k + 1) as u32);
    grand_final.bracket_side = Some(BracketSide::GrandFinal);

    if k >= 2 {
        // winners round 1 losers pair off in losers round 1
        for (i, m) in winners[0].iter_mut().enumerate() {
            let successor = &mut losers[0][i / 2];
            m.loser_to = Some(SlotRef {
                match_id: successor.id,
                slot: if i % 2 == 0 { Slot::Team1 } else { Slot::Team2 },
            });
            successor.predecessors.push(m.id);
        }
        // later winners rounds drop into slot 2 of the matching drop round
        for w in 2..=k {
            let drop_round = 2 * w - 2;
            for (i, m) in winners[w - 1].iter_mut().enumerate() {
                let successor = &mut losers[drop_round - 1][i];
                m.loser_to = Some(SlotRef {
                    match_id: successor.id,
                    slot: Slot::Team2,
                });
                successor.predecessors.push(m.id);
            }
        }
        // losers-bracket internal wiring
        for r in 1..losers_rounds {
            let (current, rest) = losers.split_at_mut(r);
            let current = &mut current[r - 1];
            let next = &mut rest[0];
            let next_is_drop = (r + 1) % 2 == 0;
            for (i, m) in current.iter_mut().enumerate() {
                let (si, slot) = if next_is_drop {
                    (i, Slot::Team1)
                } else if i % 2 == 0 {
                    (i / 2, Slot::Team1)
                } else {
                    (i / 2, Slot::Team2)
                };
                let successor = &mut next[si];
                m.winner_to = Some(SlotRef {
                    match_id: successor.id,
                    slot,
                });
                successor.predecessors.push(m.id);
            }
        }
        // losers champion meets the winners champion
        let losers_final = &mut losers[losers_rounds - 1][0];
        losers_final.winner_to = Some(SlotRef {
            match_id: grand_final.id,
            slot: Slot::Team2,
        });
        grand_final.predecessors.push(losers_final.id);
    } else {
        // two-team field: the winners final loser drops straight in
        let only = &mut winners[0][0];
        only.loser_to = Some(SlotRef {
            match_id: grand_final.id,
            slot: Slot::Team2,
        });
        grand_final.predecessors.push(only.id);
    }

    let winners_final = winners
        .last_mut()
        .and_then(|r| r.first_mut())
        .expect("winners tree has a final");
    winners_final.winner_to = Some(SlotRef {
        match_id: grand_final.id,
        slot: Slot::Team1,
    });
    grand_final.predecessors.insert(0, winners_final.id);

    let mut records = flatten(winners);
    records.extend(flatten(losers));
    records.push(grand_final);
    Ok(records)
}

fn flatten(grid: Vec<Vec<MatchRecord>>) -> Vec<MatchRecord> {
    grid.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Team;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn setup(
        team_count: usize,
        config: TournamentConfig,
    ) -> (Arc<MemoryStore>, BracketEngine, TournamentId, Vec<TeamId>) {
        let store = Arc::new(MemoryStore::new());
        let tid = Uuid::new_v4();
        let teams: Vec<Team> = (0..team_count)
            .map(|i| Team::new(format!("Seed {}", i + 1)))
            .collect();
        let seeds = teams.iter().map(|t| t.id).collect();
        store.add_tournament(tid, config, teams);
        let engine = BracketEngine::new(store.clone());
        (store, engine, tid, seeds)
    }

    fn by_id(records: &[MatchRecord]) -> HashMap<MatchId, &MatchRecord> {
        records.iter().map(|m| (m.id, m)).collect()
    }

    #[tokio::test]
    async fn test_single_elim_four_seeds_structure() {
        let (_store, engine, tid, seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();

        assert_eq!(records.len(), 3);
        let semis: Vec<_> = records.iter().filter(|m| m.round == 1).collect();
        let finals: Vec<_> = records.iter().filter(|m| m.round == 2).collect();
        assert_eq!(semis.len(), 2);
        assert_eq!(finals.len(), 1);

        // standard seeding: 1 vs 4, 2 vs 3
        assert_eq!(semis[0].team1_id, Some(seeds[0]));
        assert_eq!(semis[0].team2_id, Some(seeds[3]));
        assert_eq!(semis[1].team1_id, Some(seeds[1]));
        assert_eq!(semis[1].team2_id, Some(seeds[2]));

        // wiring: SF1 winner to final slot 1, SF2 winner to slot 2
        let final_id = finals[0].id;
        assert_eq!(
            semis[0].winner_to,
            Some(SlotRef {
                match_id: final_id,
                slot: Slot::Team1
            })
        );
        assert_eq!(
            semis[1].winner_to,
            Some(SlotRef {
                match_id: final_id,
                slot: Slot::Team2
            })
        );
        assert!(finals[0].winner_to.is_none());
        assert_eq!(finals[0].predecessors, vec![semis[0].id, semis[1].id]);
    }

    #[tokio::test]
    async fn test_single_elim_bye_padding() {
        let (_store, engine, tid, seeds) =
            setup(6, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();

        // size 8: rounds of 4, 2, 1
        assert_eq!(records.len(), 7);
        let round1: Vec<_> = records.iter().filter(|m| m.round == 1).collect();
        let byes: Vec<_> = round1.iter().filter(|m| m.is_bye).collect();
        assert_eq!(byes.len(), 2);

        // seeds 1 and 2 get the byes and are pre-advanced into round 2
        let advanced: HashSet<TeamId> = records
            .iter()
            .filter(|m| m.round == 2)
            .flat_map(|m| [m.team1_id, m.team2_id])
            .flatten()
            .collect();
        assert!(advanced.contains(&seeds[0]));
        assert!(advanced.contains(&seeds[1]));
        for bye in byes {
            assert_eq!(bye.state, MatchState::Completed);
            assert_eq!(bye.winner_id, bye.team1_id);
        }
    }

    #[tokio::test]
    async fn test_each_seed_appears_once_in_round_one() {
        let (_store, engine, tid, seeds) =
            setup(8, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();

        let mut seen = HashSet::new();
        for m in records.iter().filter(|m| m.round == 1) {
            for team in [m.team1_id, m.team2_id].into_iter().flatten() {
                assert!(seen.insert(team), "seed appears twice in round 1");
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn test_advance_routes_winner() {
        let (store, engine, tid, seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();
        let sf1 = records.iter().find(|m| m.round == 1).unwrap().clone();

        let mut done = sf1.clone();
        done.state = MatchState::Completed;
        done.team1_score = Some(13);
        done.team2_score = Some(7);
        done.winner_id = done.team1_id;
        done.touch();
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(done.clone()));
        store.commit(batch).await.unwrap();

        let written = engine.advance(sf1.id).await.unwrap();
        assert_eq!(written.len(), 1);
        let successor = store
            .get_match(sf1.winner_to.unwrap().match_id)
            .await
            .unwrap();
        assert_eq!(successor.team1_id, done.winner_id);

        // advancing again is a no-op
        let written = engine.advance(sf1.id).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_advance_conflicting_slot() {
        let (store, engine, tid, seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();
        let sf1 = records.iter().find(|m| m.round == 1).unwrap().clone();
        let final_ref = sf1.winner_to.unwrap();

        // an earlier, incomplete revert left the wrong team in the slot
        let mut tampered = store.get_match(final_ref.match_id).await.unwrap();
        tampered.set_slot(final_ref.slot, Some(seeds[2]));
        tampered.touch();
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(tampered));
        store.commit(batch).await.unwrap();

        let mut done = sf1;
        done.state = MatchState::Completed;
        done.team1_score = Some(13);
        done.team2_score = Some(7);
        done.winner_id = done.team1_id;
        done.touch();
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(done.clone()));
        store.commit(batch).await.unwrap();

        let err = engine.advance(done.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InconsistentBracket(_)));
    }

    #[tokio::test]
    async fn test_advance_requires_completion() {
        let (_store, engine, tid, seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        let records = engine.build_bracket(tid, &seeds).await.unwrap();
        let sf1 = records.iter().find(|m| m.round == 1).unwrap();
        let err = engine.advance(sf1.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_rebuild_rejected() {
        let (_store, engine, tid, seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        engine.build_bracket(tid, &seeds).await.unwrap();
        let err = engine.build_bracket(tid, &seeds).await.unwrap_err();
        assert!(matches!(err, EngineError::InconsistentBracket(_)));
    }

    #[tokio::test]
    async fn test_double_elim_four_seeds_structure() {
        let (_store, engine, tid, seeds) = setup(
            4,
            TournamentConfig::double_elimination("Major".to_string(), false),
        );
        let records = engine.build_bracket(tid, &seeds).await.unwrap();

        // 2 + 1 winners, 2 losers, 1 grand final
        assert_eq!(records.len(), 6);
        let winners: Vec<_> = records
            .iter()
            .filter(|m| m.bracket_side == Some(BracketSide::Winners))
            .collect();
        let losers: Vec<_> = records
            .iter()
            .filter(|m| m.bracket_side == Some(BracketSide::Losers))
            .collect();
        let finals: Vec<_> = records
            .iter()
            .filter(|m| m.bracket_side == Some(BracketSide::GrandFinal))
            .collect();
        assert_eq!(winners.len(), 3);
        assert_eq!(losers.len(), 2);
        assert_eq!(finals.len(), 1);

        let index = by_id(&records);

        // winners round 1 losers pair off in losers round 1
        let wb_r1: Vec<_> = winners.iter().filter(|m| m.round == 1).collect();
        let lb_r1 = losers.iter().find(|m| m.round == 1).unwrap();
        for m in &wb_r1 {
            assert_eq!(m.loser_to.unwrap().match_id, lb_r1.id);
        }

        // winners final loser drops into losers round 2 slot 2
        let wb_final = winners.iter().find(|m| m.round == 2).unwrap();
        let lb_final = losers.iter().find(|m| m.round == 2).unwrap();
        assert_eq!(
            wb_final.loser_to,
            Some(SlotRef {
                match_id: lb_final.id,
                slot: Slot::Team2
            })
        );

        // both champions feed the grand final
        let gf = finals[0];
        assert_eq!(
            wb_final.winner_to,
            Some(SlotRef {
                match_id: gf.id,
                slot: Slot::Team1
            })
        );
        assert_eq!(
            lb_final.winner_to,
            Some(SlotRef {
                match_id: gf.id,
                slot: Slot::Team2
            })
        );
        assert_eq!(gf.predecessors.len(), 2);
        assert!(index.contains_key(&gf.predecessors[0]));
    }

    #[tokio::test]
    async fn test_double_elim_eight_seeds_counts() {
        let (_store, engine, tid, seeds) = setup(
            8,
            TournamentConfig::double_elimination("Major".to_string(), false),
        );
        let records = engine.build_bracket(tid, &seeds).await.unwrap();

        // winners 4+2+1, losers 2+2+1+1, grand final
        assert_eq!(records.len(), 14);
        let losers_counts: Vec<usize> = (1..=4)
            .map(|r| {
                records
                    .iter()
                    .filter(|m| m.bracket_side == Some(BracketSide::Losers) && m.round == r)
                    .count()
            })
            .collect();
        assert_eq!(losers_counts, vec![2, 2, 1, 1]);

        // every loser drop has a destination
        for m in records
            .iter()
            .filter(|m| m.bracket_side == Some(BracketSide::Winners))
        {
            assert!(m.loser_to.is_some());
        }
    }

    #[tokio::test]
    async fn test_double_elim_rejects_ragged_field() {
        let (_store, engine, tid, seeds) = setup(
            6,
            TournamentConfig::double_elimination("Major".to_string(), false),
        );
        let err = engine.build_bracket(tid, &seeds).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSeeds(_)));
    }

    #[tokio::test]
    async fn test_bracket_reset_created_when_losers_champion_wins() {
        let (store, engine, tid, seeds) = setup(
            2,
            TournamentConfig::double_elimination("Major".to_string(), true),
        );
        let records = engine.build_bracket(tid, &seeds).await.unwrap();
        let gf = records
            .iter()
            .find(|m| m.bracket_side == Some(BracketSide::GrandFinal))
            .unwrap()
            .clone();

        // fill the grand final and let the losers-side team (slot 2) win
        let mut done = gf.clone();
        done.team1_id = Some(seeds[0]);
        done.team2_id = Some(seeds[1]);
        done.state = MatchState::Completed;
        done.team1_score = Some(9);
        done.team2_score = Some(13);
        done.winner_id = Some(seeds[1]);
        done.touch();
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(done));
        store.commit(batch).await.unwrap();

        let written = engine.advance(gf.id).await.unwrap();
        let reset = written
            .iter()
            .find(|m| m.predecessors.as_slice() == [gf.id])
            .expect("reset match created");
        assert_eq!(reset.bracket_side, Some(BracketSide::GrandFinal));
        assert!(reset.teams_resolved());

        // second advance does not create another
        let written = engine.advance(gf.id).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_no_reset_when_winners_champion_wins() {
        let (store, engine, tid, seeds) = setup(
            2,
            TournamentConfig::double_elimination("Major".to_string(), true),
        );
        let records = engine.build_bracket(tid, &seeds).await.unwrap();
        let gf = records
            .iter()
            .find(|m| m.bracket_side == Some(BracketSide::GrandFinal))
            .unwrap()
            .clone();

        let mut done = gf.clone();
        done.team1_id = Some(seeds[0]);
        done.team2_id = Some(seeds[1]);
        done.state = MatchState::Completed;
        done.team1_score = Some(13);
        done.team2_score = Some(9);
        done.winner_id = Some(seeds[0]);
        done.touch();
        let mut batch = WriteBatch::new();
        batch.updates.push(VersionedUpdate::new(done));
        store.commit(batch).await.unwrap();

        let written = engine.advance(gf.id).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_build_playoffs_seeds_from_standings() {
        let store = Arc::new(MemoryStore::new());
        let tid = Uuid::new_v4();
        let teams: Vec<Team> = (0..4).map(|i| Team::new(format!("Team {i}"))).collect();
        store.add_tournament(tid, TournamentConfig::swiss("Open".to_string(), 2, 2), teams.clone());

        // one Swiss result puts team 3 on top of the standings
        let mut m = MatchRecord::new(tid, Stage::SwissRound, 1).with_teams(teams[3].id, teams[0].id);
        m.state = MatchState::Completed;
        m.team1_score = Some(13);
        m.team2_score = Some(5);
        m.winner_id = Some(teams[3].id);
        let mut batch = WriteBatch::new();
        batch.inserts.push(m);
        store.commit(batch).await.unwrap();

        let engine = BracketEngine::new(store.clone());
        let records = engine.build_playoffs(tid).await.unwrap();

        assert_eq!(records.len(), 1);
        let final_match = &records[0];
        assert_eq!(final_match.stage, Stage::Playoff);
        assert_eq!(final_match.team1_id, Some(teams[3].id));
    }

    #[tokio::test]
    async fn test_build_bracket_rejects_unknown_seed() {
        let (_store, engine, tid, mut seeds) =
            setup(4, TournamentConfig::single_elimination("Cup".to_string()));
        seeds[3] = Uuid::new_v4();
        let err = engine.build_bracket(tid, &seeds).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSeeds(_)));
    }
}
