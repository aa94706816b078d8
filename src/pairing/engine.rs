//! Swiss pairing engine.

use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::{EngineError, EngineResult};
use crate::models::{MatchRecord, MatchState, Stage, TeamId, TournamentId};
use crate::standings::compute_standings;
use crate::store::{MatchStore, WriteBatch};

/// Generates Swiss rounds. Stateless; every call reads the tournament
/// fresh and commits the new round plus the bumped round counters as one
/// batch.
#[derive(Clone)]
pub struct PairingEngine {
    store: Arc<dyn MatchStore>,
}

impl PairingEngine {
    /// Create a new pairing engine
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Pair the next Swiss round.
    ///
    /// Returns the created records, including the auto-completed bye
    /// record for an odd field. Matches are created in
    /// `pending_scheduling` with both slots resolved.
    ///
    /// # Errors
    ///
    /// * `PairingInfeasible` - no rematch-free pairing of the field exists
    pub async fn generate_next_round(
        &self,
        tournament_id: TournamentId,
    ) -> EngineResult<Vec<MatchRecord>> {
        let config = self.store.tournament_config(tournament_id).await?;
        let teams = self.store.teams(tournament_id).await?;
        let matches = self.store.list_matches(tournament_id).await?;

        if config.rounds > 0 && config.current_round >= config.rounds {
            warn!(
                "tournament {tournament_id}: pairing round {} beyond the {} planned rounds",
                config.current_round + 1,
                config.rounds
            );
        }

        let standings = compute_standings(&teams, &matches, &config.point_scheme)?;
        let mut order: Vec<TeamId> = standings.iter().map(|e| e.team_id).collect();
        let played: HashMap<TeamId, HashSet<TeamId>> = standings
            .iter()
            .map(|e| (e.team_id, e.opponents_played.iter().copied().collect()))
            .collect();

        let next_round = config.current_round + 1;
        let matchday = config.current_matchday + 1;
        let mut created = Vec::new();

        if order.len() % 2 == 1 {
            let bye_team = pick_bye_team(&order, &matches);
            order.retain(|&t| t != bye_team);

            let mut bye = MatchRecord::new(tournament_id, Stage::SwissRound, next_round);
            bye.matchday = matchday;
            bye.team1_id = Some(bye_team);
            bye.is_bye = true;
            bye.state = MatchState::Completed;
            bye.team1_score = Some(config.point_scheme.bye_score);
            bye.team2_score = Some(0);
            bye.winner_id = Some(bye_team);
            info!("tournament {tournament_id} round {next_round}: bye for {bye_team}");
            created.push(bye);
        }

        let pairs = pair_field(&order, &played).ok_or(EngineError::PairingInfeasible)?;
        for (team1, team2) in pairs {
            let mut m =
                MatchRecord::new(tournament_id, Stage::SwissRound, next_round).with_teams(team1, team2);
            m.matchday = matchday;
            created.push(m);
        }

        let mut updated_config = config;
        updated_config.current_round = next_round;
        updated_config.current_matchday = matchday;

        let mut batch = WriteBatch::new();
        batch.inserts = created.clone();
        batch.config_update = Some((tournament_id, updated_config));
        self.store.commit(batch).await?;

        info!(
            "tournament {tournament_id}: round {next_round} paired, {} matches",
            created.len()
        );
        Ok(created)
    }
}

/// Lowest-ranked team without a prior bye; if every team already had one,
/// the lowest-ranked team takes a second bye.
fn pick_bye_team(order: &[TeamId], matches: &[MatchRecord]) -> TeamId {
    let had_bye: HashSet<TeamId> = matches
        .iter()
        .filter(|m| m.is_bye && m.state == MatchState::Completed)
        .filter_map(|m| m.team1_id)
        .collect();

    order
        .iter()
        .rev()
        .find(|t| !had_bye.contains(t))
        .or_else(|| order.last())
        .copied()
        .expect("bye selection on a non-empty field")
}

/// Pair a standings-ordered field without rematches.
///
/// Each unpaired leader takes the highest-ranked available opponent it
/// has not faced; the ranking order makes that same-bracket top-to-bottom
/// pairing first and an adjacent-bracket float-down otherwise.
/// Backtracks when a greedy choice strands the remainder.
fn pair_field(
    order: &[TeamId],
    played: &HashMap<TeamId, HashSet<TeamId>>,
) -> Option<Vec<(TeamId, TeamId)>> {
    if order.is_empty() {
        return Some(Vec::new());
    }

    let first = order[0];
    let rematches: Option<&HashSet<TeamId>> = played.get(&first);
    for (i, &candidate) in order.iter().enumerate().skip(1) {
        if rematches.is_some_and(|set| set.contains(&candidate)) {
            continue;
        }
        let rest: Vec<TeamId> = order
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != 0 && j != i)
            .map(|(_, &t)| t)
            .collect();
        if let Some(mut pairs) = pair_field(&rest, played) {
            pairs.insert(0, (first, candidate));
            return Some(pairs);
        }
    }
    None
}
