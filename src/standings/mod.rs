//! Swiss standings computation.
//!
//! Standings are never stored: [`compute_standings`] is a pure function
//! recomputed from scratch over the full set of completed Swiss-round
//! matches, which keeps it deterministic and trivially testable. Buchholz
//! is a two-pass computation: raw per-team stats first, then
//! strength-of-schedule from those results.
//!
//! The tiebreak cascade, applied left to right with each step breaking
//! only the previous step's ties:
//!
//! 1. points (desc)
//! 2. match wins (desc)
//! 3. game wins (desc)
//! 4. game losses (asc)
//! 5. match losses (asc)
//! 6. zero-loss precedence: a team with `rounds_lost == 0` ranks above a
//!    tied team with `rounds_lost > 0`; otherwise round diff (desc)
//! 7. Buchholz (desc)
//! 8. stable: prior relative order preserved
//!
//! The zero-loss precedence step is deliberate tournament policy, not a
//! plain score comparison.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{EngineError, EngineResult};
use crate::models::{
    MatchRecord, MatchState, PointScheme, Stage, StandingEntry, Team, TournamentId,
};
use crate::store::MatchStore;

/// Compute the ranked standings table for a set of teams from the
/// completed Swiss-round matches among them.
///
/// The output is independent of the order of `matches`; completed matches
/// are canonically ordered by `(round, id)` before accumulation.
///
/// # Errors
///
/// * `MissingTeams` - a completed match references a team not in `teams`
pub fn compute_standings(
    teams: &[Team],
    matches: &[MatchRecord],
    scheme: &PointScheme,
) -> EngineResult<Vec<StandingEntry>> {
    let mut entries: Vec<StandingEntry> =
        teams.iter().map(|t| StandingEntry::blank(t.id)).collect();
    let index: HashMap<_, usize> = teams
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id, i))
        .collect();

    let mut completed: Vec<&MatchRecord> = matches
        .iter()
        .filter(|m| m.stage == Stage::SwissRound && m.state == MatchState::Completed)
        .collect();
    completed.sort_by_key(|m| (m.round, m.id));

    // Pass 1: raw per-team stats
    for m in &completed {
        accumulate(&mut entries, &index, m, scheme)?;
    }

    // Pass 2: Buchholz from pass-1 points
    let points_by_team: HashMap<_, _> = entries.iter().map(|e| (e.team_id, e.points)).collect();
    for entry in &mut entries {
        entry.buchholz_score = entry
            .opponents_played
            .iter()
            .filter_map(|id| points_by_team.get(id))
            .sum();
    }

    entries.sort_by(compare_entries);
    Ok(entries)
}

fn accumulate(
    entries: &mut [StandingEntry],
    index: &HashMap<uuid::Uuid, usize>,
    m: &MatchRecord,
    scheme: &PointScheme,
) -> EngineResult<()> {
    let winner = m.winner_id.ok_or(EngineError::MissingTeams(m.id))?;
    let team1 = m.team1_id.ok_or(EngineError::MissingTeams(m.id))?;
    let team1_score = m.team1_score.unwrap_or(0);
    let team2_score = m.team2_score.unwrap_or(0);

    // Bye: one participant, a credited win, no opponent appended
    let Some(team2) = m.team2_id else {
        let i = *index.get(&team1).ok_or(EngineError::MissingTeams(m.id))?;
        let e = &mut entries[i];
        e.points += scheme.win_points;
        e.match_wins += 1;
        e.game_wins += 1;
        e.rounds_won += team1_score;
        e.rounds_lost += team2_score;
        return Ok(());
    };

    let i1 = *index.get(&team1).ok_or(EngineError::MissingTeams(m.id))?;
    let i2 = *index.get(&team2).ok_or(EngineError::MissingTeams(m.id))?;

    // Map-level game tallies; a single-map match counts as one game
    let (t1_games, t2_games, t1_rounds, t2_rounds) = if m.games.is_empty() {
        let t1_won = winner == team1;
        (
            u32::from(t1_won),
            u32::from(!t1_won),
            team1_score,
            team2_score,
        )
    } else {
        let t1_games = m
            .games
            .iter()
            .filter(|g| g.team1_rounds > g.team2_rounds)
            .count() as u32;
        let t2_games = m.games.len() as u32 - t1_games;
        let t1_rounds = m.games.iter().map(|g| g.team1_rounds).sum();
        let t2_rounds = m.games.iter().map(|g| g.team2_rounds).sum();
        (t1_games, t2_games, t1_rounds, t2_rounds)
    };

    {
        let e = &mut entries[i1];
        if winner == team1 {
            e.points += scheme.win_points;
            e.match_wins += 1;
        } else {
            e.points += scheme.loss_points;
            e.match_losses += 1;
        }
        e.game_wins += t1_games;
        e.game_losses += t2_games;
        e.rounds_won += t1_rounds;
        e.rounds_lost += t2_rounds;
        e.opponents_played.push(team2);
    }
    {
        let e = &mut entries[i2];
        if winner == team2 {
            e.points += scheme.win_points;
            e.match_wins += 1;
        } else {
            e.points += scheme.loss_points;
            e.match_losses += 1;
        }
        e.game_wins += t2_games;
        e.game_losses += t1_games;
        e.rounds_won += t2_rounds;
        e.rounds_lost += t1_rounds;
        e.opponents_played.push(team1);
    }

    Ok(())
}

/// The tiebreak cascade. `Less` means `a` ranks higher.
fn compare_entries(a: &StandingEntry, b: &StandingEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.match_wins.cmp(&a.match_wins))
        .then_with(|| b.game_wins.cmp(&a.game_wins))
        .then_with(|| a.game_losses.cmp(&b.game_losses))
        .then_with(|| a.match_losses.cmp(&b.match_losses))
        .then_with(|| zero_loss_precedence(a, b))
        .then_with(|| b.buchholz_score.cmp(&a.buchholz_score))
    // step 8: stable sort preserves prior relative order
}

/// Step 6: a team that has not lost a single round outranks a tied team
/// that has; otherwise round difference decides.
fn zero_loss_precedence(a: &StandingEntry, b: &StandingEntry) -> Ordering {
    match (a.rounds_lost == 0, b.rounds_lost == 0) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => {
            let a_diff = a.rounds_won - a.rounds_lost;
            let b_diff = b.rounds_won - b.rounds_lost;
            b_diff.cmp(&a_diff)
        }
    }
}

/// Standings access over the store. Performs no writes; safe to run
/// concurrently with any mutation.
#[derive(Clone)]
pub struct StandingsCalculator {
    store: Arc<dyn MatchStore>,
}

impl StandingsCalculator {
    /// Create a new calculator
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Snapshot-read the tournament's teams and matches, then compute.
    pub async fn for_tournament(&self, id: TournamentId) -> EngineResult<Vec<StandingEntry>> {
        let config = self.store.tournament_config(id).await?;
        let teams = self.store.teams(id).await?;
        let matches = self.store.list_matches(id).await?;
        compute_standings(&teams, &matches, &config.point_scheme)
    }
}
