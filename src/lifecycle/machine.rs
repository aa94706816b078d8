//! Pure transition rules for the match lifecycle.
//!
//! No store access here; callers load a record, check the transition, and
//! commit the mutated copy.

use crate::errors::{EngineError, EngineResult};
use crate::models::{MatchRecord, MatchState, PointScheme, TeamId};

/// Whether `from -> to` appears in the lifecycle table.
///
/// The administrative override to `Completed` from any state is handled
/// separately and does not go through this table.
#[must_use]
pub fn is_legal_transition(from: MatchState, to: MatchState) -> bool {
    use MatchState::{Completed, MapBanning, PendingScheduling, Playing, ReadyUp, Scheduled};
    matches!(
        (from, to),
        (PendingScheduling, Scheduled)
            | (Scheduled, ReadyUp)
            | (ReadyUp, MapBanning)
            | (MapBanning, Playing)
            | (Playing, Completed)
    )
}

/// Check that `record` may transition to `to`, including per-edge guards.
///
/// # Errors
///
/// * `InvalidTransition` - the edge is not in the table or a guard failed
/// * `MissingTeams` - leaving `PendingScheduling` with an unresolved slot
pub fn ensure_transition(record: &MatchRecord, to: MatchState) -> EngineResult<()> {
    let from = record.state;
    if !is_legal_transition(from, to) {
        return Err(EngineError::InvalidTransition {
            match_id: record.id,
            from,
            to,
        });
    }

    let guard_ok = match to {
        MatchState::Scheduled => {
            if !record.teams_resolved() {
                return Err(EngineError::MissingTeams(record.id));
            }
            record.scheduled_at.is_some()
        }
        MatchState::ReadyUp => true, // time-gated or operator-triggered
        MatchState::MapBanning => record.team1_ready && record.team2_ready,
        MatchState::Playing => record.maps_locked,
        _ => true,
    };

    if guard_ok {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            match_id: record.id,
            from,
            to,
        })
    }
}

/// Validate a reported result against the record and point scheme.
///
/// With `admin_override` the score-consistency check (one side reaching
/// the win condition, winner holding the higher score) is bypassed, but
/// the structural invariants (resolved slots, winner being one of the two
/// teams, non-negative scores) still hold.
///
/// # Errors
///
/// * `MissingTeams` - a team slot is unresolved
/// * `InvalidResult` - winner not in the match, or scores inconsistent
pub fn validate_result(
    record: &MatchRecord,
    team1_score: i64,
    team2_score: i64,
    winner_id: TeamId,
    scheme: &PointScheme,
    admin_override: bool,
) -> EngineResult<()> {
    let (Some(t1), Some(t2)) = (record.team1_id, record.team2_id) else {
        return Err(EngineError::MissingTeams(record.id));
    };

    if winner_id != t1 && winner_id != t2 {
        return Err(EngineError::InvalidResult(format!(
            "winner {winner_id} is not a participant of match {}",
            record.id
        )));
    }

    if team1_score < 0 || team2_score < 0 {
        return Err(EngineError::InvalidResult(format!(
            "negative score {team1_score}-{team2_score}"
        )));
    }

    if admin_override {
        return Ok(());
    }

    let (winner_score, loser_score) = if winner_id == t1 {
        (team1_score, team2_score)
    } else {
        (team2_score, team1_score)
    };

    if winner_score <= loser_score {
        return Err(EngineError::InvalidResult(format!(
            "winner score {winner_score} does not exceed loser score {loser_score}"
        )));
    }
    if winner_score < scheme.score_to_win {
        return Err(EngineError::InvalidResult(format!(
            "winner score {winner_score} below win condition {}",
            scheme.score_to_win
        )));
    }

    Ok(())
}
