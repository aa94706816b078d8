//! Integration tests for the tournament engine
//!
//! These tests drive complete tournament flows end to end over the
//! in-memory store: the full match lifecycle, Swiss rounds into playoffs,
//! double elimination with a bracket reset, and revert-and-replay.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use tourney_engine::{
    BracketEngine, MatchLifecycle, PairingEngine, RevertCoordinator, StandingsCalculator,
    models::{
        BracketSide, MatchId, MatchRecord, MatchState, Provenance, Stage, Team, TeamId,
        TournamentConfig, TournamentId,
    },
    store::{MatchStore, MemoryStore},
};

struct Harness {
    store: Arc<MemoryStore>,
    lifecycle: MatchLifecycle,
    pairing: PairingEngine,
    bracket: BracketEngine,
    revert: RevertCoordinator,
    standings: StandingsCalculator,
    tid: TournamentId,
    teams: Vec<Team>,
}

fn harness(team_count: usize, config: TournamentConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let tid = Uuid::new_v4();
    let teams: Vec<Team> = (0..team_count)
        .map(|i| Team::new(format!("Team {i}")))
        .collect();
    store.add_tournament(tid, config, teams.clone());
    Harness {
        lifecycle: MatchLifecycle::new(store.clone()),
        pairing: PairingEngine::new(store.clone()),
        bracket: BracketEngine::new(store.clone()),
        revert: RevertCoordinator::new(store.clone()),
        standings: StandingsCalculator::new(store.clone()),
        store,
        tid,
        teams,
    }
}

impl Harness {
    fn seeds(&self) -> Vec<TeamId> {
        self.teams.iter().map(|t| t.id).collect()
    }

    /// Complete a match administratively, 13-7 for `winner`.
    async fn win(&self, match_id: MatchId, winner: TeamId) -> Result<MatchRecord> {
        let m = self.store.get_match(match_id).await?;
        let done = self
            .lifecycle
            .force_complete(match_id, 13, 7, winner, Provenance::Manual, m.version)
            .await?;
        Ok(done)
    }
}

#[tokio::test]
async fn test_full_lifecycle_to_bracket_champion() -> Result<()> {
    let h = harness(4, TournamentConfig::single_elimination("Cup".to_string()));
    let seeds = h.seeds();
    let records = h.bracket.build_bracket(h.tid, &seeds).await?;

    let semis: Vec<MatchRecord> = records.iter().filter(|m| m.round == 1).cloned().collect();
    assert_eq!(semis.len(), 2);

    // play one semifinal through the entire lifecycle, step by step
    let sf = &semis[0];
    let (t1, t2) = (sf.team1_id.unwrap(), sf.team2_id.unwrap());
    let m = h.lifecycle.schedule(sf.id, Utc::now(), sf.version).await?;
    let m = h.lifecycle.begin_ready_up(m.id, m.version).await?;
    let m = h.lifecycle.set_ready(m.id, t1, m.version).await?;
    let m = h.lifecycle.set_ready(m.id, t2, m.version).await?;
    assert_eq!(m.state, MatchState::MapBanning);
    let m = h.lifecycle.lock_maps(m.id, m.version).await?;
    let m = h
        .lifecycle
        .complete_match(m.id, 13, 9, t1, Provenance::AutoDetected { confidence: 0.95 }, m.version)
        .await?;
    assert_eq!(m.state, MatchState::Completed);

    // winner seated in the final by the same transaction
    let final_ref = sf.winner_to.unwrap();
    let final_match = h.store.get_match(final_ref.match_id).await?;
    assert_eq!(final_match.slot(final_ref.slot), Some(t1));

    // fast-forward the rest
    h.win(semis[1].id, semis[1].team1_id.unwrap()).await?;
    let final_match = h.store.get_match(final_ref.match_id).await?;
    assert!(final_match.teams_resolved());
    let done = h.win(final_match.id, t1).await?;
    assert_eq!(done.winner_id, Some(t1));
    assert!(done.winner_to.is_none());
    Ok(())
}

#[tokio::test]
async fn test_swiss_rounds_into_playoffs() -> Result<()> {
    let h = harness(8, TournamentConfig::swiss("Open".to_string(), 3, 4));

    let mut pairings_seen: HashSet<(TeamId, TeamId)> = HashSet::new();
    for _ in 0..3 {
        let round = h.pairing.generate_next_round(h.tid).await?;
        assert_eq!(round.len(), 4);
        for m in &round {
            let (a, b) = (m.team1_id.unwrap(), m.team2_id.unwrap());
            let key = if a < b { (a, b) } else { (b, a) };
            assert!(pairings_seen.insert(key), "rematch generated");
            // the team listed first wins every time
            h.win(m.id, a).await?;
        }
    }

    let standings = h.standings.for_tournament(h.tid).await?;
    assert_eq!(standings.len(), 8);
    assert_eq!(standings[0].match_wins, 3);
    let total_wins: u32 = standings.iter().map(|e| e.match_wins).sum();
    let total_losses: u32 = standings.iter().map(|e| e.match_losses).sum();
    assert_eq!(total_wins, 12);
    assert_eq!(total_losses, 12);

    // top four seed the playoff bracket
    let playoffs = h.bracket.build_playoffs(h.tid).await?;
    assert_eq!(playoffs.len(), 3);
    let playoff_field: HashSet<TeamId> = playoffs
        .iter()
        .filter(|m| m.round == 1)
        .flat_map(|m| [m.team1_id, m.team2_id])
        .flatten()
        .collect();
    let expected: HashSet<TeamId> = standings.iter().take(4).map(|e| e.team_id).collect();
    assert_eq!(playoff_field, expected);
    for m in &playoffs {
        assert_eq!(m.stage, Stage::Playoff);
    }
    Ok(())
}

#[tokio::test]
async fn test_double_elimination_with_bracket_reset() -> Result<()> {
    let h = harness(
        4,
        TournamentConfig::double_elimination("Major".to_string(), true),
    );
    let seeds = h.seeds();
    let records = h.bracket.build_bracket(h.tid, &seeds).await?;
    assert_eq!(records.len(), 6);

    let wb_r1: Vec<MatchRecord> = records
        .iter()
        .filter(|m| m.bracket_side == Some(BracketSide::Winners) && m.round == 1)
        .cloned()
        .collect();
    let wb_final = records
        .iter()
        .find(|m| m.bracket_side == Some(BracketSide::Winners) && m.round == 2)
        .unwrap();
    let lb_r1 = records
        .iter()
        .find(|m| m.bracket_side == Some(BracketSide::Losers) && m.round == 1)
        .unwrap();
    let lb_final = records
        .iter()
        .find(|m| m.bracket_side == Some(BracketSide::Losers) && m.round == 2)
        .unwrap();
    let gf = records
        .iter()
        .find(|m| m.bracket_side == Some(BracketSide::GrandFinal))
        .unwrap();

    // winners round 1: higher slot wins both
    for m in &wb_r1 {
        h.win(m.id, m.team1_id.unwrap()).await?;
    }
    // losers round 1 now holds both losers
    let lb1 = h.store.get_match(lb_r1.id).await?;
    assert!(lb1.teams_resolved());
    let lb1_winner = lb1.team1_id.unwrap();
    h.win(lb1.id, lb1_winner).await?;

    // winners final: its loser drops into the losers final
    let wbf = h.store.get_match(wb_final.id).await?;
    let wb_champion = wbf.team1_id.unwrap();
    let wb_runner_up = wbf.team2_id.unwrap();
    h.win(wbf.id, wb_champion).await?;

    let lbf = h.store.get_match(lb_final.id).await?;
    assert_eq!(lbf.team1_id, Some(lb1_winner));
    assert_eq!(lbf.team2_id, Some(wb_runner_up));
    h.win(lbf.id, wb_runner_up).await?;

    // grand final: losers-bracket champion wins, forcing the reset
    let gf_match = h.store.get_match(gf.id).await?;
    assert_eq!(gf_match.team1_id, Some(wb_champion));
    assert_eq!(gf_match.team2_id, Some(wb_runner_up));
    h.win(gf_match.id, wb_runner_up).await?;

    let all = h.store.list_matches(h.tid).await?;
    assert_eq!(all.len(), 7);
    let reset = all
        .iter()
        .find(|m| m.predecessors.as_slice() == [gf.id])
        .expect("reset match exists");
    assert_eq!(reset.bracket_side, Some(BracketSide::GrandFinal));
    assert!(reset.teams_resolved());

    // the reset decides it
    let done = h.win(reset.id, wb_runner_up).await?;
    assert_eq!(done.winner_id, Some(wb_runner_up));
    assert!(done.winner_to.is_none());
    Ok(())
}

#[tokio::test]
async fn test_revert_and_replay_changes_champion() -> Result<()> {
    let h = harness(4, TournamentConfig::single_elimination("Cup".to_string()));
    let seeds = h.seeds();
    let records = h.bracket.build_bracket(h.tid, &seeds).await?;

    let semis: Vec<MatchRecord> = records.iter().filter(|m| m.round == 1).cloned().collect();
    let final_id = semis[0].winner_to.unwrap().match_id;
    let (sf1_winner, sf1_loser) = (semis[0].team1_id.unwrap(), semis[0].team2_id.unwrap());

    h.win(semis[0].id, sf1_winner).await?;
    h.win(semis[1].id, semis[1].team1_id.unwrap()).await?;
    h.win(final_id, sf1_winner).await?;

    // scores were entered for the wrong side; unwind the whole chain
    h.revert.revert_match(semis[0].id, true).await?;
    let final_match = h.store.get_match(final_id).await?;
    assert_eq!(final_match.state, MatchState::PendingScheduling);

    // replay with the other semifinalist winning
    h.win(semis[0].id, sf1_loser).await?;
    let final_match = h.store.get_match(final_id).await?;
    assert!(final_match.teams_resolved());
    let done = h.win(final_id, sf1_loser).await?;
    assert_eq!(done.winner_id, Some(sf1_loser));
    Ok(())
}

#[tokio::test]
async fn test_stale_writer_loses() -> Result<()> {
    let h = harness(2, TournamentConfig::swiss("Open".to_string(), 1, 2));
    let round = h.pairing.generate_next_round(h.tid).await?;
    let m = &round[0];
    let winner = m.team1_id.unwrap();

    // two operators read the same version; the second write must fail
    h.lifecycle
        .force_complete(m.id, 13, 7, winner, Provenance::Manual, m.version)
        .await?;
    let err = h
        .lifecycle
        .force_complete(m.id, 7, 13, m.team2_id.unwrap(), Provenance::Manual, m.version)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        tourney_engine::EngineError::InvalidTransition { .. }
            | tourney_engine::EngineError::ConcurrentModification { .. }
    ));

    let stored = h.store.get_match(m.id).await?;
    assert_eq!(stored.winner_id, Some(winner));
    Ok(())
}

#[tokio::test]
async fn test_bye_recipient_counted_in_standings() -> Result<()> {
    let h = harness(5, TournamentConfig::swiss("Open".to_string(), 2, 2));
    let round = h.pairing.generate_next_round(h.tid).await?;
    let bye_team = round
        .iter()
        .find(|m| m.is_bye)
        .and_then(|m| m.team1_id)
        .unwrap();
    for m in round.iter().filter(|m| !m.is_bye) {
        h.win(m.id, m.team1_id.unwrap()).await?;
    }

    let standings = h.standings.for_tournament(h.tid).await?;
    let entry = standings.iter().find(|e| e.team_id == bye_team).unwrap();
    assert_eq!(entry.match_wins, 1);
    assert_eq!(entry.match_losses, 0);
    assert!(entry.opponents_played.is_empty());
    assert_eq!(entry.buchholz_score, 0);
    Ok(())
}
