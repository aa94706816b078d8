//! Core data models: match records, tournament configuration, standings.
//!
//! A tournament's bracket is stored as an arena of [`MatchRecord`]s indexed
//! by opaque ids. Matches reference one another only through typed slot
//! pointers ([`SlotRef`]), which keeps ownership acyclic and serialization
//! trivial across service boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Match ID type
pub type MatchId = Uuid;
/// Team ID type
pub type TeamId = Uuid;
/// Tournament ID type
pub type TournamentId = Uuid;

/// Lifecycle states of a match.
///
/// `Completed` is terminal; every other state can additionally be
/// force-completed by an administrative override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    /// Created, team slots possibly unresolved, no time set
    PendingScheduling,
    /// Both slots resolved and a time agreed
    Scheduled,
    /// Waiting for both teams to flag ready
    ReadyUp,
    /// Map veto in progress
    MapBanning,
    /// Match live
    Playing,
    /// Terminal; result recorded
    Completed,
}

impl MatchState {
    /// Whether this state is terminal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::PendingScheduling => "pending_scheduling",
            Self::Scheduled => "scheduled",
            Self::ReadyUp => "ready_up",
            Self::MapBanning => "map_banning",
            Self::Playing => "playing",
            Self::Completed => "completed",
        };
        write!(f, "{repr}")
    }
}

/// Stage a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Swiss group stage round
    SwissRound,
    /// Playoff bracket seeded from Swiss standings
    Playoff,
    /// Standalone elimination bracket
    Bracket,
}

/// Which tree of a double-elimination bracket a match sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BracketSide {
    Winners,
    Losers,
    GrandFinal,
}

/// Team slot within a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Team1,
    Team2,
}

/// Pointer to a specific team slot of another match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub match_id: MatchId,
    pub slot: Slot,
}

/// Origin of a reported score. Logged, never validated; trust policy for
/// low-confidence auto-detected results lives above the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    /// Entered by a human operator
    Manual,
    /// Proposed by the telemetry-matching service
    AutoDetected { confidence: f32 },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::AutoDetected { confidence } => {
                write!(f, "auto-detected (confidence {confidence:.2})")
            }
        }
    }
}

/// Per-map round score within a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScore {
    pub team1_rounds: i64,
    pub team2_rounds: i64,
}

/// A single match record.
///
/// Created by the pairing engine or a bracket builder, mutated exclusively
/// through lifecycle transitions, and unwound only by the revert
/// coordinator. `version` is a monotonic counter guarding every
/// read-modify-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub stage: Stage,
    /// Stage-relative round number (1-indexed)
    pub round: u32,
    /// Advisory scheduling bucket
    pub matchday: u32,
    /// Set for playoff/bracket stages of double-elimination tournaments
    pub bracket_side: Option<BracketSide>,
    /// None means "slot not yet resolved"
    pub team1_id: Option<TeamId>,
    pub team2_id: Option<TeamId>,
    pub team1_score: Option<i64>,
    pub team2_score: Option<i64>,
    /// Per-map round scores for a series; empty for a single-map match
    pub games: Vec<GameScore>,
    pub winner_id: Option<TeamId>,
    pub state: MatchState,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub team1_ready: bool,
    pub team2_ready: bool,
    /// Map veto finished
    pub maps_locked: bool,
    /// Auto-completed walkover; never enters the play lifecycle
    pub is_bye: bool,
    /// State the match held immediately before completion. Lets a revert
    /// restore the exact pre-completion state.
    pub completed_from: Option<MatchState>,
    pub provenance: Option<Provenance>,
    /// Matches whose winners/losers feed this match's slots (0-2)
    pub predecessors: Vec<MatchId>,
    /// Where this match's winner is routed, if anywhere
    pub winner_to: Option<SlotRef>,
    /// Where this match's loser is routed (double-elimination)
    pub loser_to: Option<SlotRef>,
    /// Optimistic concurrency counter
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Create a fresh record in `PendingScheduling`
    #[must_use]
    pub fn new(tournament_id: TournamentId, stage: Stage, round: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            stage,
            round,
            matchday: round,
            bracket_side: None,
            team1_id: None,
            team2_id: None,
            team1_score: None,
            team2_score: None,
            games: Vec::new(),
            winner_id: None,
            state: MatchState::PendingScheduling,
            scheduled_at: None,
            team1_ready: false,
            team2_ready: false,
            maps_locked: false,
            is_bye: false,
            completed_from: None,
            provenance: None,
            predecessors: Vec::new(),
            winner_to: None,
            loser_to: None,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Set both team slots
    #[must_use]
    pub fn with_teams(mut self, team1: TeamId, team2: TeamId) -> Self {
        self.team1_id = Some(team1);
        self.team2_id = Some(team2);
        self
    }

    /// Both team slots resolved
    #[must_use]
    pub fn teams_resolved(&self) -> bool {
        self.team1_id.is_some() && self.team2_id.is_some()
    }

    /// Read a slot
    #[must_use]
    pub fn slot(&self, slot: Slot) -> Option<TeamId> {
        match slot {
            Slot::Team1 => self.team1_id,
            Slot::Team2 => self.team2_id,
        }
    }

    /// Write a slot
    pub fn set_slot(&mut self, slot: Slot, team: Option<TeamId>) {
        match slot {
            Slot::Team1 => self.team1_id = team,
            Slot::Team2 => self.team2_id = team,
        }
    }

    /// The losing side of a completed match. None for byes and for
    /// matches without a recorded winner.
    #[must_use]
    pub fn loser_id(&self) -> Option<TeamId> {
        let winner = self.winner_id?;
        match (self.team1_id, self.team2_id) {
            (Some(t1), Some(t2)) if winner == t1 => Some(t2),
            (Some(t1), Some(t2)) if winner == t2 => Some(t1),
            _ => None,
        }
    }

    /// Bump the concurrency counter. Every mutating operation calls this
    /// exactly once before committing.
    pub fn touch(&mut self) {
        self.version += 1;
    }
}

/// Tournament format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentFormat {
    SingleElimination,
    DoubleElimination {
        /// A loss by the winners-bracket champion in the grand final
        /// triggers one additional decisive match
        bracket_reset: bool,
    },
    SwissSystem,
}

/// Points and score constants for a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointScheme {
    /// Standings points per match win
    pub win_points: i64,
    /// Standings points per match loss
    pub loss_points: i64,
    /// Rounds required to win a map; used to sanity-check reported scores
    pub score_to_win: i64,
    /// Round score credited to a bye recipient
    pub bye_score: i64,
}

impl Default for PointScheme {
    fn default() -> Self {
        Self {
            win_points: 1,
            loss_points: 0,
            score_to_win: 13,
            bye_score: 13,
        }
    }
}

/// Tournament configuration record.
///
/// `current_round` and `current_matchday` are explicit counters mutated
/// only by the pairing and bracket engines, committed together with the
/// matches they create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub format: TournamentFormat,
    /// Planned number of Swiss rounds
    pub rounds: u32,
    pub teams_advance_to_playoffs: usize,
    pub point_scheme: PointScheme,
    pub current_round: u32,
    pub current_matchday: u32,
}

impl TournamentConfig {
    /// A Swiss-system tournament with a playoff cut
    #[must_use]
    pub fn swiss(name: String, rounds: u32, teams_advance_to_playoffs: usize) -> Self {
        Self {
            name,
            format: TournamentFormat::SwissSystem,
            rounds,
            teams_advance_to_playoffs,
            point_scheme: PointScheme::default(),
            current_round: 0,
            current_matchday: 0,
        }
    }

    /// A straight single-elimination tournament
    #[must_use]
    pub fn single_elimination(name: String) -> Self {
        Self {
            name,
            format: TournamentFormat::SingleElimination,
            rounds: 0,
            teams_advance_to_playoffs: 0,
            point_scheme: PointScheme::default(),
            current_round: 0,
            current_matchday: 0,
        }
    }

    /// A double-elimination tournament
    #[must_use]
    pub fn double_elimination(name: String, bracket_reset: bool) -> Self {
        Self {
            name,
            format: TournamentFormat::DoubleElimination { bracket_reset },
            rounds: 0,
            teams_advance_to_playoffs: 0,
            point_scheme: PointScheme::default(),
            current_round: 0,
            current_matchday: 0,
        }
    }
}

/// Team entity. Read-only here; the engine never mutates rosters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub roster: Vec<String>,
}

impl Team {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            roster: Vec::new(),
        }
    }
}

/// One row of a computed Swiss standings table.
///
/// Derived data only: always recomputed from the set of completed
/// Swiss-round matches, never hand-edited or stored as source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub team_id: TeamId,
    pub points: i64,
    pub match_wins: u32,
    pub match_losses: u32,
    pub game_wins: u32,
    pub game_losses: u32,
    pub rounds_won: i64,
    pub rounds_lost: i64,
    /// Sum of the standings points of every opponent faced
    pub buchholz_score: i64,
    /// Opponents in the order played; drives rematch avoidance and Buchholz
    pub opponents_played: Vec<TeamId>,
}

impl StandingEntry {
    /// Zeroed entry for a team with no completed matches
    #[must_use]
    pub fn blank(team_id: TeamId) -> Self {
        Self {
            team_id,
            points: 0,
            match_wins: 0,
            match_losses: 0,
            game_wins: 0,
            game_losses: 0,
            rounds_won: 0,
            rounds_lost: 0,
            buchholz_score: 0,
            opponents_played: Vec::new(),
        }
    }
}
