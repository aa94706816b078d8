//! # Tourney Engine
//!
//! A tournament progression engine: match lifecycle, Swiss standings and
//! pairing, elimination brackets, and reversible result recording.
//!
//! The engine is the single authority over match state. Matches move
//! through an explicit lifecycle (`pending_scheduling` through
//! `completed`), standings are always recomputed from completed results
//! rather than stored, brackets are materialized up front as records wired
//! together by slot pointers, and every completion can be unwound exactly.
//!
//! ## Core Modules
//!
//! - [`models`]: match records, tournament configuration, standings rows
//! - [`lifecycle`]: the match state machine and result recording
//! - [`standings`]: Swiss standings with the full tiebreak cascade
//! - [`pairing`]: Swiss round generation with rematch avoidance and byes
//! - [`bracket`]: single/double-elimination construction and advancement
//! - [`revert`]: reversal of completed results, cascading where needed
//! - [`store`]: persistence behind the [`store::MatchStore`] trait
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney_engine::{
//!     MatchLifecycle, PairingEngine,
//!     models::{Team, TournamentConfig},
//!     store::MemoryStore,
//! };
//!
//! # async fn run() -> tourney_engine::EngineResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let tournament = uuid::Uuid::new_v4();
//! let teams: Vec<Team> = (0..8).map(|i| Team::new(format!("Team {i}"))).collect();
//! store.add_tournament(tournament, TournamentConfig::swiss("Open".into(), 5, 4), teams);
//!
//! let pairing = PairingEngine::new(store.clone());
//! let round = pairing.generate_next_round(tournament).await?;
//! println!("{} matches paired", round.len());
//! # Ok(())
//! # }
//! ```

/// Error types shared across the engine.
pub mod errors;
pub use errors::{EngineError, EngineResult};

/// Core data models.
pub mod models;

/// Persistence layer.
pub mod store;

/// Match state machine and result recording.
pub mod lifecycle;
pub use lifecycle::MatchLifecycle;

/// Swiss standings computation.
pub mod standings;
pub use standings::StandingsCalculator;

/// Swiss round pairing.
pub mod pairing;
pub use pairing::PairingEngine;

/// Elimination bracket construction and advancement.
pub mod bracket;
pub use bracket::BracketEngine;

/// Reversal of recorded results.
pub mod revert;
pub use revert::RevertCoordinator;
