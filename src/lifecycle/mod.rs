//! Match lifecycle module.
//!
//! A match moves through
//! `pending_scheduling -> scheduled -> ready_up -> map_banning -> playing
//! -> completed`. [`machine`] holds the pure transition table and result
//! validation; [`MatchLifecycle`] applies transitions against the store
//! and is the only writer of match outcome fields.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_engine::lifecycle::MatchLifecycle;
//! use tourney_engine::models::Provenance;
//! use tourney_engine::store::MemoryStore;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let lifecycle = MatchLifecycle::new(store);
//!
//!     let match_id = Uuid::new_v4();
//!     let winner = Uuid::new_v4();
//!     lifecycle
//!         .complete_match(match_id, 13, 7, winner, Provenance::Manual, 4)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod machine;
pub mod manager;

pub use machine::{ensure_transition, validate_result};
pub use manager::MatchLifecycle;
