//! Elimination brackets.
//!
//! Brackets are materialized up front: one match record per slot per
//! round, wired together by `winner_to`/`loser_to` slot pointers so the
//! whole tree is a flat arena of records. [`engine::BracketEngine`] builds
//! single- and double-elimination trees (plus the playoff bracket seeded
//! from Swiss standings) and routes winners and losers forward as matches
//! complete.

pub mod engine;
pub mod seeding;

pub use engine::BracketEngine;
pub use seeding::{bracket_size, seeding_order};
