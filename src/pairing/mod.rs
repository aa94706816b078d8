//! Swiss-system pairing.
//!
//! Produces the next round's matches from the current standings and the
//! rematch history: teams are grouped into score brackets and paired
//! top-to-bottom, floating a team down to the adjacent bracket when a
//! bracket cannot be paired without a rematch. Odd fields hand a bye to
//! the lowest-ranked team that has not yet received one.

pub mod engine;

pub use engine::PairingEngine;
