//! Reversal of recorded results.
//!
//! Completions are undone by restoring the exact pre-completion state a
//! record carried (`completed_from`) and unwinding any advancement the
//! result caused: successor slots are cleared, reverted successors fall
//! back to `pending_scheduling`, and a grand-final reset match spawned by
//! the reverted result is deleted. All writes of one revert land in a
//! single batch, so a failed revert changes nothing.

pub mod coordinator;

pub use coordinator::RevertCoordinator;
