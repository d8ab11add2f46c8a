//! Core traits for Spotline
//!
//! The Policy trait is the only seam between the simulator and the strategy
//! under evaluation. The simulator works through this interface ONLY.

use crate::types::{Decision, Job, TickSnapshot};

/// A pluggable scheduling strategy
///
/// Policies are pure: all state that must survive between ticks lives in
/// [`Policy::State`], which the simulator owns and threads back in on the
/// next call. Replaying the same snapshots against the same state yields the
/// same decisions.
pub trait Policy {
    /// Per-run memory carried between ticks
    type State: Clone + std::fmt::Debug;

    /// Policy name (used in reports)
    fn name(&self) -> &str;

    /// State at the start of a run
    fn initial_state(&self, job: &Job, num_regions: usize) -> Self::State;

    /// Decide the action for the current tick and return the next state
    fn decide(&self, snapshot: &TickSnapshot<'_>, state: &Self::State) -> (Decision, Self::State);
}
