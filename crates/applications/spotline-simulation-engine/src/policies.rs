//! Scheduling policies
//!
//! Implements the reference strategies to compare:
//! - SafeSlack: spot while slack allows, then on-demand for good; never misses
//!   a deadline that leaves room for one restart
//! - RegionExploration: SafeSlack's deadline guard, plus moving to the region
//!   with the best observed spot record when the local one has none
//! - GreedySpot: spot whenever possible, no deadline awareness (baseline)
//! - OnDemandOnly: on-demand from the first tick (baseline)

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spotline_core::{ClusterType, Decision, Job, Policy, SpotlineError, TickSnapshot};
use tracing::debug;

use crate::region::ExplorationEstimator;

/// Worst-case seconds to finish from now using only on-demand
///
/// If the last tick already ran on-demand, only the overhead still pending
/// remains to be paid; otherwise moving to on-demand costs a full restart.
pub fn on_demand_needed_seconds(snapshot: &TickSnapshot<'_>) -> f64 {
    let overhead = if snapshot.last_cluster_type == ClusterType::OnDemand {
        snapshot.remaining_restart_overhead_seconds
    } else {
        snapshot.restart_overhead_seconds
    };
    snapshot.remaining_work_seconds() + overhead
}

/// Whether one more non-guaranteed tick could make on-demand completion
/// infeasible
///
/// Ties within rounding tolerance count as exhausted: committing a tick early
/// costs money, committing a tick late can cost the deadline.
pub fn slack_exhausted(snapshot: &TickSnapshot<'_>) -> bool {
    snapshot.time_left_seconds() - snapshot.gap_seconds
        < on_demand_needed_seconds(snapshot) + snapshot.tolerance_seconds()
}

/// Carried state of the slack-guarded policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackState {
    /// Once set, every remaining tick runs on-demand
    pub committed_to_on_demand: bool,
}

impl SlackState {
    /// Latch the on-demand commitment if slack has run out
    fn advance(self, snapshot: &TickSnapshot<'_>) -> Self {
        if self.committed_to_on_demand {
            return self;
        }
        if slack_exhausted(snapshot) {
            debug!(
                tick = snapshot.tick,
                time_left = snapshot.time_left_seconds(),
                needed = on_demand_needed_seconds(snapshot),
                "Slack exhausted, committing to on-demand"
            );
            return SlackState {
                committed_to_on_demand: true,
            };
        }
        self
    }
}

/// What SafeSlack does when the local region has no spot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSearch {
    /// Idle in place
    #[default]
    Stay,
    /// Move to the next region (by index) and try spot there
    RoundRobin,
}

/// Deadline-guaranteed, cost-best-effort policy
#[derive(Debug, Clone, Default)]
pub struct SafeSlackPolicy {
    search: RegionSearch,
}

impl SafeSlackPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(search: RegionSearch) -> Self {
        Self { search }
    }
}

impl Policy for SafeSlackPolicy {
    type State = SlackState;

    fn name(&self) -> &str {
        match self.search {
            RegionSearch::Stay => "SafeSlack",
            RegionSearch::RoundRobin => "SafeSlackRoundRobin",
        }
    }

    fn initial_state(&self, _job: &Job, _num_regions: usize) -> SlackState {
        SlackState::default()
    }

    fn decide(&self, snapshot: &TickSnapshot<'_>, state: &SlackState) -> (Decision, SlackState) {
        let next = state.advance(snapshot);

        let decision = if next.committed_to_on_demand {
            Decision::on_demand()
        } else if snapshot.has_spot {
            Decision::spot()
        } else {
            match self.search {
                RegionSearch::RoundRobin if snapshot.num_regions > 1 => {
                    let target = (snapshot.current_region + 1) % snapshot.num_regions;
                    Decision::spot().with_switch(target)
                }
                _ => Decision::idle(),
            }
        };

        (decision, next)
    }
}

/// SafeSlack with statistics-driven region selection
#[derive(Debug, Clone, Default)]
pub struct RegionExplorationPolicy {
    estimator: ExplorationEstimator,
}

impl RegionExplorationPolicy {
    /// α = β = 1
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimator(estimator: ExplorationEstimator) -> Self {
        Self { estimator }
    }
}

impl Policy for RegionExplorationPolicy {
    type State = SlackState;

    fn name(&self) -> &str {
        "RegionExploration"
    }

    fn initial_state(&self, _job: &Job, _num_regions: usize) -> SlackState {
        SlackState::default()
    }

    fn decide(&self, snapshot: &TickSnapshot<'_>, state: &SlackState) -> (Decision, SlackState) {
        let next = state.advance(snapshot);

        if next.committed_to_on_demand {
            return (Decision::on_demand(), next);
        }
        if snapshot.has_spot {
            return (Decision::spot(), next);
        }

        let best = self
            .estimator
            .best_region(snapshot.region_stats, snapshot.current_region);
        let decision = if best != snapshot.current_region {
            Decision::spot().with_switch(best)
        } else {
            Decision::idle()
        };

        (decision, next)
    }
}

/// Greedy policy: always chase spot (cheapest option)
#[derive(Debug, Clone)]
pub struct GreedySpotPolicy {
    /// Idle instead of requesting spot when none is observed
    check_availability: bool,
}

impl GreedySpotPolicy {
    /// Spot when available, idle otherwise
    pub fn new() -> Self {
        Self {
            check_availability: true,
        }
    }

    /// Request spot every tick, available or not
    pub fn always_request() -> Self {
        Self {
            check_availability: false,
        }
    }
}

impl Default for GreedySpotPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for GreedySpotPolicy {
    type State = ();

    fn name(&self) -> &str {
        "GreedySpot"
    }

    fn initial_state(&self, _job: &Job, _num_regions: usize) {}

    fn decide(&self, snapshot: &TickSnapshot<'_>, _state: &()) -> (Decision, ()) {
        if snapshot.has_spot || !self.check_availability {
            (Decision::spot(), ())
        } else {
            (Decision::idle(), ())
        }
    }
}

/// Baseline policy: only use on-demand (no spot)
#[derive(Debug, Clone, Default)]
pub struct OnDemandOnlyPolicy;

impl OnDemandOnlyPolicy {
    pub fn new() -> Self {
        OnDemandOnlyPolicy
    }
}

impl Policy for OnDemandOnlyPolicy {
    type State = ();

    fn name(&self) -> &str {
        "OnDemandOnly"
    }

    fn initial_state(&self, _job: &Job, _num_regions: usize) {}

    fn decide(&self, _snapshot: &TickSnapshot<'_>, _state: &()) -> (Decision, ()) {
        (Decision::on_demand(), ())
    }
}

/// Built-in policies, selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    SafeSlack,
    SafeSlackRoundRobin,
    RegionExploration,
    GreedySpot,
    OnDemandOnly,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 5] = [
        PolicyKind::SafeSlack,
        PolicyKind::SafeSlackRoundRobin,
        PolicyKind::RegionExploration,
        PolicyKind::GreedySpot,
        PolicyKind::OnDemandOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::SafeSlack => "safe-slack",
            PolicyKind::SafeSlackRoundRobin => "safe-slack-rr",
            PolicyKind::RegionExploration => "region-exploration",
            PolicyKind::GreedySpot => "greedy-spot",
            PolicyKind::OnDemandOnly => "on-demand-only",
        }
    }

    /// Whether the policy guarantees the deadline when it leaves room for
    /// one restart
    pub fn is_deadline_safe(self) -> bool {
        matches!(
            self,
            PolicyKind::SafeSlack | PolicyKind::SafeSlackRoundRobin | PolicyKind::RegionExploration
        )
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = SpotlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "safe-slack" | "safe" => Ok(PolicyKind::SafeSlack),
            "safe-slack-rr" | "round-robin" => Ok(PolicyKind::SafeSlackRoundRobin),
            "region-exploration" | "explore" => Ok(PolicyKind::RegionExploration),
            "greedy-spot" | "greedy" => Ok(PolicyKind::GreedySpot),
            "on-demand-only" | "ondemand" => Ok(PolicyKind::OnDemandOnly),
            other => Err(SpotlineError::config(format!("Unknown policy: {other}"))),
        }
    }
}
