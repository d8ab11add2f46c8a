//! Spotline Simulation Engine
//!
//! Discrete-time simulator for deadline-bound jobs that choose, tick by
//! tick, between preemptible spot capacity, on-demand capacity and idling,
//! across interchangeable regions.
//!
//! ## Architecture
//!
//! ```text
//! Simulator
//! ├── Clock            fixed-gap ticks, step indices
//! ├── ProgressLedger   append-only work segments
//! ├── OverheadTracker  restart overhead per tick
//! ├── RegionState      current region + spot observations
//! └── Policy           decide(snapshot, state) → (decision, state)
//! ```
//!
//! [`batch::BatchRunner`] fans independent runs out over a thread pool.

pub mod batch;
pub mod clock;
pub mod ledger;
pub mod overhead;
pub mod policies;
pub mod region;
pub mod simulator;
pub mod trace;
pub mod types;

pub use batch::{BatchEntry, BatchError, BatchRunner, BatchSummary, Scenario, summarize};
pub use policies::{
    GreedySpotPolicy, OnDemandOnlyPolicy, PolicyKind, RegionExplorationPolicy, RegionSearch,
    SafeSlackPolicy, SlackState,
};
pub use region::ExplorationEstimator;
pub use simulator::Simulator;
pub use trace::{AvailabilityTrace, TraceGenerator};
pub use types::{IdleOverheadMode, Pricing, ScenarioConfig, SimulationConfig, SimulationStatus};
