//! Configuration and status types for the simulation engine

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spotline_core::{JobConfig, Outcome, Result, SpotlineError};

/// Default tick length (1 hour)
pub const DEFAULT_GAP_SECONDS: f64 = 3600.0;

/// What pending restart overhead does during an idle tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleOverheadMode {
    /// Pending overhead keeps draining while idle
    #[default]
    Drain,
    /// Pending overhead is held until compute is used again
    Freeze,
}

/// Hourly prices used for the cost breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub spot_per_hour: f64,
    pub on_demand_per_hour: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            spot_per_hour: 0.30,
            on_demand_per_hour: 1.00,
        }
    }
}

impl Pricing {
    /// Cost of the given billed seconds
    pub fn cost(&self, spot_seconds: f64, on_demand_seconds: f64) -> f64 {
        (spot_seconds * self.spot_per_hour + on_demand_seconds * self.on_demand_per_hour) / 3600.0
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tick length
    pub gap_seconds: f64,

    /// Idle-tick overhead behaviour
    pub idle_overhead: IdleOverheadMode,

    /// Prices for the cost breakdown
    pub pricing: Pricing,

    /// Region the run starts in
    pub initial_region: usize,

    /// Hard cap on ticks (operational stop for pathological runs)
    pub max_ticks: Option<u64>,

    /// Keep a per-tick record in the result
    pub record_history: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gap_seconds: DEFAULT_GAP_SECONDS,
            idle_overhead: IdleOverheadMode::Drain,
            pricing: Pricing::default(),
            initial_region: 0,
            max_ticks: None,
            record_history: true,
        }
    }
}

impl SimulationConfig {
    /// Set tick length
    pub fn with_gap_seconds(mut self, gap_seconds: f64) -> Self {
        self.gap_seconds = gap_seconds;
        self
    }

    /// Set idle overhead behaviour
    pub fn with_idle_overhead(mut self, mode: IdleOverheadMode) -> Self {
        self.idle_overhead = mode;
        self
    }

    /// Set prices
    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Set starting region
    pub fn with_initial_region(mut self, region: usize) -> Self {
        self.initial_region = region;
        self
    }

    /// Cap the number of ticks
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Enable or disable per-tick history
    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    /// Reject values that would change scoring semantics
    pub fn validate(&self) -> Result<()> {
        if !self.gap_seconds.is_finite() || self.gap_seconds <= 0.0 {
            return Err(SpotlineError::InvalidGap(self.gap_seconds));
        }
        let prices = [self.pricing.spot_per_hour, self.pricing.on_demand_per_hour];
        if prices.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(SpotlineError::config(format!(
                "prices must be finite and non-negative, got {:?}",
                self.pricing
            )));
        }
        Ok(())
    }
}

/// Where a simulation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    Running,
    Finished(Outcome),
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Finished(_))
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            SimulationStatus::Running => None,
            SimulationStatus::Finished(outcome) => Some(outcome),
        }
    }
}

/// Scenario file consumed by the CLI
///
/// ```json
/// {
///   "job": { "deadline_hours": 20, "duration_hours": 10, "overhead_hours": 0.5 },
///   "gap_seconds": 3600,
///   "traces": ["us-east-1a.json", "us-west-2b.txt"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub job: JobConfig,
    #[serde(default)]
    pub gap_seconds: Option<f64>,
    /// Trace paths, relative to the scenario file
    #[serde(default)]
    pub traces: Vec<PathBuf>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
}

impl ScenarioConfig {
    /// Load a scenario file, resolving trace paths against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: ScenarioConfig = serde_json::from_str(&contents)?;

        if let Some(base) = path.parent() {
            config.traces = config
                .traces
                .into_iter()
                .map(|trace| if trace.is_relative() { base.join(trace) } else { trace })
                .collect();
        }

        Ok(config)
    }
}
