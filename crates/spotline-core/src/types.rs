//! Core types shared across Spotline components

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpotlineError};

/// Seconds per hour (job configs are written in hours)
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Relative tolerance for comparing accumulated seconds
pub const RELATIVE_TOLERANCE: f64 = 1e-9;

/// Absolute tolerance for durations of magnitude `scale`
///
/// `hours * 3600` and per-tick sums are not exact in `f64`; differences
/// below this are rounding, not time.
pub fn tolerance_seconds(scale: f64) -> f64 {
    RELATIVE_TOLERANCE * scale.abs().max(1.0)
}

/// Resource a tick runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    /// Discounted, preemptible capacity
    Spot,
    /// Full-price, always-available capacity
    OnDemand,
    /// Idle: nothing is held
    None,
}

impl ClusterType {
    /// Whether this tick holds any compute
    pub fn is_active(self) -> bool {
        !matches!(self, ClusterType::None)
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterType::Spot => write!(f, "spot"),
            ClusterType::OnDemand => write!(f, "on-demand"),
            ClusterType::None => write!(f, "none"),
        }
    }
}

/// Job parameters as written in a scenario file (hours)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub deadline_hours: f64,
    pub duration_hours: f64,
    pub overhead_hours: f64,
}

/// Immutable job parameters for one run, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub total_work_seconds: f64,
    pub deadline_seconds: f64,
    pub restart_overhead_seconds: f64,
}

impl Job {
    /// Create a job, rejecting negative or non-finite values
    ///
    /// A deadline shorter than the work is accepted: such a job simply runs
    /// to a missed deadline.
    pub fn new(
        total_work_seconds: f64,
        deadline_seconds: f64,
        restart_overhead_seconds: f64,
    ) -> Result<Self> {
        for (field, value) in [
            ("total_work_seconds", total_work_seconds),
            ("deadline_seconds", deadline_seconds),
            ("restart_overhead_seconds", restart_overhead_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SpotlineError::config(format!(
                    "{field} must be finite and non-negative, got {value}"
                )));
            }
        }

        Ok(Job {
            total_work_seconds,
            deadline_seconds,
            restart_overhead_seconds,
        })
    }

    /// Convert an hour-based config into seconds
    pub fn from_config(config: &JobConfig) -> Result<Self> {
        Job::new(
            config.duration_hours * SECONDS_PER_HOUR,
            config.deadline_hours * SECONDS_PER_HOUR,
            config.overhead_hours * SECONDS_PER_HOUR,
        )
    }

    /// Deadline leaves room for the work itself
    pub fn is_feasible(&self) -> bool {
        self.deadline_seconds >= self.total_work_seconds
    }

    /// Deadline leaves room for the work plus one full restart
    pub fn tolerates_restart(&self) -> bool {
        self.deadline_seconds >= self.total_work_seconds + self.restart_overhead_seconds
    }
}

impl TryFrom<JobConfig> for Job {
    type Error = SpotlineError;

    fn try_from(config: JobConfig) -> Result<Self> {
        Job::from_config(&config)
    }
}

/// What a policy wants for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ClusterType,
    /// Region to move to before the tick runs
    pub switch_region: Option<usize>,
}

impl Decision {
    pub fn spot() -> Self {
        Self::new(ClusterType::Spot)
    }

    pub fn on_demand() -> Self {
        Self::new(ClusterType::OnDemand)
    }

    pub fn idle() -> Self {
        Self::new(ClusterType::None)
    }

    pub fn new(action: ClusterType) -> Self {
        Decision {
            action,
            switch_region: None,
        }
    }

    /// Also request a region switch
    pub fn with_switch(mut self, region: usize) -> Self {
        self.switch_region = Some(region);
        self
    }
}

/// Spot observations gathered for one region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    pub observed_ticks: u64,
    pub observed_spot_ticks: u64,
}

impl RegionStats {
    pub fn record(&mut self, has_spot: bool) {
        self.observed_ticks += 1;
        if has_spot {
            self.observed_spot_ticks += 1;
        }
    }

    /// Beta-smoothed spot success rate: `(spot + α) / (ticks + α + β)`
    pub fn smoothed_success_rate(&self, alpha: f64, beta: f64) -> f64 {
        (self.observed_spot_ticks as f64 + alpha) / (self.observed_ticks as f64 + alpha + beta)
    }
}

/// Read-only state handed to a policy for one tick
///
/// Contains nothing beyond the current tick: spot availability is reported
/// only for the current region at the current step.
#[derive(Debug, Clone, Copy)]
pub struct TickSnapshot<'a> {
    pub tick: u64,
    pub elapsed_seconds: f64,
    pub gap_seconds: f64,
    pub deadline_seconds: f64,
    pub total_work_seconds: f64,
    pub restart_overhead_seconds: f64,
    pub work_done_segments: &'a [f64],
    pub work_done_seconds: f64,
    pub remaining_restart_overhead_seconds: f64,
    pub current_region: usize,
    pub num_regions: usize,
    pub last_cluster_type: ClusterType,
    pub has_spot: bool,
    pub region_stats: &'a [RegionStats],
}

impl TickSnapshot<'_> {
    pub fn remaining_work_seconds(&self) -> f64 {
        (self.total_work_seconds - self.work_done_seconds).max(0.0)
    }

    pub fn time_left_seconds(&self) -> f64 {
        self.deadline_seconds - self.elapsed_seconds
    }

    /// Rounding allowance for comparisons against this run's time scale
    pub fn tolerance_seconds(&self) -> f64 {
        tolerance_seconds(self.deadline_seconds.max(self.total_work_seconds))
    }
}

/// Why a tick ran as `None` instead of the requested action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// Spot was requested where none was available (preemption / rejection)
    SpotUnavailable,
    /// Policy asked for a region that does not exist
    RegionOutOfRange(usize),
}

/// One simulated tick, as realized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    /// Clock value at the start of the tick
    pub elapsed_seconds: f64,
    /// Region the tick ran in (after any switch)
    pub region: usize,
    pub has_spot: bool,
    pub requested: ClusterType,
    pub realized: ClusterType,
    pub switched_region: bool,
    pub overhead_paid_seconds: f64,
    pub work_seconds: f64,
    /// Overhead still pending at the end of the tick
    pub remaining_overhead_seconds: f64,
    pub degradation: Option<Degradation>,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// All work finished
    Completed,
    /// Deadline reached with work outstanding
    DeadlineMissed,
    /// Stopped by the tick cap before either of the above
    Cancelled,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::DeadlineMissed => write!(f, "deadline-missed"),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub policy_name: String,
    pub outcome: Outcome,
    /// Completion instant for completed runs, clock value at halt otherwise
    pub total_elapsed_seconds: f64,
    pub spot_seconds: f64,
    pub on_demand_seconds: f64,
    pub cost: f64,
    pub ticks: u64,
    pub region_switches: u64,
    pub preemptions: u64,
    pub contract_violations: u64,
    pub work_done_seconds: f64,
    pub work_done_segments: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<TickRecord>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    pub fn total_elapsed_hours(&self) -> f64 {
        self.total_elapsed_seconds / SECONDS_PER_HOUR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_from_hours() {
        let config = JobConfig {
            deadline_hours: 20.0,
            duration_hours: 10.0,
            overhead_hours: 0.5,
        };
        let job = Job::try_from(config).unwrap();

        assert_eq!(job.total_work_seconds, 36000.0);
        assert_eq!(job.deadline_seconds, 72000.0);
        assert_eq!(job.restart_overhead_seconds, 1800.0);
        assert!(job.is_feasible());
        assert!(job.tolerates_restart());
    }

    #[test]
    fn test_fractional_hours_are_not_exact() {
        let job = Job::from_config(&JobConfig {
            deadline_hours: 1.35,
            duration_hours: 1.1,
            overhead_hours: 0.15,
        })
        .unwrap();

        // 1.1 h lands just above 3960 s, well inside the tolerance
        assert!(job.total_work_seconds > 3960.0);
        assert!(job.total_work_seconds - 3960.0 < tolerance_seconds(job.total_work_seconds));
        assert!(job.tolerates_restart());
    }

    #[test]
    fn test_tolerance_scales_with_magnitude() {
        assert_eq!(tolerance_seconds(0.0), RELATIVE_TOLERANCE);
        assert_eq!(tolerance_seconds(0.5), RELATIVE_TOLERANCE);
        assert_eq!(tolerance_seconds(72000.0), 72000.0 * RELATIVE_TOLERANCE);
    }

    #[test]
    fn test_job_rejects_negative_and_nan() {
        assert!(Job::new(-1.0, 10.0, 0.0).is_err());
        assert!(Job::new(1.0, f64::NAN, 0.0).is_err());
        assert!(Job::new(1.0, 10.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_infeasible_job_is_accepted() {
        let job = Job::new(36000.0, 36000.0, 1800.0).unwrap();
        assert!(job.is_feasible());
        assert!(!job.tolerates_restart());

        let job = Job::new(36000.0, 1000.0, 0.0).unwrap();
        assert!(!job.is_feasible());
    }

    #[test]
    fn test_smoothed_success_rate() {
        let mut stats = RegionStats::default();
        assert_eq!(stats.smoothed_success_rate(1.0, 1.0), 0.5);

        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.observed_ticks, 3);
        assert_eq!(stats.observed_spot_ticks, 2);
        assert!((stats.smoothed_success_rate(1.0, 1.0) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_decision_builders() {
        let decision = Decision::spot().with_switch(2);
        assert_eq!(decision.action, ClusterType::Spot);
        assert_eq!(decision.switch_region, Some(2));
        assert_eq!(Decision::idle().switch_region, None);
        assert!(!Decision::idle().action.is_active());
    }
}
