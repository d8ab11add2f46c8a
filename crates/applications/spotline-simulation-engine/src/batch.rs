//! Parallel batch evaluation
//!
//! A benchmark evaluates many independent (scenario, policy) runs. Each run
//! owns its own simulator and policy state, so the cross product is
//! embarrassingly parallel and is spread over a rayon pool. Results come
//! back in input order regardless of scheduling.
//!
//! A panicking policy only loses its own run: every run is isolated with
//! `catch_unwind` and reported as [`BatchError::PolicyPanicked`].

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use spotline_core::{Job, Outcome, Result, RunResult, SpotlineError};
use thiserror::Error;
use tracing::{info, warn};

use crate::policies::{
    GreedySpotPolicy, OnDemandOnlyPolicy, PolicyKind, RegionExplorationPolicy, RegionSearch,
    SafeSlackPolicy,
};
use crate::simulator::Simulator;
use crate::trace::AvailabilityTrace;
use crate::types::SimulationConfig;

/// Why a single run in a batch produced no result
#[derive(Error, Debug)]
pub enum BatchError {
    /// Scenario rejected at construction
    #[error(transparent)]
    Setup(#[from] SpotlineError),

    /// Policy panicked mid-run
    #[error("Policy {policy} panicked: {message}")]
    PolicyPanicked { policy: String, message: String },
}

/// One (job, region set, config) to evaluate
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub job: Job,
    pub traces: Arc<[AvailabilityTrace]>,
    pub config: SimulationConfig,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        job: Job,
        traces: impl Into<Arc<[AvailabilityTrace]>>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            name: name.into(),
            job,
            traces: traces.into(),
            config,
        }
    }
}

/// Outcome of one run in a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub scenario: String,
    pub policy: PolicyKind,
    pub result: std::result::Result<RunResult, BatchError>,
}

impl PolicyKind {
    /// Run this policy on a scenario to completion
    pub fn simulate(self, scenario: &Scenario) -> Result<RunResult> {
        let job = scenario.job;
        let traces = Arc::clone(&scenario.traces);
        let config = scenario.config.clone();

        let result = match self {
            PolicyKind::SafeSlack => Simulator::new(job, traces, SafeSlackPolicy::new(), config)?.run(),
            PolicyKind::SafeSlackRoundRobin => Simulator::new(
                job,
                traces,
                SafeSlackPolicy::with_search(RegionSearch::RoundRobin),
                config,
            )?
            .run(),
            PolicyKind::RegionExploration => {
                Simulator::new(job, traces, RegionExplorationPolicy::new(), config)?.run()
            }
            PolicyKind::GreedySpot => Simulator::new(job, traces, GreedySpotPolicy::new(), config)?.run(),
            PolicyKind::OnDemandOnly => {
                Simulator::new(job, traces, OnDemandOnlyPolicy::new(), config)?.run()
            }
        };

        Ok(result)
    }
}

/// Run `f`, turning a panic into [`BatchError::PolicyPanicked`]
pub fn run_isolated<F>(policy: &str, f: F) -> std::result::Result<RunResult, BatchError>
where
    F: FnOnce() -> Result<RunResult>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(BatchError::from),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(policy, %message, "Policy panicked; run discarded");
            Err(BatchError::PolicyPanicked {
                policy: policy.to_string(),
                message,
            })
        }
    }
}

/// Evaluates scenarios × policies in parallel
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    /// Maximum number of threads (0 = rayon default)
    max_threads: usize,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(max_threads: usize) -> Self {
        Self { max_threads }
    }

    /// Evaluate every policy on every scenario
    pub fn run(&self, scenarios: &[Scenario], policies: &[PolicyKind]) -> Result<Vec<BatchEntry>> {
        let jobs: Vec<(&Scenario, PolicyKind)> = scenarios
            .iter()
            .flat_map(|scenario| policies.iter().map(move |&policy| (scenario, policy)))
            .collect();

        info!(
            scenarios = scenarios.len(),
            policies = policies.len(),
            runs = jobs.len(),
            "Starting batch evaluation"
        );

        let evaluate = || -> Vec<BatchEntry> {
            jobs.par_iter()
                .map(|(scenario, policy)| BatchEntry {
                    scenario: scenario.name.clone(),
                    policy: *policy,
                    result: run_isolated(policy.as_str(), || policy.simulate(scenario)),
                })
                .collect()
        };

        let entries = if self.max_threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.max_threads)
                .build()
                .map_err(|e| SpotlineError::config(format!("thread pool: {e}")))?
                .install(evaluate)
        } else {
            evaluate()
        };

        let failed = entries.iter().filter(|e| e.result.is_err()).count();
        info!(runs = entries.len(), failed, "Batch evaluation complete");
        Ok(entries)
    }
}

/// Aggregate view of one policy across a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub policy: PolicyKind,
    pub runs: usize,
    pub completed: usize,
    pub deadline_missed: usize,
    pub errors: usize,
    /// Mean cost over runs that produced a result
    pub mean_cost: f64,
    /// Mean elapsed hours over completed runs
    pub mean_elapsed_hours: f64,
}

/// Summarize batch entries per policy, in first-seen order
pub fn summarize(entries: &[BatchEntry]) -> Vec<BatchSummary> {
    let mut order = Vec::new();
    let mut groups: BTreeMap<usize, Vec<&BatchEntry>> = BTreeMap::new();

    for entry in entries {
        let slot = match order.iter().position(|&p| p == entry.policy) {
            Some(slot) => slot,
            None => {
                order.push(entry.policy);
                order.len() - 1
            }
        };
        groups.entry(slot).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(slot, group)| {
            let results: Vec<&RunResult> = group.iter().filter_map(|e| e.result.as_ref().ok()).collect();
            let completed: Vec<&&RunResult> = results.iter().filter(|r| r.is_completed()).collect();

            let mean = |values: Vec<f64>| {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            };

            BatchSummary {
                policy: order[slot],
                runs: group.len(),
                completed: completed.len(),
                deadline_missed: results
                    .iter()
                    .filter(|r| r.outcome == Outcome::DeadlineMissed)
                    .count(),
                errors: group.len() - results.len(),
                mean_cost: mean(results.iter().map(|r| r.cost).collect()),
                mean_elapsed_hours: mean(completed.iter().map(|r| r.total_elapsed_hours()).collect()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: f64 = 3600.0;

    fn scenario(name: &str, trace: Vec<bool>) -> Scenario {
        Scenario::new(
            name,
            Job::new(4.0 * HOUR, 8.0 * HOUR, 0.5 * HOUR).unwrap(),
            vec![AvailabilityTrace::new(name, trace)],
            SimulationConfig::default().with_history(false),
        )
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let scenarios = vec![scenario("a", vec![true; 10]), scenario("b", vec![false; 10])];
        let policies = [PolicyKind::SafeSlack, PolicyKind::OnDemandOnly];

        let entries = BatchRunner::with_threads(2).run(&scenarios, &policies).unwrap();

        let order: Vec<(&str, PolicyKind)> =
            entries.iter().map(|e| (e.scenario.as_str(), e.policy)).collect();
        assert_eq!(
            order,
            vec![
                ("a", PolicyKind::SafeSlack),
                ("a", PolicyKind::OnDemandOnly),
                ("b", PolicyKind::SafeSlack),
                ("b", PolicyKind::OnDemandOnly),
            ]
        );
        assert!(entries.iter().all(|e| e.result.as_ref().unwrap().is_completed()));
    }

    #[test]
    fn test_batch_matches_sequential_run() {
        let scenarios = vec![scenario("a", vec![true, false, true, true, false, true])];
        let entries = BatchRunner::new().run(&scenarios, &PolicyKind::ALL).unwrap();

        for entry in &entries {
            let direct = entry.policy.simulate(&scenarios[0]).unwrap();
            let batched = entry.result.as_ref().unwrap();
            assert_eq!(batched.work_done_segments, direct.work_done_segments);
            assert_eq!(batched.outcome, direct.outcome);
        }
    }

    #[test]
    fn test_setup_errors_are_per_run() {
        let mut bad = scenario("bad", vec![true; 4]);
        bad.config.gap_seconds = 0.0;
        let scenarios = vec![bad, scenario("good", vec![true; 10])];

        let entries = BatchRunner::new().run(&scenarios, &[PolicyKind::SafeSlack]).unwrap();
        assert!(matches!(entries[0].result, Err(BatchError::Setup(SpotlineError::InvalidGap(_)))));
        assert!(entries[1].result.is_ok());
    }

    #[test]
    fn test_panicking_run_is_isolated() {
        let result = run_isolated("broken", || panic!("policy bug"));
        match result {
            Err(BatchError::PolicyPanicked { policy, message }) => {
                assert_eq!(policy, "broken");
                assert_eq!(message, "policy bug");
            }
            other => panic!("expected panic isolation, got {other:?}"),
        }
    }

    #[test]
    fn test_summarize() {
        let scenarios = vec![scenario("a", vec![true; 10]), scenario("b", vec![false; 10])];
        let policies = [PolicyKind::GreedySpot, PolicyKind::OnDemandOnly];
        let entries = BatchRunner::new().run(&scenarios, &policies).unwrap();

        let summary = summarize(&entries);
        assert_eq!(summary.len(), 2);

        let greedy = &summary[0];
        assert_eq!(greedy.policy, PolicyKind::GreedySpot);
        assert_eq!(greedy.runs, 2);
        assert_eq!(greedy.completed, 1);
        assert_eq!(greedy.deadline_missed, 1);

        let on_demand = &summary[1];
        assert_eq!(on_demand.completed, 2);
        assert_eq!(on_demand.errors, 0);
        assert!((on_demand.mean_elapsed_hours - 4.5).abs() < 1e-9);
        assert!((on_demand.mean_cost - 4.5).abs() < 1e-9);
    }
}
