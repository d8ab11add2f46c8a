//! Discrete-time simulator for deadline-bound spot/on-demand scheduling
//!
//! Drives one job through fixed-length ticks across a set of regions, asking
//! a [`Policy`] what to run each tick and accounting for progress, restart
//! overhead, region switches and spot availability.
//!
//! ```text
//! each tick:
//!   work done?        → COMPLETED
//!   deadline reached? → DEADLINE_MISSED
//!   observe spot in current region
//!   policy.decide(snapshot, state) → (action, switch?)
//!   apply switch (re-arms full overhead)
//!   spot requested but unavailable → runs as NONE
//!   pay overhead, append work, advance clock
//! ```
//!
//! Policies are untrusted: an out-of-range region request or a spot request
//! without capacity degrades that tick to idle instead of failing the run.

use std::sync::Arc;

use spotline_core::{
    ClusterType, Degradation, Job, Outcome, Policy, Result, RunResult, SpotlineError, TickRecord,
    TickSnapshot,
};
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::ledger::ProgressLedger;
use crate::overhead::OverheadTracker;
use crate::region::{RegionState, RegionSwitch};
use crate::trace::AvailabilityTrace;
use crate::types::{SimulationConfig, SimulationStatus};

/// Single-run simulator
pub struct Simulator<P: Policy> {
    job: Job,
    config: SimulationConfig,
    traces: Arc<[AvailabilityTrace]>,

    clock: Clock,
    ledger: ProgressLedger,
    overhead: OverheadTracker,
    regions: RegionState,

    policy: P,
    policy_state: P::State,
    last_cluster_type: ClusterType,
    status: SimulationStatus,

    // Metrics
    spot_seconds: f64,
    on_demand_seconds: f64,
    preemptions: u64,
    contract_violations: u64,
    completed_at: Option<f64>,
    history: Vec<TickRecord>,
}

impl<P: Policy> Simulator<P> {
    /// Create a simulator for one (job, regions, policy) triple
    ///
    /// Fails fast on an invalid config, an empty region set, a bad initial
    /// region or a trace recorded at a different tick length.
    pub fn new(
        job: Job,
        traces: impl Into<Arc<[AvailabilityTrace]>>,
        policy: P,
        config: SimulationConfig,
    ) -> Result<Self> {
        config.validate()?;
        // Re-validate: fields are public
        let job = Job::new(job.total_work_seconds, job.deadline_seconds, job.restart_overhead_seconds)?;

        let traces = traces.into();
        if traces.is_empty() {
            return Err(SpotlineError::EmptyRegionSet);
        }
        for trace in traces.iter() {
            trace.check_gap(config.gap_seconds)?;
        }

        let clock = Clock::new(config.gap_seconds)?;
        let regions = RegionState::new(traces.len(), config.initial_region)?;
        let policy_state = policy.initial_state(&job, traces.len());

        if !job.is_feasible() {
            debug!(
                work = job.total_work_seconds,
                deadline = job.deadline_seconds,
                "Job cannot finish before its deadline"
            );
        }

        Ok(Simulator {
            job,
            ledger: ProgressLedger::new(job.total_work_seconds),
            overhead: OverheadTracker::new(job.restart_overhead_seconds, config.idle_overhead),
            config,
            traces,
            clock,
            regions,
            policy,
            policy_state,
            last_cluster_type: ClusterType::None,
            status: SimulationStatus::Running,
            spot_seconds: 0.0,
            on_demand_seconds: 0.0,
            preemptions: 0,
            contract_violations: 0,
            completed_at: None,
            history: Vec::new(),
        })
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.elapsed_seconds()
    }

    pub fn work_done_seconds(&self) -> f64 {
        self.ledger.done()
    }

    pub fn work_done_segments(&self) -> &[f64] {
        self.ledger.segments()
    }

    pub fn remaining_overhead_seconds(&self) -> f64 {
        self.overhead.remaining()
    }

    pub fn current_region(&self) -> usize {
        self.regions.current()
    }

    pub fn last_cluster_type(&self) -> ClusterType {
        self.last_cluster_type
    }

    pub fn policy_state(&self) -> &P::State {
        &self.policy_state
    }

    /// Per-tick records so far (empty when history is disabled)
    pub fn history(&self) -> &[TickRecord] {
        &self.history
    }

    /// What the policy would see if the next tick started now
    pub fn snapshot(&self) -> TickSnapshot<'_> {
        let has_spot = self.spot_in(self.regions.current());
        self.snapshot_with(has_spot)
    }

    fn snapshot_with(&self, has_spot: bool) -> TickSnapshot<'_> {
        TickSnapshot {
            tick: self.clock.tick(),
            elapsed_seconds: self.clock.elapsed_seconds(),
            gap_seconds: self.clock.gap_seconds(),
            deadline_seconds: self.job.deadline_seconds,
            total_work_seconds: self.job.total_work_seconds,
            restart_overhead_seconds: self.job.restart_overhead_seconds,
            work_done_segments: self.ledger.segments(),
            work_done_seconds: self.ledger.done(),
            remaining_restart_overhead_seconds: self.overhead.remaining(),
            current_region: self.regions.current(),
            num_regions: self.regions.num_regions(),
            last_cluster_type: self.last_cluster_type,
            has_spot,
            region_stats: self.regions.stats(),
        }
    }

    fn spot_in(&self, region: usize) -> bool {
        self.traces[region].is_available(self.clock.current_step())
    }

    fn finish(&mut self, outcome: Outcome) -> SimulationStatus {
        self.status = SimulationStatus::Finished(outcome);
        info!(
            policy = self.policy.name(),
            %outcome,
            ticks = self.clock.tick(),
            elapsed_hours = self.clock.elapsed_seconds() / 3600.0,
            work_done = self.ledger.done(),
            "Simulation finished"
        );
        self.status
    }

    /// Run exactly one tick (or detect a terminal state)
    pub fn step(&mut self) -> SimulationStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if self.ledger.is_complete() {
            return self.finish(Outcome::Completed);
        }
        if self.clock.elapsed_seconds() >= self.job.deadline_seconds {
            return self.finish(Outcome::DeadlineMissed);
        }
        if self.config.max_ticks.is_some_and(|max| self.clock.tick() >= max) {
            warn!(policy = self.policy.name(), ticks = self.clock.tick(), "Tick cap reached");
            return self.finish(Outcome::Cancelled);
        }

        let tick = self.clock.tick();
        let tick_start = self.clock.elapsed_seconds();
        let gap = self.clock.gap_seconds();

        // Observe, then decide
        let has_spot = self.spot_in(self.regions.current());
        self.regions.observe(has_spot);

        let (decision, next_state) = {
            let snapshot = self.snapshot_with(has_spot);
            trace!(
                tick,
                elapsed = tick_start,
                region = snapshot.current_region,
                has_spot,
                work_done = snapshot.work_done_seconds,
                overhead = snapshot.remaining_restart_overhead_seconds,
                "Tick snapshot"
            );
            self.policy.decide(&snapshot, &self.policy_state)
        };
        self.policy_state = next_state;

        // Region switch
        let mut degradation = None;
        let mut switched = false;
        if let Some(target) = decision.switch_region {
            match self.regions.switch_to(target) {
                RegionSwitch::Unchanged => {}
                RegionSwitch::Switched { from, to } => {
                    switched = true;
                    debug!(tick, from, to, "Region switch");
                }
                RegionSwitch::OutOfRange => {
                    warn!(
                        policy = self.policy.name(),
                        tick,
                        target,
                        num_regions = self.regions.num_regions(),
                        "Policy requested nonexistent region; tick runs idle"
                    );
                    degradation = Some(Degradation::RegionOutOfRange(target));
                    self.contract_violations += 1;
                }
            }
        }

        let region = self.regions.current();
        let spot_available = if switched { self.spot_in(region) } else { has_spot };

        // Realize the action
        let realized = match (degradation, decision.action) {
            (Some(_), _) => ClusterType::None,
            (None, ClusterType::Spot) if !spot_available => {
                degradation = Some(Degradation::SpotUnavailable);
                self.preemptions += 1;
                ClusterType::None
            }
            (None, action) => action,
        };

        // Overhead, then work
        self.overhead.on_action(realized, self.last_cluster_type, switched);
        let budget = self.overhead.consume_tick(realized, gap);
        let work = self.ledger.append(budget.work_producible);

        let billed = if realized.is_active() { budget.overhead_paid + work } else { 0.0 };
        match realized {
            ClusterType::Spot => self.spot_seconds += billed,
            ClusterType::OnDemand => self.on_demand_seconds += billed,
            ClusterType::None => {}
        }

        if self.ledger.is_complete() && self.completed_at.is_none() {
            self.completed_at = Some(tick_start + budget.overhead_paid + work);
        }

        if self.config.record_history {
            self.history.push(TickRecord {
                tick,
                elapsed_seconds: tick_start,
                region,
                has_spot: spot_available,
                requested: decision.action,
                realized,
                switched_region: switched,
                overhead_paid_seconds: budget.overhead_paid,
                work_seconds: work,
                remaining_overhead_seconds: self.overhead.remaining(),
                degradation,
            });
        }

        self.last_cluster_type = realized;
        self.clock.advance();
        self.status
    }

    /// Drive the run to a terminal state
    pub fn run(mut self) -> RunResult {
        while !self.step().is_terminal() {}
        self.into_result()
    }

    fn into_result(self) -> RunResult {
        let outcome = self.status.outcome().unwrap_or(Outcome::Cancelled);
        let total_elapsed_seconds = match outcome {
            Outcome::Completed => self.completed_at.unwrap_or(0.0),
            _ => self.clock.elapsed_seconds(),
        };

        RunResult {
            policy_name: self.policy.name().to_string(),
            outcome,
            total_elapsed_seconds,
            spot_seconds: self.spot_seconds,
            on_demand_seconds: self.on_demand_seconds,
            cost: self.config.pricing.cost(self.spot_seconds, self.on_demand_seconds),
            ticks: self.clock.tick(),
            region_switches: self.regions.switches(),
            preemptions: self.preemptions,
            contract_violations: self.contract_violations,
            work_done_seconds: self.ledger.done(),
            work_done_segments: self.ledger.into_segments(),
            history: self.history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{GreedySpotPolicy, OnDemandOnlyPolicy};
    use spotline_core::Decision;

    const HOUR: f64 = 3600.0;

    fn job(work_h: f64, deadline_h: f64, overhead_h: f64) -> Job {
        Job::new(work_h * HOUR, deadline_h * HOUR, overhead_h * HOUR).unwrap()
    }

    /// Replays a fixed list of decisions, then idles
    #[derive(Debug, Clone)]
    struct Scripted(Vec<Decision>);

    impl Policy for Scripted {
        type State = usize;

        fn name(&self) -> &str {
            "Scripted"
        }

        fn initial_state(&self, _job: &Job, _num_regions: usize) -> usize {
            0
        }

        fn decide(&self, _snapshot: &TickSnapshot<'_>, cursor: &usize) -> (Decision, usize) {
            let decision = self.0.get(*cursor).copied().unwrap_or_else(Decision::idle);
            (decision, cursor + 1)
        }
    }

    #[test]
    fn test_simulator_creation() {
        let traces = vec![AvailabilityTrace::always_available("r0", 10)];
        let simulator =
            Simulator::new(job(2.0, 4.0, 0.0), traces, GreedySpotPolicy::new(), SimulationConfig::default())
                .unwrap();

        assert_eq!(simulator.elapsed_seconds(), 0.0);
        assert_eq!(simulator.work_done_seconds(), 0.0);
        assert_eq!(simulator.status(), SimulationStatus::Running);
        assert_eq!(simulator.last_cluster_type(), ClusterType::None);
    }

    #[test]
    fn test_rejects_empty_region_set() {
        let result = Simulator::new(
            job(1.0, 2.0, 0.0),
            Vec::<AvailabilityTrace>::new(),
            GreedySpotPolicy::new(),
            SimulationConfig::default(),
        );
        assert!(matches!(result, Err(SpotlineError::EmptyRegionSet)));
    }

    #[test]
    fn test_rejects_bad_initial_region() {
        let traces = vec![AvailabilityTrace::always_available("r0", 10)];
        let config = SimulationConfig::default().with_initial_region(3);
        let result = Simulator::new(job(1.0, 2.0, 0.0), traces, GreedySpotPolicy::new(), config);
        assert!(matches!(result, Err(SpotlineError::RegionOutOfRange { .. })));
    }

    #[test]
    fn test_on_demand_completion_and_cost() {
        let traces = vec![AvailabilityTrace::never_available("r0")];
        let result = Simulator::new(
            job(2.0, 10.0, 0.5),
            traces,
            OnDemandOnlyPolicy::new(),
            SimulationConfig::default(),
        )
        .unwrap()
        .run();

        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.work_done_segments, vec![1800.0, 3600.0, 1800.0]);
        assert_eq!(result.total_elapsed_seconds, 2.5 * HOUR);
        assert_eq!(result.on_demand_seconds, 2.5 * HOUR);
        assert_eq!(result.spot_seconds, 0.0);
        assert!((result.cost - 2.5).abs() < 1e-9);
        assert_eq!(result.ticks, 3);
    }

    #[test]
    fn test_spot_without_capacity_runs_idle() {
        let traces = vec![AvailabilityTrace::new("r0", vec![false, true])];
        let mut simulator = Simulator::new(
            job(1.0, 5.0, 0.0),
            traces,
            GreedySpotPolicy::always_request(),
            SimulationConfig::default(),
        )
        .unwrap();

        simulator.step();
        let record = &simulator.history()[0];
        assert_eq!(record.requested, ClusterType::Spot);
        assert_eq!(record.realized, ClusterType::None);
        assert_eq!(record.work_seconds, 0.0);
        assert_eq!(record.degradation, Some(Degradation::SpotUnavailable));
        assert_eq!(simulator.last_cluster_type(), ClusterType::None);

        simulator.step();
        assert_eq!(simulator.last_cluster_type(), ClusterType::Spot);
        assert_eq!(simulator.work_done_seconds(), HOUR);
    }

    #[test]
    fn test_out_of_range_switch_degrades_tick() {
        let traces = vec![AvailabilityTrace::always_available("r0", 10)];
        let policy = Scripted(vec![Decision::on_demand().with_switch(7), Decision::on_demand()]);
        let result = Simulator::new(job(1.0, 5.0, 0.0), traces, policy, SimulationConfig::default())
            .unwrap()
            .run();

        assert_eq!(result.contract_violations, 1);
        assert_eq!(result.history[0].realized, ClusterType::None);
        assert_eq!(result.history[0].degradation, Some(Degradation::RegionOutOfRange(7)));
        assert_eq!(result.region_switches, 0);
        assert_eq!(result.outcome, Outcome::Completed);
    }

    #[test]
    fn test_switch_rearms_overhead_even_when_paid() {
        let traces = vec![
            AvailabilityTrace::always_available("r0", 10),
            AvailabilityTrace::always_available("r1", 10),
        ];
        let policy = Scripted(vec![
            Decision::spot(),
            Decision::spot(),
            Decision::spot().with_switch(1),
        ]);
        let mut simulator =
            Simulator::new(job(10.0, 20.0, 0.5), traces, policy, SimulationConfig::default()).unwrap();

        simulator.step();
        simulator.step();
        assert_eq!(simulator.remaining_overhead_seconds(), 0.0);

        simulator.step();
        let record = simulator.history().last().unwrap();
        assert!(record.switched_region);
        assert_eq!(record.region, 1);
        assert_eq!(record.overhead_paid_seconds, 1800.0);
        assert_eq!(record.work_seconds, 1800.0);
    }

    #[test]
    fn test_switch_checks_spot_in_new_region() {
        let traces = vec![
            AvailabilityTrace::always_available("r0", 10),
            AvailabilityTrace::never_available("r1"),
        ];
        let policy = Scripted(vec![Decision::spot().with_switch(1)]);
        let mut simulator =
            Simulator::new(job(1.0, 5.0, 0.0), traces, policy, SimulationConfig::default()).unwrap();

        simulator.step();
        let record = &simulator.history()[0];
        assert_eq!(record.region, 1);
        assert!(!record.has_spot);
        assert_eq!(record.realized, ClusterType::None);
    }

    #[test]
    fn test_infeasible_job_misses_deadline() {
        let traces = vec![AvailabilityTrace::always_available("r0", 100)];
        let result = Simulator::new(
            job(10.0, 5.0, 0.0),
            traces,
            OnDemandOnlyPolicy::new(),
            SimulationConfig::default(),
        )
        .unwrap()
        .run();

        assert_eq!(result.outcome, Outcome::DeadlineMissed);
        assert_eq!(result.total_elapsed_seconds, 5.0 * HOUR);
        assert_eq!(result.work_done_seconds, 5.0 * HOUR);
    }

    #[test]
    fn test_zero_work_completes_immediately() {
        let traces = vec![AvailabilityTrace::never_available("r0")];
        let result = Simulator::new(
            job(0.0, 1.0, 0.5),
            traces,
            OnDemandOnlyPolicy::new(),
            SimulationConfig::default(),
        )
        .unwrap()
        .run();

        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.ticks, 0);
        assert_eq!(result.total_elapsed_seconds, 0.0);
    }

    #[test]
    fn test_tick_cap_cancels() {
        let traces = vec![AvailabilityTrace::never_available("r0")];
        let config = SimulationConfig::default().with_max_ticks(3);
        let result = Simulator::new(job(10.0, 1000.0, 0.0), traces, GreedySpotPolicy::new(), config)
            .unwrap()
            .run();

        assert_eq!(result.outcome, Outcome::Cancelled);
        assert_eq!(result.ticks, 3);
    }

    #[test]
    fn test_history_can_be_disabled() {
        let traces = vec![AvailabilityTrace::always_available("r0", 10)];
        let config = SimulationConfig::default().with_history(false);
        let result = Simulator::new(job(2.0, 4.0, 0.0), traces, GreedySpotPolicy::new(), config)
            .unwrap()
            .run();

        assert!(result.history.is_empty());
        assert_eq!(result.work_done_segments.len(), 2);
    }

    #[test]
    fn test_region_stats_follow_observations() {
        let traces = vec![
            AvailabilityTrace::new("r0", vec![false, false]),
            AvailabilityTrace::new("r1", vec![true, true]),
        ];
        let policy = Scripted(vec![Decision::idle().with_switch(1), Decision::idle()]);
        let mut simulator =
            Simulator::new(job(5.0, 10.0, 0.0), traces, policy, SimulationConfig::default()).unwrap();

        simulator.step();
        simulator.step();
        let snapshot = simulator.snapshot();
        assert_eq!(snapshot.region_stats[0].observed_ticks, 1);
        assert_eq!(snapshot.region_stats[0].observed_spot_ticks, 0);
        assert_eq!(snapshot.region_stats[1].observed_ticks, 1);
        assert_eq!(snapshot.region_stats[1].observed_spot_ticks, 1);
    }
}
