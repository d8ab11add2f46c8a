//! Spotline Simulation Engine CLI
//!
//! Command-line interface for evaluating scheduling policies against
//! recorded or synthetic spot availability traces.
//!
//! ```bash
//! # Synthetic traces, 3 regions, 20 scenarios
//! spotline-sim --regions 3 --scenarios 20
//!
//! # Recorded traces, one file per region
//! spotline-sim --trace us-east-1a.json --trace us-west-2b.txt --deadline-hours 52
//!
//! # Scenario file
//! spotline-sim --job scenario.json --output results.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Serialize;
use spotline_core::{Job, JobConfig, RunResult};
use spotline_simulation_engine::{
    AvailabilityTrace, BatchRunner, BatchSummary, IdleOverheadMode, PolicyKind, Pricing, Scenario,
    ScenarioConfig, SimulationConfig, TraceGenerator, summarize, types::DEFAULT_GAP_SECONDS,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "spotline-sim")]
#[command(about = "Evaluate deadline-aware spot scheduling policies", long_about = None)]
struct Args {
    /// Scenario file (JSON: job, gap_seconds, traces, pricing)
    #[arg(short, long)]
    job: Option<PathBuf>,

    /// Deadline in hours (ignored with --job)
    #[arg(long, default_value_t = 20.0)]
    deadline_hours: f64,

    /// Required compute in hours (ignored with --job)
    #[arg(long, default_value_t = 10.0)]
    duration_hours: f64,

    /// Restart overhead in hours (ignored with --job)
    #[arg(long, default_value_t = 0.5)]
    overhead_hours: f64,

    /// Availability trace file, one per region (repeatable)
    #[arg(short, long)]
    trace: Vec<PathBuf>,

    /// Regions per synthetic scenario
    #[arg(long, default_value_t = 3)]
    regions: usize,

    /// Number of synthetic scenarios
    #[arg(long, default_value_t = 1)]
    scenarios: usize,

    /// Seed for synthetic traces
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Per-tick probability of losing spot capacity (synthetic)
    #[arg(long, default_value_t = 0.1)]
    preemption_prob: f64,

    /// Per-tick probability of regaining spot capacity (synthetic)
    #[arg(long, default_value_t = 0.3)]
    recovery_prob: f64,

    /// Tick length in seconds
    #[arg(long)]
    gap_seconds: Option<f64>,

    /// Policies to compare (comma-separated)
    #[arg(short, long, default_value = "safe-slack,region-exploration,greedy-spot,on-demand-only")]
    policies: String,

    /// Hold pending restart overhead during idle ticks instead of draining it
    #[arg(long)]
    freeze_idle_overhead: bool,

    /// Spot price ($/hr)
    #[arg(long)]
    spot_price: Option<f64>,

    /// On-demand price ($/hr)
    #[arg(long)]
    on_demand_price: Option<f64>,

    /// Worker threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// One run in the JSON report
#[derive(Serialize)]
struct RunReport<'a> {
    scenario: &'a str,
    policy: PolicyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Report<'a> {
    job: Job,
    config: &'a SimulationConfig,
    summary: &'a [BatchSummary],
    runs: Vec<RunReport<'a>>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotline_simulation_engine=info,spotline_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Scenario file, if any, provides defaults that flags override
    let scenario_file = args
        .job
        .as_ref()
        .map(|path| {
            ScenarioConfig::load(path).with_context(|| format!("loading scenario {}", path.display()))
        })
        .transpose()?;

    let job_config = match &scenario_file {
        Some(file) => file.job,
        None => JobConfig {
            deadline_hours: args.deadline_hours,
            duration_hours: args.duration_hours,
            overhead_hours: args.overhead_hours,
        },
    };
    let job = Job::from_config(&job_config)?;

    let gap_seconds = args
        .gap_seconds
        .or(scenario_file.as_ref().and_then(|f| f.gap_seconds))
        .unwrap_or(DEFAULT_GAP_SECONDS);

    let mut pricing = scenario_file
        .as_ref()
        .and_then(|f| f.pricing)
        .unwrap_or_default();
    if let Some(price) = args.spot_price {
        pricing.spot_per_hour = price;
    }
    if let Some(price) = args.on_demand_price {
        pricing.on_demand_per_hour = price;
    }

    let idle_overhead = if args.freeze_idle_overhead {
        IdleOverheadMode::Freeze
    } else {
        IdleOverheadMode::Drain
    };

    let config = SimulationConfig::default()
        .with_gap_seconds(gap_seconds)
        .with_pricing(pricing)
        .with_idle_overhead(idle_overhead)
        .with_history(false);
    config.validate()?;

    let policies = args
        .policies
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<PolicyKind>)
        .collect::<Result<Vec<_>, _>>()?;
    if policies.is_empty() {
        bail!("no policies selected");
    }

    print_configuration(&job, &config, &pricing);

    let mut trace_paths = scenario_file.map(|f| f.traces).unwrap_or_default();
    trace_paths.extend(args.trace.iter().cloned());

    let scenarios = if trace_paths.is_empty() {
        synthetic_scenarios(&args, &job, &config)?
    } else {
        let traces = trace_paths
            .iter()
            .map(|path| {
                AvailabilityTrace::load(path).with_context(|| format!("loading trace {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        println!("Loaded {} region trace(s)\n", traces.len());
        vec![Scenario::new("traces", job, traces, config.clone())]
    };

    let entries = BatchRunner::with_threads(args.threads).run(&scenarios, &policies)?;
    let summary = summarize(&entries);

    print_summary(&summary);

    for entry in &entries {
        if let Err(e) = &entry.result {
            eprintln!("  {} on {}: {}", entry.policy, entry.scenario, e);
        }
    }

    if let Some(baseline) = summary.iter().find(|s| s.policy == PolicyKind::OnDemandOnly) {
        println!("\nCost savings vs {} baseline:", baseline.policy);
        for row in summary.iter().filter(|s| s.policy != baseline.policy) {
            let savings = baseline.mean_cost - row.mean_cost;
            let savings_pct = if baseline.mean_cost > 0.0 {
                savings / baseline.mean_cost * 100.0
            } else {
                0.0
            };
            println!("  {:<22} ${:>8.2} ({:>5.1}%)", row.policy, savings, savings_pct);
        }
    }

    if let Some(output_path) = &args.output {
        let report = Report {
            job,
            config: &config,
            summary: &summary,
            runs: entries
                .iter()
                .map(|entry| RunReport {
                    scenario: &entry.scenario,
                    policy: entry.policy,
                    result: entry.result.as_ref().ok(),
                    error: entry.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        info!(path = %output_path.display(), "Results saved");
    }

    Ok(())
}

fn synthetic_scenarios(args: &Args, job: &Job, config: &SimulationConfig) -> anyhow::Result<Vec<Scenario>> {
    let generator = TraceGenerator::new(args.preemption_prob, args.recovery_prob)?;
    let ticks = (job.deadline_seconds / config.gap_seconds).ceil() as usize;

    println!(
        "Generating {} synthetic scenario(s): {} regions x {} ticks (long-run availability {:.0}%)\n",
        args.scenarios,
        args.regions,
        ticks,
        generator.stationary_availability() * 100.0
    );

    (0..args.scenarios)
        .map(|i| -> anyhow::Result<Scenario> {
            let seed = scenario_seed(args.seed, i, args.regions);
            let traces = generator.generate_regions(args.regions, ticks, seed)?;
            Ok(Scenario::new(format!("seed-{seed}"), *job, traces, config.clone()))
        })
        .collect()
}

/// Base seed for scenario `index`; its regions use the following seeds
fn scenario_seed(seed: u64, index: usize, regions: usize) -> u64 {
    seed.wrapping_add((index as u64).wrapping_mul(regions as u64))
}

fn print_configuration(job: &Job, config: &SimulationConfig, pricing: &Pricing) {
    println!("Configuration:");
    println!("  Work: {:.2} hours", job.total_work_seconds / 3600.0);
    println!("  Deadline: {:.2} hours", job.deadline_seconds / 3600.0);
    println!("  Restart overhead: {:.2} hours", job.restart_overhead_seconds / 3600.0);
    println!("  Tick: {} seconds", config.gap_seconds);
    println!("  Spot price: ${:.2}/hr", pricing.spot_per_hour);
    println!("  On-demand price: ${:.2}/hr\n", pricing.on_demand_per_hour);
}

fn print_summary(summary: &[BatchSummary]) {
    println!(
        "{:<22} {:>6} {:>10} {:>8} {:>8} {:>12} {:>12}",
        "Policy", "Runs", "Completed", "Missed", "Errors", "Mean cost", "Mean hours"
    );
    println!("{}", "-".repeat(84));

    for row in summary {
        println!(
            "{:<22} {:>6} {:>10} {:>8} {:>8} {:>12.2} {:>12.2}",
            row.policy.as_str(),
            row.runs,
            row.completed,
            row.deadline_missed,
            row.errors,
            row.mean_cost,
            row.mean_elapsed_hours,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_seeds_do_not_overlap() {
        assert_eq!(scenario_seed(42, 0, 3), 42);
        assert_eq!(scenario_seed(42, 1, 3), 45);
        assert_eq!(scenario_seed(42, 2, 3), 48);
    }

    #[test]
    fn test_scenario_seed_wraps_instead_of_overflowing() {
        assert_eq!(scenario_seed(u64::MAX, 1, 1), 0);
        assert_eq!(scenario_seed(1, usize::MAX, 1), (usize::MAX as u64).wrapping_add(1));
        // Index times regions past u64 range wraps rather than panicking
        let _ = scenario_seed(7, usize::MAX, usize::MAX);
    }
}
