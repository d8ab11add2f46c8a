//! Spot availability traces
//!
//! One trace per region: a boolean per tick, `true` when spot capacity
//! exists. Traces may be shorter than the run; any step past the end reads
//! as unavailable.
//!
//! Accepted file formats:
//! - JSON array of booleans or 0/1 integers: `[1, 1, 0, true]`
//! - JSON object with optional tick length: `{"gap_seconds": 3600, "data": [...]}`
//! - Plain text, whitespace separated `0|1|true|false` tokens, `#` comments
//!
//! Synthetic traces come from a two-state Markov chain
//! ([`TraceGenerator`]), seeded for reproducibility.

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};
use spotline_core::{Result, SpotlineError};
use tracing::debug;

/// Availability series for one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityTrace {
    pub name: String,
    /// Tick length the trace was recorded at, if it declares one
    pub gap_seconds: Option<f64>,
    pub data: Vec<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceValue {
    Flag(bool),
    Int(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TraceFile {
    Bare(Vec<TraceValue>),
    Wrapped {
        #[serde(default)]
        gap_seconds: Option<f64>,
        data: Vec<TraceValue>,
    },
}

impl AvailabilityTrace {
    pub fn new(name: impl Into<String>, data: Vec<bool>) -> Self {
        Self {
            name: name.into(),
            gap_seconds: None,
            data,
        }
    }

    /// Trace that is available for `len` ticks
    pub fn always_available(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, vec![true; len])
    }

    /// Trace that never has spot capacity
    pub fn never_available(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Load a trace file, picking the format from its contents
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let contents = std::fs::read_to_string(path)?;

        let trace = Self::parse(&name, &contents)?;
        debug!(
            trace = %trace.name,
            ticks = trace.len(),
            availability = trace.availability_ratio(),
            "Loaded availability trace"
        );
        Ok(trace)
    }

    /// Parse trace contents (JSON or plain text)
    pub fn parse(name: &str, contents: &str) -> Result<Self> {
        let trimmed = contents.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            Self::parse_json(name, contents)
        } else {
            Self::parse_text(name, contents)
        }
    }

    pub fn parse_json(name: &str, contents: &str) -> Result<Self> {
        let file: TraceFile = serde_json::from_str(contents)
            .map_err(|e| SpotlineError::trace(name, e.to_string()))?;

        let (gap_seconds, values) = match file {
            TraceFile::Bare(values) => (None, values),
            TraceFile::Wrapped { gap_seconds, data } => (gap_seconds, data),
        };

        let data = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                TraceValue::Flag(flag) => Ok(flag),
                TraceValue::Int(0) => Ok(false),
                TraceValue::Int(1) => Ok(true),
                TraceValue::Int(other) => Err(SpotlineError::trace(
                    name,
                    format!("entry {i}: expected 0 or 1, got {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            gap_seconds,
            data,
        })
    }

    pub fn parse_text(name: &str, contents: &str) -> Result<Self> {
        let mut data = Vec::new();

        for (line_no, line) in contents.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("");
            for token in line.split(|c: char| c.is_whitespace() || c == ',') {
                match token {
                    "" => {}
                    "1" | "true" => data.push(true),
                    "0" | "false" => data.push(false),
                    other => {
                        return Err(SpotlineError::trace(
                            name,
                            format!("line {}: unrecognised token '{other}'", line_no + 1),
                        ));
                    }
                }
            }
        }

        Ok(Self::new(name, data))
    }

    /// Spot availability at `step`; out of range is unavailable
    pub fn is_available(&self, step: u64) -> bool {
        usize::try_from(step)
            .ok()
            .and_then(|i| self.data.get(i))
            .copied()
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fraction of recorded ticks with spot capacity
    pub fn availability_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().filter(|&&a| a).count() as f64 / self.data.len() as f64
    }

    /// Reject a trace recorded at a different tick length than the run
    pub fn check_gap(&self, gap_seconds: f64) -> Result<()> {
        match self.gap_seconds {
            Some(found) if (found - gap_seconds).abs() > 1e-9 => {
                Err(SpotlineError::TraceGapMismatch {
                    expected: gap_seconds,
                    found,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Synthetic availability generator (two-state Markov chain)
///
/// Each tick, an available region loses capacity with probability
/// `preemption_prob`; an unavailable one regains it with probability
/// `recovery_prob`. Long-run availability is
/// `recovery / (recovery + preemption)`.
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    preemption_prob: f64,
    recovery_prob: f64,
    initially_available: bool,
}

impl TraceGenerator {
    /// Create a new generator
    ///
    /// # Arguments
    /// * `preemption_prob` - Per-tick chance of losing spot capacity (e.g., 0.1)
    /// * `recovery_prob` - Per-tick chance of regaining it (e.g., 0.3)
    pub fn new(preemption_prob: f64, recovery_prob: f64) -> Result<Self> {
        for (field, p) in [("preemption_prob", preemption_prob), ("recovery_prob", recovery_prob)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SpotlineError::config(format!(
                    "{field} must be within [0, 1], got {p}"
                )));
            }
        }

        Ok(Self {
            preemption_prob,
            recovery_prob,
            initially_available: true,
        })
    }

    /// Set the state of the first tick
    pub fn starting_available(mut self, available: bool) -> Self {
        self.initially_available = available;
        self
    }

    /// Long-run fraction of available ticks
    pub fn stationary_availability(&self) -> f64 {
        let total = self.preemption_prob + self.recovery_prob;
        if total == 0.0 {
            if self.initially_available { 1.0 } else { 0.0 }
        } else {
            self.recovery_prob / total
        }
    }

    /// Generate `ticks` steps of availability
    pub fn generate(&self, name: impl Into<String>, ticks: usize, seed: u64) -> Result<AvailabilityTrace> {
        let mut rng = StdRng::seed_from_u64(seed);
        let lose = Bernoulli::new(self.preemption_prob)
            .map_err(|e| SpotlineError::config(e.to_string()))?;
        let regain = Bernoulli::new(self.recovery_prob)
            .map_err(|e| SpotlineError::config(e.to_string()))?;

        let mut available = self.initially_available;
        let mut data = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            data.push(available);
            available = if available {
                !lose.sample(&mut rng)
            } else {
                regain.sample(&mut rng)
            };
        }

        Ok(AvailabilityTrace::new(name, data))
    }

    /// One independent trace per region (seeds `seed`, `seed + 1`, ...)
    pub fn generate_regions(&self, num_regions: usize, ticks: usize, seed: u64) -> Result<Vec<AvailabilityTrace>> {
        (0..num_regions)
            .map(|region| {
                self.generate(
                    format!("synthetic-{region}"),
                    ticks,
                    seed.wrapping_add(region as u64),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_is_unavailable() {
        let trace = AvailabilityTrace::new("t", vec![true, false, true]);
        assert!(trace.is_available(0));
        assert!(!trace.is_available(1));
        assert!(trace.is_available(2));
        assert!(!trace.is_available(3));
        assert!(!trace.is_available(u64::MAX));
    }

    #[test]
    fn test_parse_json_array() {
        let trace = AvailabilityTrace::parse("t", "[1, 0, true, false]").unwrap();
        assert_eq!(trace.data, vec![true, false, true, false]);
        assert_eq!(trace.gap_seconds, None);
    }

    #[test]
    fn test_parse_json_object() {
        let trace = AvailabilityTrace::parse("t", r#"{"gap_seconds": 600, "data": [0, 1]}"#).unwrap();
        assert_eq!(trace.data, vec![false, true]);
        assert_eq!(trace.gap_seconds, Some(600.0));
        assert!(trace.check_gap(600.0).is_ok());
        assert!(matches!(
            trace.check_gap(3600.0),
            Err(SpotlineError::TraceGapMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_json_rejects_other_ints() {
        let err = AvailabilityTrace::parse("t", "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("entry 1"));
    }

    #[test]
    fn test_parse_text() {
        let contents = "# us-east-1a\n1 1 0\n0,true\n\nfalse # tail\n";
        let trace = AvailabilityTrace::parse("t", contents).unwrap();
        assert_eq!(trace.data, vec![true, true, false, false, true, false]);
    }

    #[test]
    fn test_parse_text_reports_line() {
        let err = AvailabilityTrace::parse("t", "1\n1 x\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.txt");
        std::fs::write(&path, "0 0 1 1\n").unwrap();

        let trace = AvailabilityTrace::load(&path).unwrap();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.availability_ratio(), 0.5);
    }

    #[test]
    fn test_generator_is_deterministic() {
        let generator = TraceGenerator::new(0.2, 0.4).unwrap();
        let a = generator.generate("a", 500, 7).unwrap();
        let b = generator.generate("b", 500, 7).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.len(), 500);
    }

    #[test]
    fn test_generator_extremes() {
        let always = TraceGenerator::new(0.0, 1.0).unwrap().generate("a", 50, 1).unwrap();
        assert!(always.data.iter().all(|&a| a));

        let never = TraceGenerator::new(1.0, 0.0).unwrap().generate("n", 50, 1).unwrap();
        assert!(never.data[0]);
        assert!(never.data[1..].iter().all(|&a| !a));
    }

    #[test]
    fn test_generator_starting_unavailable() {
        let generator = TraceGenerator::new(0.0, 0.0).unwrap().starting_available(false);
        assert_eq!(generator.stationary_availability(), 0.0);

        let trace = generator.generate("dry", 20, 3).unwrap();
        assert!(!trace.data[0]);
        assert_eq!(trace.availability_ratio(), 0.0);

        let recovering = TraceGenerator::new(0.0, 1.0)
            .unwrap()
            .starting_available(false)
            .generate("r", 5, 3)
            .unwrap();
        assert_eq!(recovering.data, vec![false, true, true, true, true]);
    }

    #[test]
    fn test_generator_rejects_bad_probability() {
        assert!(TraceGenerator::new(1.5, 0.1).is_err());
        assert!(TraceGenerator::new(0.1, -0.1).is_err());
    }

    #[test]
    fn test_generate_regions_are_independent() {
        let generator = TraceGenerator::new(0.3, 0.3).unwrap();
        let regions = generator.generate_regions(3, 200, 11).unwrap();
        assert_eq!(regions.len(), 3);
        assert_ne!(regions[0].data, regions[1].data);
        assert_eq!(regions[2].name, "synthetic-2");
    }
}
