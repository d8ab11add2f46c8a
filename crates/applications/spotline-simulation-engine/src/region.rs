//! Region state and exploration statistics
//!
//! Regions are interchangeable: a region is its index and its availability
//! trace. The simulator tracks which region the job currently occupies and,
//! for every region, how often spot capacity was observed there. Those
//! observations feed exploration-style policies through
//! [`ExplorationEstimator`].

use serde::{Deserialize, Serialize};
use spotline_core::{RegionStats, Result, SpotlineError};

/// Result of a switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSwitch {
    /// Target is the current region: no-op
    Unchanged,
    /// Moved between regions
    Switched { from: usize, to: usize },
    /// Target does not exist; request rejected
    OutOfRange,
}

/// Current region plus per-region observations
#[derive(Debug, Clone)]
pub struct RegionState {
    current: usize,
    stats: Vec<RegionStats>,
    switches: u64,
}

impl RegionState {
    pub fn new(num_regions: usize, initial: usize) -> Result<Self> {
        if num_regions == 0 {
            return Err(SpotlineError::EmptyRegionSet);
        }
        if initial >= num_regions {
            return Err(SpotlineError::RegionOutOfRange {
                index: initial,
                num_regions,
            });
        }

        Ok(Self {
            current: initial,
            stats: vec![RegionStats::default(); num_regions],
            switches: 0,
        })
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn num_regions(&self) -> usize {
        self.stats.len()
    }

    pub fn stats(&self) -> &[RegionStats] {
        &self.stats
    }

    /// Number of switches actually performed
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Record a spot observation for the current region
    pub fn observe(&mut self, has_spot: bool) {
        self.stats[self.current].record(has_spot);
    }

    pub fn switch_to(&mut self, target: usize) -> RegionSwitch {
        if target >= self.stats.len() {
            return RegionSwitch::OutOfRange;
        }
        if target == self.current {
            return RegionSwitch::Unchanged;
        }

        let from = self.current;
        self.current = target;
        self.switches += 1;
        RegionSwitch::Switched { from, to: target }
    }
}

/// Beta-smoothed ranking of regions by observed spot availability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplorationEstimator {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for ExplorationEstimator {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0 }
    }
}

impl ExplorationEstimator {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    pub fn score(&self, stats: &RegionStats) -> f64 {
        stats.smoothed_success_rate(self.alpha, self.beta)
    }

    /// Region with the highest smoothed success rate
    ///
    /// The current region wins ties; among other tied regions the lowest
    /// index wins. Returns `current` when `stats` is empty.
    pub fn best_region(&self, stats: &[RegionStats], current: usize) -> usize {
        let mut best = current;
        let mut best_score = stats
            .get(current)
            .map(|s| self.score(s))
            .unwrap_or(f64::NEG_INFINITY);

        for (index, region) in stats.iter().enumerate() {
            let score = self.score(region);
            if score > best_score {
                best = index;
                best_score = score;
            }
        }

        best
    }
}
