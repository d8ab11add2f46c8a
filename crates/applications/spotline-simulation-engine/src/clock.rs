//! Discrete simulation clock
//!
//! Time advances in fixed `gap_seconds` ticks. Elapsed time is derived from
//! the tick counter (`tick * gap`) rather than accumulated, so it carries no
//! summation drift however long the run is.

use spotline_core::{Result, SpotlineError};

/// Tolerance when snapping a time onto a tick boundary
const STEP_EPSILON: f64 = 1e-9;

/// Fixed-step clock
#[derive(Debug, Clone)]
pub struct Clock {
    gap_seconds: f64,
    tick: u64,
}

impl Clock {
    pub fn new(gap_seconds: f64) -> Result<Self> {
        if !gap_seconds.is_finite() || gap_seconds <= 0.0 {
            return Err(SpotlineError::InvalidGap(gap_seconds));
        }
        Ok(Clock { gap_seconds, tick: 0 })
    }

    pub fn gap_seconds(&self) -> f64 {
        self.gap_seconds
    }

    /// Ticks completed so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.tick as f64 * self.gap_seconds
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    /// Step index containing `elapsed_seconds`
    ///
    /// Times that sit on a tick boundary up to floating point noise map to
    /// that boundary's step.
    pub fn step_index(&self, elapsed_seconds: f64) -> u64 {
        if elapsed_seconds <= 0.0 {
            return 0;
        }
        let raw = elapsed_seconds / self.gap_seconds;
        let nearest = raw.round();
        if (raw - nearest).abs() < STEP_EPSILON {
            nearest as u64
        } else {
            raw.floor() as u64
        }
    }

    /// Step index of the current tick
    pub fn current_step(&self) -> u64 {
        self.step_index(self.elapsed_seconds())
    }
}
