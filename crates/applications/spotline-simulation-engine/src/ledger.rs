//! Append-only record of useful work

use spotline_core::tolerance_seconds;

/// Per-tick work contributions, capped at the job's total work
#[derive(Debug, Clone)]
pub struct ProgressLedger {
    total_work_seconds: f64,
    segments: Vec<f64>,
    done_seconds: f64,
    /// Remainders at or below this count as finished
    tolerance: f64,
}

impl ProgressLedger {
    pub fn new(total_work_seconds: f64) -> Self {
        Self {
            total_work_seconds,
            segments: Vec::new(),
            done_seconds: 0.0,
            tolerance: tolerance_seconds(total_work_seconds),
        }
    }

    /// Append one tick's work, clamped to what is left
    ///
    /// Returns the amount actually recorded. The segment that finishes the
    /// job, or leaves only a rounding remainder, snaps the running total to
    /// exactly `total_work_seconds`.
    pub fn append(&mut self, work_seconds: f64) -> f64 {
        debug_assert!(!self.is_complete(), "append after completion");

        let remaining = self.remaining();
        let work = work_seconds.max(0.0);
        let recorded = if work + self.tolerance >= remaining {
            self.done_seconds = self.total_work_seconds;
            remaining
        } else {
            self.done_seconds += work;
            work
        };

        self.segments.push(recorded);
        recorded
    }

    pub fn done(&self) -> f64 {
        self.done_seconds
    }

    pub fn remaining(&self) -> f64 {
        (self.total_work_seconds - self.done_seconds).max(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() <= self.tolerance
    }

    pub fn segments(&self) -> &[f64] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<f64> {
        self.segments
    }
}
