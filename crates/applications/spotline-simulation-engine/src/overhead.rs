//! Restart overhead accounting
//!
//! Starting compute is not free: after a resource-type change, a region
//! switch or a resume from idle, the job spends `restart_overhead_seconds`
//! producing nothing. The tracker decides how much of each tick goes to
//! paying that down and how much is left for useful work.
//!
//! ```text
//! tick: |<------------------ gap ------------------>|
//!       |<-- overhead paid -->|<-- work producible ->|
//! ```

use spotline_core::ClusterType;

use crate::types::IdleOverheadMode;

/// Split of one tick between overhead and work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickBudget {
    pub overhead_paid: f64,
    pub work_producible: f64,
}

/// Pending restart overhead for a run
#[derive(Debug, Clone)]
pub struct OverheadTracker {
    restart_overhead_seconds: f64,
    remaining_seconds: f64,
    idle_mode: IdleOverheadMode,
}

impl OverheadTracker {
    pub fn new(restart_overhead_seconds: f64, idle_mode: IdleOverheadMode) -> Self {
        Self {
            restart_overhead_seconds,
            remaining_seconds: 0.0,
            idle_mode,
        }
    }

    /// Overhead still to be paid
    pub fn remaining(&self) -> f64 {
        self.remaining_seconds
    }

    /// Arm overhead for the action about to run
    ///
    /// A region switch, or starting compute of a different type than last
    /// tick (including resuming from idle), sets the pending overhead to the
    /// full restart cost. It replaces any overhead already pending; it never
    /// stacks. Idle ticks arm nothing. Returns the overhead now pending.
    pub fn on_action(&mut self, action: ClusterType, last: ClusterType, region_switched: bool) -> f64 {
        let type_changed = action.is_active() && action != last;
        if region_switched || type_changed {
            self.remaining_seconds = self.restart_overhead_seconds;
        }
        self.remaining_seconds
    }

    /// Spend one tick of `gap_seconds` running `action`
    pub fn consume_tick(&mut self, action: ClusterType, gap_seconds: f64) -> TickBudget {
        if !action.is_active() && self.idle_mode == IdleOverheadMode::Freeze {
            return TickBudget {
                overhead_paid: 0.0,
                work_producible: 0.0,
            };
        }

        let overhead_paid = self.remaining_seconds.min(gap_seconds);
        self.remaining_seconds = (self.remaining_seconds - overhead_paid).max(0.0);

        let work_producible = if action.is_active() {
            (gap_seconds - overhead_paid).max(0.0)
        } else {
            0.0
        };

        TickBudget {
            overhead_paid,
            work_producible,
        }
    }
}
