//! Global atomic counters for tracebox observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters; no allocations, no locking.
pub struct Metrics {
    executions: AtomicU64,
    timeouts: AtomicU64,
    worker_failures: AtomicU64,
    steps_recorded: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            executions: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            worker_failures: AtomicU64::new(0),
            steps_recorded: AtomicU64::new(0),
        }
    }

    pub fn inc_executions(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "executions", "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "timeouts", "counter incremented");
    }

    pub fn inc_worker_failures(&self) {
        self.worker_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "worker_failures", "counter incremented");
    }

    /// Add the step count of one returned trace.
    pub fn add_steps(&self, steps: u64) {
        self.steps_recorded.fetch_add(steps, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            executions = self.executions(),
            timeouts = self.timeouts(),
            worker_failures = self.worker_failures(),
            steps_recorded = self.steps_recorded(),
        );
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn worker_failures(&self) -> u64 {
        self.worker_failures.load(Ordering::Relaxed)
    }

    pub fn steps_recorded(&self) -> u64 {
        self.steps_recorded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_executions();
        m.inc_executions();
        assert_eq!(m.executions(), 2);

        m.inc_timeouts();
        assert_eq!(m.timeouts(), 1);

        m.inc_worker_failures();
        m.add_steps(7);
        m.add_steps(3);
        assert_eq!(m.worker_failures(), 1);
        assert_eq!(m.steps_recorded(), 10);
    }
}
