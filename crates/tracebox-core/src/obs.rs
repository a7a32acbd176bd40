//! Structured observability hooks for the execution lifecycle.
//!
//! - Execution-scoped spans: [`ExecutionSpan`] for synchronous code,
//!   [`execution_span`] to instrument futures
//! - `emit_*` functions for start, finish, timeout, worker failure and
//!   out-of-range step requests

use tracing::{info, warn};

/// RAII guard that enters an execution-scoped span.
///
/// ```ignore
/// let _span = ExecutionSpan::enter("5f0c...");
/// // events logged here carry execution_id = "5f0c..."
/// ```
pub struct ExecutionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ExecutionSpan {
    pub fn enter(execution_id: &str) -> Self {
        Self {
            _span: execution_span(execution_id).entered(),
        }
    }
}

/// The span for one execution, for use with `Instrument`.
pub fn execution_span(execution_id: &str) -> tracing::Span {
    tracing::info_span!("tracebox.execution", execution_id = %execution_id)
}

pub fn emit_execution_started(execution_id: &str, source_bytes: usize, timeout_ms: u64) {
    info!(
        event = "execution.started",
        execution_id = %execution_id,
        source_bytes = source_bytes,
        timeout_ms = timeout_ms,
    );
}

/// `success` is false when the result carries an error of any kind.
pub fn emit_execution_finished(execution_id: &str, duration_ms: u64, steps: usize, success: bool) {
    info!(
        event = "execution.finished",
        execution_id = %execution_id,
        duration_ms = duration_ms,
        steps = steps,
        success = success,
    );
}

pub fn emit_execution_timed_out(execution_id: &str, limit_ms: u64) {
    warn!(event = "execution.timed_out", execution_id = %execution_id, limit_ms = limit_ms);
}

pub fn emit_worker_failed(execution_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "execution.worker_failed", execution_id = %execution_id, error = %error);
}

pub fn emit_step_out_of_range(execution_id: &str, index: i64, available: usize) {
    info!(
        event = "execution.step_out_of_range",
        execution_id = %execution_id,
        index = index,
        available = available,
    );
}
