//! Per-execution options and the executor seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::governor::ResourceLimits;
use crate::domain::ExecutionResult;
use crate::trace::TraceLimits;

/// Wall-clock budget for one execution.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Address-space ceiling for one worker.
pub const DEFAULT_MEMORY_LIMIT_BYTES: u64 = 50 * 1024 * 1024;

/// Knobs for a single isolated execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub timeout_ms: u64,
    /// `None` runs the worker without a memory ceiling.
    pub memory_limit_bytes: Option<u64>,
    /// `None` derives the CPU ceiling from `timeout_ms`.
    pub cpu_limit_secs: Option<u64>,
    pub trace: TraceLimits,
    /// Return only this step of the trace.
    pub step_index: Option<i64>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_limit_bytes: Some(DEFAULT_MEMORY_LIMIT_BYTES),
            cpu_limit_secs: None,
            trace: TraceLimits::default(),
            step_index: None,
        }
    }
}

impl ExecutionOptions {
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_step(mut self, step_index: Option<i64>) -> Self {
        self.step_index = step_index;
        self
    }

    /// Ceilings the worker applies to itself.
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_limit_bytes: self.memory_limit_bytes,
            cpu_limit_secs: Some(
                self.cpu_limit_secs
                    .unwrap_or_else(|| ResourceLimits::cpu_secs_for_timeout(self.timeout_ms)),
            ),
        }
    }
}

/// Runs one submitted program and reports its trace.
///
/// Implementations never fail: every outcome, including timeouts and
/// crashes, is expressed in the returned [`ExecutionResult`].
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, source: &str, options: &ExecutionOptions) -> ExecutionResult;
}
