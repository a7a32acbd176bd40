//! Error types for the sandbox layer.

use std::path::PathBuf;

use crate::domain::ExecutionResult;

/// Failures of one isolated execution attempt.
///
/// These never reach the caller as-is: [`SandboxError::into_result`] maps
/// them onto the two user-visible host errors.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to spawn worker {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker channel failed: {0}")]
    Channel(#[from] std::io::Error),

    #[error("malformed worker message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("worker exited without a result ({status})")]
    WorkerExited { status: String },

    #[error("execution timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },
}

impl SandboxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SandboxError::Timeout { .. })
    }

    /// The result reported to the caller for this failure.
    pub fn into_result(self) -> ExecutionResult {
        if self.is_timeout() {
            ExecutionResult::timed_out()
        } else {
            ExecutionResult::failed_unexpectedly()
        }
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
