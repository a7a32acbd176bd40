//! Domain-level error taxonomy for tracebox.

use std::path::PathBuf;

/// Errors raised outside of a traced execution.
///
/// Faults inside user programs are never reported through this type; they
/// travel as strings inside an [`ExecutionResult`](super::ExecutionResult).
#[derive(Debug, thiserror::Error)]
pub enum TraceboxError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for tracebox domain operations.
pub type Result<T> = std::result::Result<T, TraceboxError>;
