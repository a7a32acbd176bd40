//! Domain types shared by the host, the worker and the transport layer.

pub mod error;
pub mod step;

pub use error::{Result, TraceboxError};
pub use step::{ExecutionResult, ExecutionStep, CRASH_MESSAGE, TIMEOUT_MESSAGE};
