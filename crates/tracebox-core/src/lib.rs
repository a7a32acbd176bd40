//! tracebox core library
//!
//! Sandboxed, line-by-line execution tracing for submitted programs:
//! an isolation host that runs each program in a fresh worker process
//! under resource ceilings, a capability-restricted evaluator, and a step
//! tracer that records the executing line, variable snapshot and output
//! increment at every line boundary.

pub mod api;
pub mod config;
pub mod domain;
pub mod eval;
pub mod metrics;
pub mod obs;
pub mod sandbox;
pub mod telemetry;
pub mod trace;

pub use api::{handle_request, RunRequest, RunResponse};
pub use config::TraceboxConfig;
pub use domain::{
    ExecutionResult, ExecutionStep, Result, TraceboxError, CRASH_MESSAGE, TIMEOUT_MESSAGE,
};
pub use eval::{Evaluator, Fault, Interpreter};
pub use sandbox::{
    execute_isolated, CapabilityRegistry, ExecutionOptions, Executor, IsolationHost,
    ResourceLimits, WorkerCommand,
};
pub use trace::{trace_source, TraceLimits};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
