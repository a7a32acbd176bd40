//! Sandbox: isolated, resource-limited execution of submitted programs.
//!
//! The host side spawns one worker process per execution, sends it a
//! single request, and races its single result against a wall-clock
//! timeout. The worker side applies resource ceilings, builds a fresh
//! capability registry and runs the traced evaluation.
//!
//! # Modules
//!
//! - [`capability`]: `CapabilityRegistry`, the allowlist of reachable symbols
//! - [`governor`]: `ResourceLimits` / `ResourceGovernor` (`setrlimit`)
//! - [`channel`]: `WorkerRequest` and the one-line JSON protocol
//! - [`execution`]: `ExecutionOptions` and the `Executor` trait
//! - [`host`]: `IsolationHost`, `WorkerHandle`, `execute_isolated()`
//! - [`worker`]: `serve()`, the worker process entry point
//! - [`error`]: `SandboxError` / `SandboxResult`

pub mod capability;
pub mod channel;
pub mod error;
pub mod execution;
pub mod governor;
pub mod host;
pub mod worker;

pub use capability::{CapabilityRegistry, ALLOWED_SYMBOLS};
pub use channel::{decode_result, encode_request, read_request, ResultChannel, WorkerRequest};
pub use error::{SandboxError, SandboxResult};
pub use execution::{
    ExecutionOptions, Executor, DEFAULT_MEMORY_LIMIT_BYTES, DEFAULT_TIMEOUT_MS,
};
pub use governor::{GovernorReport, ResourceGovernor, ResourceLimits};
pub use host::{execute_isolated, IsolationHost, WorkerCommand, WorkerHandle};
pub use worker::serve;
