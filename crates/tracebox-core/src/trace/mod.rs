//! Step tracing: turns evaluator callbacks into an ordered trace.
//!
//! - [`output`]: `OutputMultiplexer`, the buffer behind `print`
//! - [`snapshot`]: bounded rendering of frame bindings
//! - [`recorder`]: `StepRecorder` and the fault policy
//! - [`tracer`]: `StepTracer`, the `TraceHook` tying them together

pub mod output;
pub mod recorder;
pub mod snapshot;
pub mod tracer;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub use output::OutputMultiplexer;
pub use recorder::StepRecorder;
pub use snapshot::{bounded_repr, capture, BoundedWriter, DEFAULT_MAX_REPR_CHARS};
pub use tracer::{StepTracer, TracerState};

use crate::domain::ExecutionResult;
use crate::eval::Evaluator;
use crate::sandbox::CapabilityRegistry;

/// Steps recorded before the tracer stops.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Bounds on what one trace may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceLimits {
    /// Characters kept of each variable's representation.
    pub max_repr_chars: usize,
    pub max_steps: usize,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            max_repr_chars: DEFAULT_MAX_REPR_CHARS,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Run `source` under a fresh registry and tracer, returning the trace.
///
/// Runs in-process with no isolation; the worker calls this after the
/// resource governor has been applied.
pub fn trace_source(
    evaluator: &mut dyn Evaluator,
    source: &str,
    limits: TraceLimits,
) -> ExecutionResult {
    let output = Rc::new(OutputMultiplexer::new());
    let registry = CapabilityRegistry::build(output.clone());
    let mut tracer = StepTracer::new(source, output, limits);

    tracer.start();
    let outcome = evaluator.evaluate(source, registry.scope(), &mut tracer);
    tracer.finish(outcome.err())
}
