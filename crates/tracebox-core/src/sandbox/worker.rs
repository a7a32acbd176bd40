//! The code that runs inside an isolated worker process.

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing::{debug, warn};

use super::channel::{read_request, ResultChannel};
use super::error::{SandboxError, SandboxResult};
use super::governor::ResourceGovernor;
use crate::domain::ExecutionResult;
use crate::eval::Interpreter;
use crate::obs::ExecutionSpan;
use crate::trace::{trace_source, TraceLimits};

/// Stack reserved for the evaluation thread.
pub const EVAL_STACK_BYTES: usize = 16 * 1024 * 1024;

/// Serve one request: read it from `input`, apply the resource governor,
/// run the traced evaluation and write exactly one result to `output`.
///
/// An error means no result was written; the host reports the worker as
/// crashed.
pub fn serve<R: BufRead, W: Write>(input: R, output: W) -> SandboxResult<()> {
    let request = read_request(input)?;
    let _span = ExecutionSpan::enter(&request.execution_id);
    let report = ResourceGovernor::apply(&request.limits);
    debug!(
        source_bytes = request.source.len(),
        memory_applied = report.memory_applied,
        cpu_applied = report.cpu_applied,
        "worker request received"
    );

    let result = run_traced(Arc::from(request.source), request.trace).ok_or_else(|| {
        SandboxError::WorkerExited {
            status: "evaluation panicked".to_string(),
        }
    })?;
    ResultChannel::new(output).send(&result)
}

/// Evaluate on a thread with a generous stack, or inline if none can be made.
fn run_traced(source: Arc<str>, limits: TraceLimits) -> Option<ExecutionResult> {
    let shared = Arc::clone(&source);
    let spawned = std::thread::Builder::new()
        .name("tracebox-eval".to_string())
        .stack_size(EVAL_STACK_BYTES)
        .spawn(move || trace_source(&mut Interpreter::new(), &shared, limits));

    match spawned {
        Ok(handle) => handle.join().ok(),
        Err(err) => {
            warn!(error = %err, "evaluation thread unavailable, running inline");
            Some(trace_source(&mut Interpreter::new(), &source, limits))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::channel::{decode_result, encode_request, WorkerRequest};

    fn serve_source(source: &str) -> ExecutionResult {
        let request = encode_request(&WorkerRequest::new(source)).unwrap();
        let mut out = Vec::new();
        serve(&request[..], &mut out).unwrap();
        decode_result(&String::from_utf8(out).unwrap()).unwrap()
    }

    #[test]
    fn test_serve_writes_trace() {
        let result = serve_source("x = 1\nx = x + 1\nprint(x)\n");
        assert!(result.error.is_none());
        assert_eq!(result.steps.len(), 3);
        assert_eq!(result.steps[2].output.as_deref(), Some("2\n"));
    }

    #[test]
    fn test_serve_reports_faults_in_result() {
        let result = serve_source("x = 1\ny = x / 0\n");
        assert_eq!(
            result.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_serve_survives_deep_recursion() {
        let result = serve_source("def f(n):\n    return f(n + 1)\nf(0)\n");
        assert_eq!(
            result.error.as_deref(),
            Some("RecursionError: maximum recursion depth exceeded")
        );
    }

    #[test]
    fn test_serve_without_request_writes_nothing() {
        let mut out = Vec::new();
        assert!(serve(&b""[..], &mut out).is_err());
        assert!(out.is_empty());
    }
}
