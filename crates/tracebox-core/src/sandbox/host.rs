//! The isolation host: one fresh worker process per execution.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use super::channel::{decode_result, encode_request, WorkerRequest};
use super::error::{SandboxError, SandboxResult};
use super::execution::{ExecutionOptions, Executor};
use crate::domain::ExecutionResult;
use crate::metrics::METRICS;
use crate::obs;

/// Worker stderr kept in the debug log.
const STDERR_LOG_LIMIT: usize = 2048;

/// How to start a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Re-run the current binary with its hidden `worker` subcommand.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }

    /// Start a worker with an empty environment, the temp dir as working
    /// directory and all three standard streams piped.
    fn spawn(&self) -> SandboxResult<WorkerHandle> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .current_dir(std::env::temp_dir())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!(pid = ?child.id(), "worker spawned");
        Ok(WorkerHandle { child })
    }
}

/// A live worker process, killed when the handle is dropped.
pub struct WorkerHandle {
    child: Child,
}

impl WorkerHandle {
    /// Send `request`, then collect the result line and reap the process.
    async fn exchange(&mut self, request: &[u8]) -> SandboxResult<ExecutionResult> {
        if let Some(mut stdin) = self.child.stdin.take() {
            match stdin.write_all(request).await {
                Ok(()) => {}
                // The worker may exit before reading; its result (or lack of one) decides.
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    debug!("worker closed stdin before the request was written");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let stdout = self.child.stdout.take().ok_or_else(|| {
            SandboxError::Channel(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "worker stdout unavailable",
            ))
        })?;
        let stderr = self.child.stderr.take();

        let read_result = async move {
            let mut line = String::new();
            BufReader::new(stdout).read_line(&mut line).await.map(|_| line)
        };
        let read_diagnostics = async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                if let Err(err) = stderr.read_to_end(&mut buf).await {
                    debug!(error = %err, "failed to read worker stderr");
                }
            }
            buf
        };
        let (line, diagnostics) = tokio::join!(read_result, read_diagnostics);
        let status = self.child.wait().await?;
        log_diagnostics(&diagnostics);

        let line = line?;
        if line.trim().is_empty() {
            return Err(SandboxError::WorkerExited {
                status: status.to_string(),
            });
        }
        decode_result(&line)
    }

    /// Kill the worker and wait for it to be reaped.
    async fn kill(&mut self) {
        if let Err(err) = self.child.kill().await {
            warn!(error = %err, "failed to kill worker");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Already-exited workers make this a no-op.
        let _ = self.child.start_kill();
    }
}

fn log_diagnostics(stderr: &[u8]) {
    if stderr.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(stderr);
    let shown: String = text.chars().take(STDERR_LOG_LIMIT).collect();
    debug!(stderr = %shown, truncated = shown.len() < text.len(), "worker diagnostics");
}

/// Supervises isolated executions.
///
/// Holds only read-only configuration; every call spawns its own worker
/// and shares nothing with concurrent calls.
#[derive(Debug, Clone)]
pub struct IsolationHost {
    command: WorkerCommand,
}

impl IsolationHost {
    pub fn new(command: WorkerCommand) -> Self {
        Self { command }
    }

    /// A host whose workers are the running binary.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(WorkerCommand::current_exe()?))
    }

    /// Run `source` in a fresh worker and return its trace.
    ///
    /// Timeouts yield `"Execution timed out"`; any other worker failure
    /// yields `"Execution failed unexpectedly"`, both with no steps. Step
    /// selection, if requested, is applied to the worker's result.
    pub async fn execute(&self, source: &str, options: &ExecutionOptions) -> ExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        let span = obs::execution_span(&execution_id);
        self.supervise(&execution_id, source, options)
            .instrument(span)
            .await
    }

    async fn supervise(
        &self,
        execution_id: &str,
        source: &str,
        options: &ExecutionOptions,
    ) -> ExecutionResult {
        let started = Instant::now();
        METRICS.inc_executions();
        obs::emit_execution_started(execution_id, source.len(), options.timeout_ms);

        let result = match self.attempt(execution_id, source, options).await {
            Ok(result) => result,
            Err(err) => {
                if err.is_timeout() {
                    METRICS.inc_timeouts();
                    obs::emit_execution_timed_out(execution_id, options.timeout_ms);
                } else {
                    METRICS.inc_worker_failures();
                    obs::emit_worker_failed(execution_id, &err);
                }
                err.into_result()
            }
        };
        METRICS.add_steps(result.steps.len() as u64);

        let result = match options.step_index {
            Some(index) => {
                let available = result.steps.len();
                let selected = result.select_step(index);
                if available > 0 && selected.steps.is_empty() {
                    obs::emit_step_out_of_range(execution_id, index, available);
                }
                selected
            }
            None => result,
        };

        obs::emit_execution_finished(
            execution_id,
            started.elapsed().as_millis() as u64,
            result.steps.len(),
            result.is_success(),
        );
        result
    }

    async fn attempt(
        &self,
        execution_id: &str,
        source: &str,
        options: &ExecutionOptions,
    ) -> SandboxResult<ExecutionResult> {
        let request = WorkerRequest {
            execution_id: execution_id.to_string(),
            source: source.to_string(),
            limits: options.resource_limits(),
            trace: options.trace,
        };
        let payload = encode_request(&request)?;
        let mut worker = self.command.spawn()?;

        let limit = Duration::from_millis(options.timeout_ms);
        let outcome = tokio::time::timeout(limit, worker.exchange(&payload)).await;
        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                worker.kill().await;
                Err(SandboxError::Timeout {
                    limit_ms: options.timeout_ms,
                })
            }
        }
    }
}

#[async_trait]
impl Executor for IsolationHost {
    async fn execute(&self, source: &str, options: &ExecutionOptions) -> ExecutionResult {
        IsolationHost::execute(self, source, options).await
    }
}

/// Run `source` in a worker spawned from the current binary.
///
/// The binary must dispatch its `worker` subcommand to
/// [`serve`](super::worker::serve).
pub async fn execute_isolated(source: &str, options: &ExecutionOptions) -> ExecutionResult {
    match IsolationHost::current_exe() {
        Ok(host) => host.execute(source, options).await,
        Err(err) => {
            warn!(error = %err, "cannot locate worker binary");
            METRICS.inc_worker_failures();
            ExecutionResult::failed_unexpectedly()
        }
    }
}
