//! Isolation host behaviour against stand-in workers written in `sh`.
#![cfg(unix)]

use std::time::{Duration, Instant};

use tracebox_core::{
    ExecutionOptions, Executor, IsolationHost, WorkerCommand, CRASH_MESSAGE, TIMEOUT_MESSAGE,
};

const THREE_STEPS: &str = r#"{"steps":[{"line":1,"code":"x = 1","variables":{},"output":null},{"line":2,"code":"x = x + 1","variables":{"x":"1"},"output":null},{"line":3,"code":"print(x)","variables":{"x":"2"},"output":"2\n"}],"error":null}"#;

fn sh(script: impl Into<String>) -> IsolationHost {
    IsolationHost::new(
        WorkerCommand::new("/bin/sh")
            .arg("-c")
            .arg(script.into()),
    )
}

fn replying(result: &str) -> IsolationHost {
    sh(format!("read request; printf '%s\\n' '{result}'"))
}

#[tokio::test]
async fn test_relays_worker_result() {
    let result = replying(THREE_STEPS)
        .execute("ignored", &ExecutionOptions::default())
        .await;
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.steps[2].output.as_deref(), Some("2\n"));
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_relays_through_executor_trait() {
    let host = replying(THREE_STEPS);
    let executor: &dyn Executor = &host;
    let result = executor
        .execute("ignored", &ExecutionOptions::default())
        .await;
    assert_eq!(result.steps.len(), 3);
}

#[tokio::test]
async fn test_worker_not_reading_stdin_is_tolerated() {
    let host = sh(format!("exec 0<&-; printf '%s\\n' '{THREE_STEPS}'"));
    let result = host.execute("x = 1", &ExecutionOptions::default()).await;
    assert_eq!(result.steps.len(), 3);
}

#[tokio::test]
async fn test_stderr_noise_is_ignored() {
    let host = sh(format!(
        "read request; echo 'warning: noisy worker' >&2; printf '%s\\n' '{THREE_STEPS}'"
    ));
    let result = host.execute("x = 1", &ExecutionOptions::default()).await;
    assert_eq!(result.steps.len(), 3);
}

#[tokio::test]
async fn test_step_selection_applies_to_worker_result() {
    let host = replying(THREE_STEPS);

    let options = ExecutionOptions::default().with_step(Some(1));
    let result = host.execute("x = 1", &options).await;
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].line, 2);

    let options = ExecutionOptions::default().with_step(Some(3));
    let result = host.execute("x = 1", &options).await;
    assert!(result.steps.is_empty());
    assert_eq!(result.error.as_deref(), Some("Step 3 out of range"));
}

#[tokio::test]
async fn test_runaway_worker_times_out() {
    let host = sh("while :; do :; done");
    let options = ExecutionOptions::default().with_timeout_ms(200);

    let started = Instant::now();
    let result = host.execute("while True: pass", &options).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.steps.is_empty());
    assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
}

#[tokio::test]
async fn test_worker_is_reaped_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("worker.pid");
    let host = sh(format!(
        "echo $$ > '{}'; while :; do :; done",
        pid_file.display()
    ));
    let options = ExecutionOptions::default().with_timeout_ms(300);

    let result = host.execute("", &options).await;
    assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));

    let pid: libc::pid_t = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    assert!(!alive, "worker {pid} still running after timeout");
}

#[tokio::test]
async fn test_nonzero_exit_is_a_crash() {
    let result = sh("read request; exit 3")
        .execute("x = 1", &ExecutionOptions::default())
        .await;
    assert!(result.steps.is_empty());
    assert_eq!(result.error.as_deref(), Some(CRASH_MESSAGE));
}

#[tokio::test]
async fn test_garbage_reply_is_a_crash() {
    let result = replying("this is not json")
        .execute("x = 1", &ExecutionOptions::default())
        .await;
    assert_eq!(result.error.as_deref(), Some(CRASH_MESSAGE));
}

#[tokio::test]
async fn test_silent_exit_is_a_crash() {
    let result = sh("read request; exit 0")
        .execute("x = 1", &ExecutionOptions::default())
        .await;
    assert_eq!(result.error.as_deref(), Some(CRASH_MESSAGE));
}

#[tokio::test]
async fn test_missing_worker_binary_is_a_crash() {
    let host = IsolationHost::new(WorkerCommand::new("/nonexistent/tracebox-worker"));
    let result = host.execute("x = 1", &ExecutionOptions::default()).await;
    assert!(result.steps.is_empty());
    assert_eq!(result.error.as_deref(), Some(CRASH_MESSAGE));
}

#[tokio::test]
async fn test_worker_environment_is_cleared() {
    std::env::set_var("TRACEBOX_HOST_MARKER", "leaked");
    let host = sh(format!(
        "read request; if [ -z \"$TRACEBOX_HOST_MARKER\" ]; then printf '%s\\n' '{THREE_STEPS}'; fi"
    ));
    let result = host.execute("x = 1", &ExecutionOptions::default()).await;
    assert_eq!(result.steps.len(), 3);
}

#[tokio::test]
async fn test_request_carries_execution_id() {
    let host = sh(format!(
        "read request; case \"$request\" in *'\"execution_id\":\"'?*) printf '%s\\n' '{THREE_STEPS}';; esac"
    ));
    let result = host.execute("x = 1", &ExecutionOptions::default()).await;
    assert_eq!(result.steps.len(), 3);
}
