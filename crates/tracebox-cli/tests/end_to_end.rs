//! End-to-end tests that drive the real `tracebox` binary.
//!
//! Each `run`/`handle` invocation spawns a worker by re-executing the
//! same binary, so these cover the full host → worker → host path.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

fn tracebox(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tracebox"))
        .args(args)
        .env_remove("TRACEBOX_CONFIG")
        .env_remove("TRACEBOX_TIMEOUT_MS")
        .env_remove("TRACEBOX_MEMORY_LIMIT_BYTES")
        .env_remove("TRACEBOX_MAX_REPR_CHARS")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tracebox");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn run_source(source: &str, extra: &[&str]) -> Value {
    let mut args = vec!["run", "-"];
    args.extend_from_slice(extra);
    let output = tracebox(&args, source);
    assert!(
        output.status.success(),
        "tracebox failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is one JSON document")
}

#[test]
fn test_three_line_program() {
    let result = run_source("x = 1\nx = x + 1\nprint(x)\n", &[]);
    assert_eq!(
        result,
        json!({
            "steps": [
                {"line": 1, "code": "x = 1", "variables": {}},
                {"line": 2, "code": "x = x + 1", "variables": {"x": "1"}},
                {"line": 3, "code": "print(x)", "variables": {"x": "2"}, "output": "2\n"}
            ]
        })
    );
}

#[test]
fn test_division_by_zero_keeps_partial_trace() {
    let result = run_source("x = 1\ny = x / 0\nprint(y)\n", &[]);
    let steps = result["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["line"], 1);
    assert_eq!(steps[1]["line"], 2);
    assert_eq!(steps[1]["output"], "ZeroDivisionError: division by zero\n");
    assert_eq!(result["error"], "ZeroDivisionError: division by zero");
}

#[test]
fn test_infinite_loop_times_out() {
    let started = Instant::now();
    let result = run_source("while True:\n    pass\n", &["--timeout-ms", "500"]);
    assert_eq!(result, json!({"steps": [], "error": "Execution timed out"}));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_long_loop_under_default_limits() {
    let source = "total = 0\nfor i in range(2000):\n    total = total + i\nprint(total)\n";
    let result = run_source(source, &[]);
    assert!(result.get("error").is_none(), "unexpected error: {result}");
    let steps = result["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 4003);
    assert_eq!(steps.last().unwrap()["output"], "1999000\n");
}

#[test]
fn test_deep_recursion_under_default_limits() {
    let result = run_source("def f(n):\n    return f(n + 1)\nf(0)\n", &[]);
    assert_eq!(
        result["error"],
        "RecursionError: maximum recursion depth exceeded"
    );
}

#[test]
fn test_oversized_list_is_memory_error() {
    let result = run_source("x = 1\ny = [0] * 10000000\n", &[]);
    let steps = result["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(
        result["error"],
        "MemoryError: result exceeds the limit of 262144 items"
    );
}

#[test]
fn test_symbols_outside_registry_fail() {
    let result = run_source("x = 1\nf = open('/etc/passwd')\n", &[]);
    assert_eq!(result["error"], "NameError: name 'open' is not defined");
    let steps = result["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
}

#[test]
fn test_imports_are_rejected() {
    let result = run_source("import os\n", &[]);
    assert_eq!(result["steps"], json!([]));
    assert!(result["error"]
        .as_str()
        .unwrap()
        .starts_with("SyntaxError: "));
}

#[test]
fn test_step_selection() {
    let source = "a = 1\nb = 2\nc = a + b\n";
    let result = run_source(source, &["--step", "1"]);
    assert_eq!(
        result,
        json!({"steps": [{"line": 2, "code": "b = 2", "variables": {"a": "1"}}]})
    );

    let result = run_source(source, &["--step", "3"]);
    assert_eq!(result, json!({"steps": [], "error": "Step 3 out of range"}));

    let result = run_source(source, &["--step", "-1"]);
    assert_eq!(result["error"], "Step -1 out of range");
}

#[test]
fn test_long_values_are_truncated() {
    let result = run_source("s = 'x' * 1000\nn = 0\n", &["--max-repr-chars", "50"]);
    let s = result["steps"][1]["variables"]["s"].as_str().unwrap();
    assert_eq!(s.chars().count(), 50);
}

#[test]
fn test_functions_are_traced_with_their_locals() {
    let source = "def add(a, b):\n    total = a + b\n    return total\nprint(add(2, 3))\n";
    let result = run_source(source, &[]);
    let steps = result["steps"].as_array().unwrap();
    let lines: Vec<u64> = steps.iter().map(|s| s["line"].as_u64().unwrap()).collect();
    assert_eq!(lines, vec![1, 4, 2, 3]);
    assert_eq!(steps[2]["variables"], json!({"a": "2", "b": "3"}));
    assert_eq!(steps[3]["variables"], json!({"a": "2", "b": "3", "total": "5"}));
    assert_eq!(steps[3]["output"], "5\n");
}

#[test]
fn test_handle_request_from_stdin() {
    let request = json!({"code": "x = 5\nprint(x * 2)\n", "step": 1}).to_string();
    let output = tracebox(&["handle"], &request);
    assert!(output.status.success());
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        response,
        json!({"steps": [{"line": 2, "code": "print(x * 2)", "variables": {"x": "5"}, "output": "10\n"}]})
    );
}

#[test]
fn test_handle_rejects_malformed_request() {
    let output = tracebox(&["handle"], "{\"source\": 1}");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse request"));
}

#[test]
fn test_worker_protocol() {
    let request = json!({"source": "y = 3\n"}).to_string() + "\n";
    let output = tracebox(&["worker"], &request);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.matches('\n').count(), 1);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        result,
        json!({"steps": [{"line": 1, "code": "y = 3", "variables": {}}]})
    );
}

#[test]
fn test_config_file_sets_timeout() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[sandbox]\ntimeout_ms = 300").unwrap();
    let path = file.path().to_str().unwrap();

    let output = tracebox(&["--config", path, "run", "-"], "while True:\n    pass\n");
    assert!(output.status.success());
    let result: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["error"], "Execution timed out");
}

#[test]
fn test_invalid_config_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[sandbox]\ntimeout_ms = 0").unwrap();
    let path = file.path().to_str().unwrap();

    let output = tracebox(&["--config", path, "run", "-"], "x = 1\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}
