//! Request adapter for an external transport (HTTP handler, queue consumer).
//!
//! The transport deserializes a [`RunRequest`], calls [`handle_request`],
//! and serializes the returned [`RunResponse`] as-is.

use serde::{Deserialize, Serialize};

use crate::domain::ExecutionResult;
use crate::sandbox::{ExecutionOptions, Executor};

/// Inbound payload: `{"code": "...", "step": 3}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
}

/// Outbound payload: `{"steps": [...], "error": "..."}`.
pub type RunResponse = ExecutionResult;

/// Execute one request with `defaults`, selecting `request.step` if set.
pub async fn handle_request(
    executor: &dyn Executor,
    request: RunRequest,
    defaults: &ExecutionOptions,
) -> RunResponse {
    let options = defaults.clone().with_step(request.step);
    executor.execute(&request.code, &options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::ExecutionStep;

    /// Records what it was asked to run and applies step selection like the host.
    #[derive(Default)]
    struct FakeExecutor {
        seen: Mutex<Vec<(String, ExecutionOptions)>>,
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn execute(&self, source: &str, options: &ExecutionOptions) -> ExecutionResult {
            self.seen
                .lock()
                .unwrap()
                .push((source.to_string(), options.clone()));
            let steps = (1..=3)
                .map(|line| ExecutionStep {
                    line,
                    code: String::new(),
                    variables: BTreeMap::new(),
                    output: None,
                })
                .collect();
            let result = ExecutionResult::new(steps, None);
            match options.step_index {
                Some(index) => result.select_step(index),
                None => result,
            }
        }
    }

    #[test]
    fn test_request_deserializes_without_step() {
        let request: RunRequest = serde_json::from_str(r#"{"code":"x = 1"}"#).unwrap();
        assert_eq!(request.code, "x = 1");
        assert_eq!(request.step, None);
    }

    #[tokio::test]
    async fn test_handle_request_forwards_code_and_defaults() {
        let executor = FakeExecutor::default();
        let defaults = ExecutionOptions::default().with_timeout_ms(900);
        let request = RunRequest {
            code: "print(1)".into(),
            step: None,
        };

        let response = handle_request(&executor, request, &defaults).await;
        assert_eq!(response.steps.len(), 3);

        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[0].0, "print(1)");
        assert_eq!(seen[0].1.timeout_ms, 900);
        assert_eq!(seen[0].1.step_index, None);
    }

    #[tokio::test]
    async fn test_handle_request_selects_step() {
        let executor = FakeExecutor::default();
        let defaults = ExecutionOptions::default();

        let response = handle_request(
            &executor,
            RunRequest {
                code: String::new(),
                step: Some(1),
            },
            &defaults,
        )
        .await;
        assert_eq!(response.steps.len(), 1);
        assert_eq!(response.steps[0].line, 2);

        let response = handle_request(
            &executor,
            RunRequest {
                code: String::new(),
                step: Some(3),
            },
            &defaults,
        )
        .await;
        assert!(response.steps.is_empty());
        assert_eq!(response.error.as_deref(), Some("Step 3 out of range"));
        assert_eq!(defaults.step_index, None);
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(RunResponse::timed_out()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"steps": [], "error": "Execution timed out"})
        );
    }
}
