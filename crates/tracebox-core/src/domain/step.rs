//! Execution steps and the result envelope returned for every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Error reported when the worker exceeded its wall-clock budget.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Error reported when the worker died or closed its channel without a result.
pub const CRASH_MESSAGE: &str = "Execution failed unexpectedly";

/// One observation of program progress, taken at a line boundary.
///
/// `variables` holds the truncated representation of every data binding in
/// the executing frame. `output` is the text written since the previous
/// trace callback; it is absent when nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// 1-based source line about to execute.
    pub line: usize,
    /// Text of that source line (empty when the line is out of range).
    pub code: String,
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExecutionStep {
    /// Append `text` to this step's output, creating it if absent.
    pub fn append_output(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.output.as_mut() {
            Some(existing) => existing.push_str(text),
            None => self.output = Some(text.to_string()),
        }
    }
}

/// Ordered steps plus an optional top-level error.
///
/// A non-empty `steps` and a present `error` may co-occur: the program
/// faulted after making progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub steps: Vec<ExecutionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn new(steps: Vec<ExecutionStep>, error: Option<String>) -> Self {
        Self { steps, error }
    }

    /// Host-synthesized result for a worker killed at its deadline.
    pub fn timed_out() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }

    /// Host-synthesized result for a worker that never delivered a result.
    pub fn failed_unexpectedly() -> Self {
        Self::failure(CRASH_MESSAGE)
    }

    /// Empty trace carrying only `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Concatenation of every step's output, in order.
    pub fn combined_output(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| step.output.as_deref())
            .collect()
    }

    /// Reduce the trace to the single step at `index`.
    ///
    /// Returns `"Step {index} out of range"` with no steps when `index` is
    /// negative or not below the recorded length. A result that already
    /// failed without any steps (timeout, crash, syntax error) is returned
    /// unchanged so its error is not masked. The error of a faulted trace is
    /// kept alongside the selected step.
    pub fn select_step(self, index: i64) -> Self {
        if self.steps.is_empty() && self.error.is_some() {
            return self;
        }

        let position = usize::try_from(index)
            .ok()
            .filter(|position| *position < self.steps.len());

        match position {
            Some(position) => {
                let Self { mut steps, error } = self;
                let step = steps.swap_remove(position);
                Self {
                    steps: vec![step],
                    error,
                }
            }
            None => Self::failure(format!("Step {index} out of range")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(line: usize, output: Option<&str>) -> ExecutionStep {
        ExecutionStep {
            line,
            code: format!("line {line}"),
            variables: BTreeMap::new(),
            output: output.map(String::from),
        }
    }

    fn three_steps() -> ExecutionResult {
        ExecutionResult::new(
            vec![step(1, None), step(2, Some("a\n")), step(3, Some("b\n"))],
            None,
        )
    }

    #[test]
    fn test_select_step_in_range() {
        for k in 0..3 {
            let selected = three_steps().select_step(k);
            assert_eq!(selected.steps.len(), 1);
            assert_eq!(selected.steps[0].line, k as usize + 1);
            assert!(selected.error.is_none());
        }
    }

    #[test]
    fn test_select_step_out_of_range() {
        let selected = three_steps().select_step(3);
        assert!(selected.steps.is_empty());
        assert_eq!(selected.error.as_deref(), Some("Step 3 out of range"));

        let selected = three_steps().select_step(-1);
        assert_eq!(selected.error.as_deref(), Some("Step -1 out of range"));
    }

    #[test]
    fn test_select_step_keeps_fault_error() {
        let mut result = three_steps();
        result.error = Some("ZeroDivisionError: division by zero".to_string());
        let selected = result.select_step(0);
        assert_eq!(selected.steps.len(), 1);
        assert_eq!(
            selected.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_select_step_passes_host_failures_through() {
        let selected = ExecutionResult::timed_out().select_step(0);
        assert_eq!(selected, ExecutionResult::timed_out());
    }

    #[test]
    fn test_select_step_on_empty_success_is_out_of_range() {
        let selected = ExecutionResult::default().select_step(0);
        assert_eq!(selected.error.as_deref(), Some("Step 0 out of range"));
    }

    #[test]
    fn test_append_output_creates_then_extends() {
        let mut s = step(1, None);
        s.append_output("");
        assert!(s.output.is_none());
        s.append_output("x");
        s.append_output("y");
        assert_eq!(s.output.as_deref(), Some("xy"));
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(three_steps().combined_output(), "a\nb\n");
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let json = serde_json::to_value(three_steps()).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["steps"][0].get("output").is_none());
        assert_eq!(json["steps"][1]["output"], "a\n");
        assert_eq!(json["steps"][0]["code"], "line 1");
    }
}
