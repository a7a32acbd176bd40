//! Ordered step accumulation and the fault policy.

use crate::domain::{ExecutionResult, ExecutionStep};
use crate::eval::Fault;

/// Accumulates steps in execution order and packages the final result.
///
/// Output that arrives before the first step is carried: it prefixes the
/// first recorded step, or the error text if the program faults before
/// any step exists.
#[derive(Debug, Default)]
pub struct StepRecorder {
    steps: Vec<ExecutionStep>,
    carried: String,
}

impl StepRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mut step: ExecutionStep) {
        if !self.carried.is_empty() {
            let mut output = std::mem::take(&mut self.carried);
            output.push_str(step.output.as_deref().unwrap_or_default());
            step.output = Some(output);
        }
        self.steps.push(step);
    }

    /// Append `text` to the most recent step's output.
    pub fn append_output(&mut self, text: &str) {
        match self.steps.last_mut() {
            Some(step) => step.append_output(text),
            None => self.carried.push_str(text),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Close the recording.
    ///
    /// A fault before any step yields `{steps: [], error}`, prefixed by any
    /// carried output. A fault after progress keeps every step, appends the
    /// fault on its own line to the last step's output and sets `error`.
    pub fn finish(mut self, fault: Option<Fault>) -> ExecutionResult {
        let Some(fault) = fault else {
            return ExecutionResult::new(self.steps, None);
        };
        let message = fault.to_string();

        match self.steps.last_mut() {
            None => ExecutionResult::failure(format!("{}{message}", self.carried)),
            Some(last) => {
                if last.output.as_deref().is_some_and(|text| !text.ends_with('\n')) {
                    last.append_output("\n");
                }
                last.append_output(&format!("{message}\n"));
                ExecutionResult::new(self.steps, Some(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn step(line: usize, output: Option<&str>) -> ExecutionStep {
        ExecutionStep {
            line,
            code: String::new(),
            variables: BTreeMap::new(),
            output: output.map(String::from),
        }
    }

    #[test]
    fn test_success_keeps_order() {
        let mut recorder = StepRecorder::new();
        recorder.record(step(1, None));
        recorder.record(step(2, Some("hi\n")));
        recorder.record(step(1, None));
        let result = recorder.finish(None);
        assert!(result.error.is_none());
        let lines: Vec<usize> = result.steps.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 2, 1]);
    }

    #[test]
    fn test_fault_without_steps() {
        let result = StepRecorder::new().finish(Some(Fault::new("SyntaxError", "invalid syntax")));
        assert!(result.steps.is_empty());
        assert_eq!(result.error.as_deref(), Some("SyntaxError: invalid syntax"));
    }

    #[test]
    fn test_fault_after_steps_annotates_last_step() {
        let mut recorder = StepRecorder::new();
        recorder.record(step(1, None));
        recorder.record(step(2, None));
        let result = recorder.finish(Some(Fault::new("ZeroDivisionError", "division by zero")));
        assert_eq!(result.steps.len(), 2);
        assert_eq!(
            result.steps[1].output.as_deref(),
            Some("ZeroDivisionError: division by zero\n")
        );
        assert_eq!(
            result.error.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
    }

    #[test]
    fn test_fault_note_starts_on_its_own_line() {
        let mut recorder = StepRecorder::new();
        recorder.record(step(1, Some("partial")));
        let result = recorder.finish(Some(Fault::new("ValueError", "bad")));
        assert_eq!(result.steps[0].output.as_deref(), Some("partial\nValueError: bad\n"));
    }

    #[test]
    fn test_carried_output_prefixes_first_step() {
        let mut recorder = StepRecorder::new();
        recorder.append_output("early ");
        recorder.record(step(1, Some("late")));
        assert_eq!(recorder.steps()[0].output.as_deref(), Some("early late"));
    }

    #[test]
    fn test_carried_output_prefixes_error() {
        let mut recorder = StepRecorder::new();
        recorder.append_output("boot\n");
        let result = recorder.finish(Some(Fault::new("RuntimeError", "x")));
        assert_eq!(result.error.as_deref(), Some("boot\nRuntimeError: x"));
    }

    #[test]
    fn test_append_goes_to_last_step() {
        let mut recorder = StepRecorder::new();
        recorder.record(step(1, Some("a")));
        recorder.record(step(2, None));
        recorder.append_output("b");
        recorder.append_output("c");
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.steps()[0].output.as_deref(), Some("a"));
        assert_eq!(recorder.steps()[1].output.as_deref(), Some("bc"));
    }
}
