//! The trace hook that turns evaluator events into steps.

use std::rc::Rc;

use tracing::{debug, trace};

use super::output::OutputMultiplexer;
use super::recorder::StepRecorder;
use super::snapshot::capture;
use super::TraceLimits;
use crate::domain::{ExecutionResult, ExecutionStep};
use crate::eval::{Fault, FrameOrigin, TraceEvent, TraceEventKind, TraceHook};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerState {
    Idle,
    Tracing,
    Finalizing,
}

/// Records one step per line event of the submitted source.
///
/// Each step carries the output written since the previous callback.
/// A line event snapshots the frame and drains that output into the new
/// step, so what line k prints shows up on step k + 1. Return and
/// exception events drain into the last step instead.
///
/// After `max_steps` steps the tracer stops recording and discards output,
/// leaving a runaway program to the host's timeout.
pub struct StepTracer {
    state: TracerState,
    lines: Vec<String>,
    output: Rc<OutputMultiplexer>,
    recorder: StepRecorder,
    limits: TraceLimits,
    saturated: bool,
}

impl StepTracer {
    pub fn new(source: &str, output: Rc<OutputMultiplexer>, limits: TraceLimits) -> Self {
        Self {
            state: TracerState::Idle,
            lines: source
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect(),
            output,
            recorder: StepRecorder::new(),
            limits,
            saturated: false,
        }
    }

    pub fn state(&self) -> TracerState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == TracerState::Idle {
            self.state = TracerState::Tracing;
        }
    }

    /// Stop tracing and package the recorded steps with `fault`.
    pub fn finish(mut self, fault: Option<Fault>) -> ExecutionResult {
        self.state = TracerState::Finalizing;
        if let Some(rest) = self.output.drain() {
            if !self.saturated {
                self.recorder.append_output(&rest);
            }
        }
        trace!(steps = self.recorder.len(), faulted = fault.is_some(), "trace finished");

        let mut result = self.recorder.finish(fault);
        if self.saturated && result.error.is_none() {
            result.error = Some(format!("Step limit of {} exceeded", self.limits.max_steps));
        }
        result
    }

    /// Text of the 1-based `line`, empty when out of range.
    fn source_line(&self, line: usize) -> String {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .cloned()
            .unwrap_or_default()
    }
}

impl TraceHook for StepTracer {
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        if self.state != TracerState::Tracing || event.frame.origin() != FrameOrigin::Submitted {
            return;
        }
        if self.saturated {
            self.output.drain();
            return;
        }
        match event.kind {
            TraceEventKind::Line if self.recorder.len() >= self.limits.max_steps => {
                debug!(max_steps = self.limits.max_steps, "step limit reached, recording stopped");
                self.saturated = true;
                self.output.drain();
            }
            TraceEventKind::Line => {
                let step = ExecutionStep {
                    line: event.line,
                    code: self.source_line(event.line),
                    variables: capture(event.frame, self.limits.max_repr_chars),
                    output: self.output.drain(),
                };
                self.recorder.record(step);
            }
            TraceEventKind::Return | TraceEventKind::Exception => {
                if let Some(text) = self.output.drain() {
                    self.recorder.append_output(&text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{BindingKind, FrameView, Repr, Value};

    struct Frame {
        origin: FrameOrigin,
        x: Value,
    }

    impl FrameView for Frame {
        fn origin(&self) -> FrameOrigin {
            self.origin
        }

        fn visit_bindings(&self, visit: &mut dyn FnMut(&str, BindingKind, &dyn Repr)) {
            visit("x", BindingKind::Data, &self.x);
        }
    }

    fn submitted(x: i64) -> Frame {
        Frame {
            origin: FrameOrigin::Submitted,
            x: Value::Int(x),
        }
    }

    fn event(kind: TraceEventKind, line: usize, frame: &Frame) -> TraceEvent<'_> {
        TraceEvent { kind, line, frame }
    }

    fn tracer(source: &str, output: Rc<OutputMultiplexer>) -> StepTracer {
        StepTracer::new(source, output, TraceLimits::default())
    }

    #[test]
    fn test_idle_tracer_ignores_events() {
        let mut tracer = tracer("x = 1", Rc::new(OutputMultiplexer::new()));
        tracer.on_event(&event(TraceEventKind::Line, 1, &submitted(1)));
        assert_eq!(tracer.state(), TracerState::Idle);
        assert!(tracer.finish(None).steps.is_empty());
    }

    #[test]
    fn test_line_events_record_steps() {
        let output = Rc::new(OutputMultiplexer::new());
        let mut tracer = tracer("x = 1\nprint(x)", output.clone());
        tracer.start();
        assert_eq!(tracer.state(), TracerState::Tracing);
        let frame = submitted(1);

        tracer.on_event(&event(TraceEventKind::Line, 1, &frame));
        tracer.on_event(&event(TraceEventKind::Line, 2, &frame));
        output.write("1\n");
        tracer.on_event(&event(TraceEventKind::Return, 2, &frame));

        let result = tracer.finish(None);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].code, "x = 1");
        assert_eq!(result.steps[0].variables["x"], "1");
        assert_eq!(result.steps[0].output, None);
        assert_eq!(result.steps[1].code, "print(x)");
        assert_eq!(result.steps[1].output.as_deref(), Some("1\n"));
    }

    #[test]
    fn test_internal_frames_are_ignored() {
        let mut tracer = tracer("x = 1", Rc::new(OutputMultiplexer::new()));
        tracer.start();
        let frame = Frame {
            origin: FrameOrigin::Internal,
            x: Value::Int(1),
        };
        tracer.on_event(&event(TraceEventKind::Line, 1, &frame));
        assert!(tracer.finish(None).steps.is_empty());
    }

    #[test]
    fn test_out_of_range_line_has_empty_code() {
        let mut tracer = tracer("x = 1\r\ny = 2", Rc::new(OutputMultiplexer::new()));
        tracer.start();
        let frame = submitted(1);
        tracer.on_event(&event(TraceEventKind::Line, 1, &frame));
        tracer.on_event(&event(TraceEventKind::Line, 7, &frame));
        tracer.on_event(&event(TraceEventKind::Line, 0, &frame));
        let result = tracer.finish(None);
        assert_eq!(result.steps[0].code, "x = 1");
        assert_eq!(result.steps[1].code, "");
        assert_eq!(result.steps[2].code, "");
    }

    #[test]
    fn test_return_output_is_appended_not_replaced() {
        let output = Rc::new(OutputMultiplexer::new());
        let mut tracer = tracer("a\nb", output.clone());
        tracer.start();
        let frame = submitted(0);
        tracer.on_event(&event(TraceEventKind::Line, 1, &frame));
        output.write("one\n");
        tracer.on_event(&event(TraceEventKind::Return, 1, &frame));
        output.write("two\n");
        tracer.on_event(&event(TraceEventKind::Exception, 1, &frame));
        let result = tracer.finish(None);
        assert_eq!(result.steps[0].output.as_deref(), Some("one\ntwo\n"));
    }

    #[test]
    fn test_step_limit_stops_recording() {
        let output = Rc::new(OutputMultiplexer::new());
        let limits = TraceLimits {
            max_steps: 2,
            ..TraceLimits::default()
        };
        let mut tracer = StepTracer::new("loop", output.clone(), limits);
        tracer.start();
        let frame = submitted(0);
        for _ in 0..5 {
            output.write("tick\n");
            tracer.on_event(&event(TraceEventKind::Line, 1, &frame));
        }
        let result = tracer.finish(None);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.error.as_deref(), Some("Step limit of 2 exceeded"));
    }
}
