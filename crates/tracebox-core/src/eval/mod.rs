//! Evaluator interface and the reference interpreter.
//!
//! The tracer only depends on the traits in this module: an [`Evaluator`]
//! runs source against a [`BindingScope`] and reports progress to a
//! [`TraceHook`] through [`TraceEvent`]s, each exposing the executing
//! frame as a [`FrameView`]. Any interpreter or VM able to emit
//! line-boundary and frame-state events can drive the tracer.
//!
//! [`Interpreter`] is the bundled implementation: a tree-walking
//! interpreter for a small Python-flavoured teaching language.

pub mod ast;
pub(crate) mod builtins;
pub mod interp;
pub(crate) mod lexer;
pub(crate) mod methods;
pub(crate) mod ops;
pub(crate) mod parser;
pub mod value;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub use interp::Interpreter;
pub use value::Value;

/// A fault that escaped the evaluated program.
///
/// Displays as `"{kind}: {message}"`, e.g. `NameError: name 'x' is not defined`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}

/// What happened at a trace callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEventKind {
    /// A line is about to execute.
    Line,
    /// A frame finished normally.
    Return,
    /// A frame is unwinding because of a fault.
    Exception,
}

/// Where the code of a frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// The frame executes the submitted source.
    Submitted,
    /// Evaluator-internal code; never traced.
    Internal,
}

/// Coarse classification of a binding, used to filter snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Numbers, strings, containers, `None`, instances.
    Data,
    /// Functions, lambdas, bound methods, built-in callables.
    Callable,
    /// Classes and built-in types.
    Type,
}

/// Something that can render its representation into a writer.
///
/// Writers may refuse further input (returning `fmt::Error`) once they have
/// enough; implementations must stop writing when that happens.
pub trait Repr {
    fn write_repr(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Read-only view of the frame that produced an event.
pub trait FrameView {
    fn origin(&self) -> FrameOrigin;

    /// Call `visit` once per live binding of this frame.
    fn visit_bindings(&self, visit: &mut dyn FnMut(&str, BindingKind, &dyn Repr));
}

/// A single callback from the evaluator.
pub struct TraceEvent<'a> {
    pub kind: TraceEventKind,
    /// 1-based line of the event (the last executed line for return/exception).
    pub line: usize,
    pub frame: &'a dyn FrameView,
}

/// Receiver of trace events. Called synchronously on the evaluating thread.
pub trait TraceHook {
    fn on_event(&mut self, event: &TraceEvent<'_>);
}

/// Destination of everything user code prints.
pub trait OutputSink {
    fn write(&self, text: &str);
}

/// The initial scope handed to an evaluator: no user bindings, plus the
/// symbols of one capability registry.
#[derive(Clone, Default)]
pub struct BindingScope {
    builtins: HashMap<Rc<str>, Value>,
}

impl BindingScope {
    pub fn new<'a>(symbols: impl IntoIterator<Item = (&'a str, &'a Value)>) -> Self {
        Self {
            builtins: symbols
                .into_iter()
                .map(|(name, value)| (Rc::from(name), value.clone()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.builtins.get(name)
    }

    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }

    pub(crate) fn into_symbols(self) -> HashMap<Rc<str>, Value> {
        self.builtins
    }
}

/// Runs source text and reports line-level progress.
pub trait Evaluator {
    /// Execute `source` against `scope`, calling `hook` at every line
    /// boundary and at every frame return or unwind.
    ///
    /// Returns the fault that escaped the program, if any.
    fn evaluate(
        &mut self,
        source: &str,
        scope: BindingScope,
        hook: &mut dyn TraceHook,
    ) -> Result<(), Fault>;
}
