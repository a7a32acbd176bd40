//! The capability registry: the only names user code can reach.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::eval::{builtins, BindingScope, OutputSink, Value};

/// Every symbol a registry may expose.
///
/// Anything not listed here (`open`, `import`, `eval`, `exec`, `getattr`,
/// `globals`, ...) is unreachable from user code. The exception classes
/// past `NotImplementedError` are the ones the runtime itself raises or
/// that anchor the hierarchy.
pub const ALLOWED_SYMBOLS: &[&str] = &[
    // primitive constructors
    "int",
    "float",
    "str",
    "bool",
    "list",
    "dict",
    "tuple",
    // arithmetic, comparison and iteration helpers
    "abs",
    "min",
    "max",
    "sum",
    "round",
    "divmod",
    "pow",
    "len",
    "range",
    "enumerate",
    "zip",
    "sorted",
    "reversed",
    "any",
    "all",
    "chr",
    "ord",
    // introspection
    "type",
    "isinstance",
    "repr",
    // output
    "print",
    // exceptions
    "Exception",
    "ArithmeticError",
    "LookupError",
    "ValueError",
    "TypeError",
    "NameError",
    "ZeroDivisionError",
    "IndexError",
    "KeyError",
    "AttributeError",
    "RuntimeError",
    "RecursionError",
    "OverflowError",
    "AssertionError",
    "NotImplementedError",
    "BaseException",
    "UnboundLocalError",
    "MemoryError",
    "SyntaxError",
    "IndentationError",
    // base class for user classes
    "object",
];

/// Immutable set of symbols handed to one execution.
///
/// Built fresh per execution so no state leaks between runs; `print`
/// writes to the sink given at construction.
pub struct CapabilityRegistry {
    symbols: BTreeMap<&'static str, Value>,
}

impl CapabilityRegistry {
    pub fn build(output: Rc<dyn OutputSink>) -> Self {
        let symbols = builtins::standard(output)
            .into_iter()
            .filter(|(name, _)| ALLOWED_SYMBOLS.contains(name))
            .collect();
        Self { symbols }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.symbols.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.symbols.iter().map(|(name, value)| (*name, value))
    }

    /// The initial scope for an evaluator.
    pub fn scope(&self) -> BindingScope {
        BindingScope::new(self.iter())
    }
}
