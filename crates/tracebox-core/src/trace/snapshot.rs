//! Variable snapshots rendered under a character budget.

use std::collections::BTreeMap;
use std::fmt;

use crate::eval::{BindingKind, FrameView, Repr};

/// Cap on each rendered value, in characters.
pub const DEFAULT_MAX_REPR_CHARS: usize = 200;

/// A `fmt::Write` sink that accepts at most `limit` characters.
///
/// Once full it rejects further writes with `fmt::Error`, which stops a
/// well-behaved [`Repr`] from rendering the rest of a large value.
#[derive(Debug)]
pub struct BoundedWriter {
    buf: String,
    remaining: usize,
    truncated: bool,
}

impl BoundedWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            remaining: limit,
            truncated: false,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.remaining == 0 {
                self.truncated = true;
                return Err(fmt::Error);
            }
            self.buf.push(c);
            self.remaining -= 1;
        }
        Ok(())
    }
}

/// Representation of `value`, cut to its first `limit` characters.
pub fn bounded_repr(value: &dyn Repr, limit: usize) -> String {
    let mut writer = BoundedWriter::new(limit);
    // An error here only means the writer is full.
    let _ = value.write_repr(&mut writer);
    writer.into_string()
}

/// Bindings the evaluator keeps for itself (`__name__`, `__builtins__`, ...).
pub fn is_internal(name: &str) -> bool {
    name.starts_with("__")
}

/// Snapshot the data bindings of `frame`.
pub fn capture(frame: &dyn FrameView, limit: usize) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();
    frame.visit_bindings(&mut |name, kind, value| {
        if kind == BindingKind::Data && !is_internal(name) {
            variables.insert(name.to_string(), bounded_repr(value, limit));
        }
    });
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{FrameOrigin, Value};

    struct Frame(Vec<(&'static str, Value)>);

    impl FrameView for Frame {
        fn origin(&self) -> FrameOrigin {
            FrameOrigin::Submitted
        }

        fn visit_bindings(&self, visit: &mut dyn FnMut(&str, BindingKind, &dyn Repr)) {
            for (name, value) in &self.0 {
                visit(name, value.binding_kind(), value);
            }
        }
    }

    #[test]
    fn test_bounded_repr_truncates() {
        let long = Value::str(&"a".repeat(500));
        let rendered = bounded_repr(&long, 200);
        assert_eq!(rendered.chars().count(), 200);
        assert!(rendered.starts_with("'aaa"));

        let short = Value::Int(42);
        assert_eq!(bounded_repr(&short, 200), "42");
    }

    #[test]
    fn test_bounded_writer_exact_fit_is_not_truncated() {
        use std::fmt::Write;
        let mut writer = BoundedWriter::new(3);
        assert!(writer.write_str("abc").is_ok());
        assert!(!writer.is_truncated());
        assert!(writer.write_str("d").is_err());
        assert!(writer.is_truncated());
        assert_eq!(writer.into_string(), "abc");
    }

    #[test]
    fn test_huge_list_renders_within_budget() {
        let list = Value::list((0..1_000_000).map(Value::Int).collect());
        let rendered = bounded_repr(&list, 20);
        assert_eq!(rendered, "[0, 1, 2, 3, 4, 5, 6");
    }

    #[test]
    fn test_capture_skips_internal_and_callables() {
        let frame = Frame(vec![
            ("x", Value::Int(1)),
            ("__name__", Value::str("__main__")),
            (
                "len",
                crate::eval::value::Builtin::function("len", |_, _| Ok(Value::None)),
            ),
            ("name", Value::str("ada")),
        ]);
        let snapshot = capture(&frame, 200);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["x"], "1");
        assert_eq!(snapshot["name"], "'ada'");
    }
}
