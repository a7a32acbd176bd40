//! Properties of in-process traces produced by the bundled interpreter.

use std::rc::Rc;

use tracebox_core::eval::{BindingScope, TraceEvent, TraceEventKind, TraceHook};
use tracebox_core::trace::OutputMultiplexer;
use tracebox_core::{trace_source, CapabilityRegistry, Evaluator, ExecutionResult, Interpreter, TraceLimits};

fn trace(source: &str) -> ExecutionResult {
    trace_source(&mut Interpreter::new(), source, TraceLimits::default())
}

fn lines(result: &ExecutionResult) -> Vec<usize> {
    result.steps.iter().map(|step| step.line).collect()
}

#[derive(Default)]
struct LineCounter(usize);

impl TraceHook for LineCounter {
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        if event.kind == TraceEventKind::Line {
            self.0 += 1;
        }
    }
}

fn line_events(source: &str) -> usize {
    let registry = CapabilityRegistry::build(Rc::new(OutputMultiplexer::new()));
    let mut counter = LineCounter::default();
    Interpreter::new()
        .evaluate(source, registry.scope(), &mut counter)
        .unwrap();
    counter.0
}

const PROGRAMS: &[&str] = &[
    "x = 1\nx = x + 1\nprint(x)\n",
    "total = 0\nfor i in range(4):\n    total += i\n    print(total)\nprint('done')\n",
    "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\nprint(fact(5))\n",
    "n = 0\nwhile n < 3:\n    n += 1\nelse:\n    print('end', n)\n",
    "words = ['b', 'a', 'c']\nwords.sort()\nfor w in words:\n    print(w, end=' ')\nprint()\n",
    "class Counter:\n    def __init__(self):\n        self.n = 0\n    def bump(self):\n        self.n += 1\n        return self.n\nc = Counter()\nc.bump()\nprint(c.bump())\n",
];

#[test]
fn test_step_count_matches_line_events() {
    for source in PROGRAMS {
        let result = trace(source);
        assert!(result.error.is_none(), "{source}: {:?}", result.error);
        assert_eq!(result.steps.len(), line_events(source), "{source}");
    }
}

#[test]
fn test_outputs_concatenate_to_program_output() {
    let result = trace(PROGRAMS[1]);
    assert_eq!(result.combined_output(), "0\n1\n3\n6\ndone\n");

    let result = trace(PROGRAMS[4]);
    assert_eq!(result.combined_output(), "a b c \n");
}

#[test]
fn test_every_step_code_matches_its_line() {
    for source in PROGRAMS {
        let source_lines: Vec<&str> = source.split('\n').collect();
        for step in trace(source).steps {
            assert_eq!(step.code, source_lines[step.line - 1]);
        }
    }
}

#[test]
fn test_three_line_example() {
    let result = trace(PROGRAMS[0]);
    assert_eq!(lines(&result), vec![1, 2, 3]);
    assert!(result.steps[0].variables.is_empty());
    assert_eq!(result.steps[1].variables["x"], "1");
    assert_eq!(result.steps[2].variables["x"], "2");
    assert_eq!(result.steps[0].output, None);
    assert_eq!(result.steps[1].output, None);
    assert_eq!(result.steps[2].output.as_deref(), Some("2\n"));
}

#[test]
fn test_loop_headers_are_revisited() {
    let result = trace("for i in range(2):\n    pass\n");
    assert_eq!(lines(&result), vec![1, 2, 1, 2, 1]);
}

#[test]
fn test_output_attaches_to_following_step() {
    let result = trace("print('a')\nx = 1\n");
    assert_eq!(lines(&result), vec![1, 2]);
    assert_eq!(result.steps[0].output, None);
    assert_eq!(result.steps[1].output.as_deref(), Some("a\n"));
}

#[test]
fn test_last_step_collects_trailing_output() {
    let result = trace("print(1)\nprint(2)\n");
    assert_eq!(result.steps[0].output, None);
    assert_eq!(result.steps[1].output.as_deref(), Some("1\n2\n"));
}

#[test]
fn test_oversized_list_is_memory_error() {
    let result = trace("x = 1\ny = [0] * 10000000\n");
    assert_eq!(lines(&result), vec![1, 2]);
    assert_eq!(
        result.error.as_deref(),
        Some("MemoryError: result exceeds the limit of 262144 items")
    );
    assert_eq!(
        result.steps[1].output.as_deref(),
        Some("MemoryError: result exceeds the limit of 262144 items\n")
    );
}

#[test]
fn test_growth_by_extend_is_capped() {
    let result = trace("xs = [0] * 200000\nxs.extend(xs)\n");
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("MemoryError: ")));
}

#[test]
fn test_fault_after_progress_is_annotated() {
    let result = trace("x = 1\nprint('before')\ny = x / 0\nprint('after')\n");
    assert_eq!(lines(&result), vec![1, 2, 3]);
    assert_eq!(
        result.steps[2].output.as_deref(),
        Some("before\nZeroDivisionError: division by zero\n")
    );
    assert_eq!(
        result.error.as_deref(),
        Some("ZeroDivisionError: division by zero")
    );
}

#[test]
fn test_syntax_error_has_no_steps() {
    let result = trace("x = (1,\n");
    assert!(result.steps.is_empty());
    assert!(result.error.unwrap().starts_with("SyntaxError: "));
}

#[test]
fn test_unlisted_symbols_are_name_errors() {
    for name in ["open", "eval", "exec", "__import__", "globals", "getattr", "input"] {
        let result = trace(&format!("{name}('x')\n"));
        assert_eq!(
            result.error.as_deref(),
            Some(format!("NameError: name '{name}' is not defined").as_str())
        );
        assert_eq!(result.steps.len(), 1);
    }
}

#[test]
fn test_dunder_attributes_are_unreachable() {
    let result = trace("x = (1).__class__\n");
    assert!(result.error.unwrap().starts_with("AttributeError: "));
}

#[test]
fn test_snapshots_hold_only_data() {
    let source = "import_ok = True\ndef f():\n    pass\nclass K:\n    pass\ng = lambda: 0\nk = K()\nend = 1\n";
    let result = trace(source);
    let last = result.steps.last().unwrap();
    let names: Vec<&str> = last.variables.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["import_ok", "k"]);
    assert_eq!(last.variables["k"], "<__main__.K object>");
}

#[test]
fn test_representations_are_capped() {
    let limits = TraceLimits {
        max_repr_chars: 10,
        ..TraceLimits::default()
    };
    let result = trace_source(
        &mut Interpreter::new(),
        "xs = list(range(100000))\ns = 'y' * 5\nend = 0\n",
        limits,
    );
    let last = result.steps.last().unwrap();
    assert_eq!(last.variables["xs"], "[0, 1, 2, ");
    assert_eq!(last.variables["s"], "'yyyyy'");
}

#[test]
fn test_default_cap_is_200_chars() {
    let result = trace("s = 'z' * 1000\nend = 0\n");
    assert_eq!(result.steps[1].variables["s"].chars().count(), 200);
}

#[test]
fn test_step_limit_reports_error() {
    let limits = TraceLimits {
        max_steps: 50,
        ..TraceLimits::default()
    };
    let result = trace_source(
        &mut Interpreter::new(),
        "n = 0\nwhile n < 100:\n    n += 1\n",
        limits,
    );
    assert_eq!(result.steps.len(), 50);
    assert_eq!(result.error.as_deref(), Some("Step limit of 50 exceeded"));
}

#[test]
fn test_caught_exceptions_do_not_fault() {
    let source = "try:\n    d = {}\n    d['k']\nexcept KeyError as e:\n    print('missing', e)\n";
    let result = trace(source);
    assert!(result.error.is_none());
    assert_eq!(result.combined_output(), "missing 'k'\n");
}

#[test]
fn test_runaway_recursion_is_a_fault() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| trace("def f(n):\n    return f(n + 1)\nf(0)\n"))
        .unwrap();
    let result = handle.join().unwrap();
    assert_eq!(
        result.error.as_deref(),
        Some("RecursionError: maximum recursion depth exceeded")
    );
    assert!(!result.steps.is_empty());
}

#[test]
fn test_registry_scope_is_fresh_per_execution() {
    let first = trace("print = 5\nx = print\n");
    assert!(first.error.is_none());
    let second = trace("print('still here')\n");
    assert_eq!(second.combined_output(), "still here\n");
}

#[test]
fn test_binding_scope_can_be_empty() {
    let mut counter = LineCounter::default();
    let err = Interpreter::new()
        .evaluate("print(1)\n", BindingScope::default(), &mut counter)
        .unwrap_err();
    assert_eq!(err.to_string(), "NameError: name 'print' is not defined");
}
