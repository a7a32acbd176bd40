//! Tree-walking interpreter emitting trace events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::*;
use super::methods;
use super::ops::{binary, compare, format_value, truthy, unary};
use super::parser::parse_program;
use super::value::{
    ensure_len, Args, Class, Dict, Env, Function, Instance, Method, Raised, Value,
    MAX_SEQUENCE_LEN,
};
use super::{
    BindingKind, BindingScope, Evaluator, Fault, FrameOrigin, FrameView, Repr, TraceEvent,
    TraceEventKind, TraceHook,
};

/// Default limit on nested calls before `RecursionError`.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// The bundled [`Evaluator`].
#[derive(Debug, Clone)]
pub struct Interpreter {
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Evaluator for Interpreter {
    fn evaluate(
        &mut self,
        source: &str,
        scope: BindingScope,
        hook: &mut dyn TraceHook,
    ) -> Result<(), Fault> {
        let program = parse_program(source)?;
        let mut machine = Machine {
            hook,
            builtins: scope.into_symbols(),
            globals: Env::new(None),
            depth: 0,
            max_depth: self.max_depth,
            comp_scopes: Vec::new(),
            handling: Vec::new(),
        };
        machine.run_module(&program).map_err(Fault::from)
    }
}

enum FrameKind {
    Module,
    Function(Rc<FunctionDef>),
    Class,
}

struct Frame {
    kind: FrameKind,
    locals: Rc<Env>,
    line: Cell<usize>,
}

impl Frame {
    fn new(kind: FrameKind, locals: Rc<Env>) -> Self {
        Self {
            kind,
            locals,
            line: Cell::new(0),
        }
    }
}

impl FrameView for Frame {
    fn origin(&self) -> FrameOrigin {
        FrameOrigin::Submitted
    }

    fn visit_bindings(&self, visit: &mut dyn FnMut(&str, BindingKind, &dyn Repr)) {
        for (name, value) in self.locals.vars.borrow().iter() {
            visit(&**name, value.binding_kind(), value);
        }
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Execution state for one evaluation.
pub struct Machine<'h> {
    hook: &'h mut dyn TraceHook,
    builtins: HashMap<Rc<str>, Value>,
    globals: Rc<Env>,
    depth: usize,
    max_depth: usize,
    /// Comprehension variables, innermost last.
    comp_scopes: Vec<HashMap<Rc<str>, Value>>,
    /// Exceptions being handled, for bare `raise`.
    handling: Vec<Raised>,
}

impl<'h> Machine<'h> {
    fn run_module(&mut self, program: &[Stmt]) -> Result<(), Raised> {
        let frame = Frame::new(FrameKind::Module, self.globals.clone());
        match self.exec_block(&frame, program) {
            Ok(_) => {
                self.frame_event(&frame, TraceEventKind::Return);
                Ok(())
            }
            Err(raised) => {
                self.frame_event(&frame, TraceEventKind::Exception);
                Err(raised)
            }
        }
    }

    fn line_event(&mut self, frame: &Frame, line: usize) {
        frame.line.set(line);
        self.hook.on_event(&TraceEvent {
            kind: TraceEventKind::Line,
            line,
            frame,
        });
    }

    fn frame_event(&mut self, frame: &Frame, kind: TraceEventKind) {
        self.hook.on_event(&TraceEvent {
            kind,
            line: frame.line.get(),
            frame,
        });
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.get(name).cloned()
    }

    pub(crate) fn exception_class(&self, name: &str) -> Option<Rc<Class>> {
        match self.builtins.get(name) {
            Some(Value::Class(class)) if class.exception => Some(class.clone()),
            _ => None,
        }
    }

    // ── statements ──────────────────────────────────────

    fn exec_block(&mut self, frame: &Frame, block: &[Stmt]) -> Result<Flow, Raised> {
        for stmt in block {
            match self.exec(frame, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, frame: &Frame, stmt: &Stmt) -> Result<Flow, Raised> {
        self.line_event(frame, stmt.line);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(frame, value)?;
                for target in targets {
                    self.assign(frame, target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(frame, target, *op, value)?;
            }
            StmtKind::If { branches, orelse } => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        self.line_event(frame, branch.line);
                    }
                    if truthy(&self.eval(frame, &branch.test)?) {
                        return self.exec_block(frame, &branch.body);
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(frame, orelse);
                }
            }
            StmtKind::While { test, body, orelse } => {
                let mut first = true;
                loop {
                    if !first {
                        self.line_event(frame, stmt.line);
                    }
                    first = false;
                    if !truthy(&self.eval(frame, test)?) {
                        break;
                    }
                    match self.exec_block(frame, body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(frame, orelse);
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(frame, iter)?;
                let mut items = iter_of(&iterable)?;
                let mut first = true;
                loop {
                    if !first {
                        self.line_event(frame, stmt.line);
                    }
                    first = false;
                    let Some(item) = items.next() else { break };
                    self.assign(frame, target, item)?;
                    match self.exec_block(frame, body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(frame, orelse);
                }
            }
            StmtKind::FunctionDef(def) => {
                let function = self.make_function(frame, def)?;
                self.store_name(frame, def.name.clone(), function);
            }
            StmtKind::ClassDef { name, base, body } => {
                let class = self.define_class(frame, name, base.as_ref(), body)?;
                self.store_name(frame, name.clone(), class);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass | StmtKind::Global(_) => {}
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(frame, body, handlers, orelse.as_deref(), finalbody.as_deref()),
            StmtKind::Raise(value) => return Err(self.raise(frame, value.as_ref())?),
            StmtKind::Assert { test, msg } => {
                if !truthy(&self.eval(frame, test)?) {
                    let message = match msg {
                        Some(msg) => self.eval(frame, msg)?.to_str(),
                        None => String::new(),
                    };
                    return Err(Raised::new("AssertionError", message));
                }
            }
            StmtKind::Del(targets) => {
                for target in targets {
                    self.delete(frame, target)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        frame: &Frame,
        body: &[Stmt],
        handlers: &[Handler],
        orelse: Option<&[Stmt]>,
        finalbody: Option<&[Stmt]>,
    ) -> Result<Flow, Raised> {
        let outcome = match self.exec_block(frame, body) {
            Ok(Flow::Normal) => match orelse {
                Some(orelse) => self.exec_block(frame, orelse),
                None => Ok(Flow::Normal),
            },
            Ok(flow) => Ok(flow),
            Err(raised) => self.handle(frame, handlers, raised),
        };

        let Some(finalbody) = finalbody else {
            return outcome;
        };
        match self.exec_block(frame, finalbody)? {
            Flow::Normal => outcome,
            overriding => Ok(overriding),
        }
    }

    fn handle(
        &mut self,
        frame: &Frame,
        handlers: &[Handler],
        raised: Raised,
    ) -> Result<Flow, Raised> {
        for handler in handlers {
            self.line_event(frame, handler.line);
            let matched = match &handler.class {
                None => true,
                Some(expr) => {
                    let class = self.eval(frame, expr)?;
                    self.exception_matches(&raised, &class)?
                }
            };
            if !matched {
                continue;
            }

            let raised = self.materialize(raised);
            if let (Some(name), Some(value)) = (&handler.name, &raised.value) {
                self.store_name(frame, name.clone(), value.clone());
            }
            self.handling.push(raised);
            let result = self.exec_block(frame, &handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                self.remove_name(frame, name);
            }
            return result;
        }
        Err(raised)
    }

    /// Give a runtime-raised exception its object so handlers can bind it.
    fn materialize(&self, mut raised: Raised) -> Raised {
        if raised.value.is_some() {
            return raised;
        }
        if let Some(class) = self.exception_class(&raised.kind) {
            let instance = Instance::new(class);
            let arg = raised
                .arg
                .clone()
                .unwrap_or_else(|| Value::str(&raised.message));
            let args = if raised.message.is_empty() && raised.arg.is_none() {
                Vec::new()
            } else {
                vec![arg]
            };
            instance
                .attrs
                .borrow_mut()
                .insert(Rc::from("args"), Value::tuple(args));
            raised.value = Some(Value::Instance(instance));
        }
        raised
    }

    fn raised_class(&self, raised: &Raised) -> Option<Rc<Class>> {
        match &raised.value {
            Some(Value::Instance(instance)) => Some(instance.class.clone()),
            _ => self.exception_class(&raised.kind),
        }
    }

    fn exception_matches(&self, raised: &Raised, class: &Value) -> Result<bool, Raised> {
        match class {
            Value::Class(expected) if expected.exception => Ok(self
                .raised_class(raised)
                .is_some_and(|actual| actual.is_subclass_of(expected))),
            Value::Tuple(options) => {
                for option in options.iter() {
                    if self.exception_matches(raised, option)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Err(Raised::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            )),
        }
    }

    fn raise(&mut self, frame: &Frame, value: Option<&Expr>) -> Result<Raised, Raised> {
        let Some(expr) = value else {
            return Ok(self
                .handling
                .last()
                .cloned()
                .unwrap_or_else(|| Raised::new("RuntimeError", "No active exception to reraise")));
        };
        match self.eval(frame, expr)? {
            Value::Class(class) if class.exception => {
                match self.instantiate(&class, Args::default())? {
                    Value::Instance(instance) => Ok(Raised::from_instance(instance)),
                    _ => Ok(Raised::new(&class.name, "")),
                }
            }
            Value::Instance(instance) if instance.class.exception => {
                Ok(Raised::from_instance(instance))
            }
            _ => Ok(Raised::type_error("exceptions must derive from BaseException")),
        }
    }

    fn make_function(&mut self, frame: &Frame, def: &Rc<FunctionDef>) -> Result<Value, Raised> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(frame, expr)?),
                None => None,
            });
        }
        let enclosing = match frame.kind {
            FrameKind::Module => None,
            FrameKind::Function(_) => Some(frame.locals.clone()),
            FrameKind::Class => frame.locals.parent.clone(),
        };
        Ok(Value::Function(Rc::new(Function {
            def: def.clone(),
            defaults,
            enclosing,
        })))
    }

    fn define_class(
        &mut self,
        frame: &Frame,
        name: &Rc<str>,
        base: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<Value, Raised> {
        let base = match base {
            None => None,
            Some(expr) => match self.eval(frame, expr)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(Raised::type_error(format!(
                        "cannot inherit from '{}'",
                        other.type_name()
                    )))
                }
            },
        };

        let enclosing = match frame.kind {
            FrameKind::Module => None,
            FrameKind::Function(_) => Some(frame.locals.clone()),
            FrameKind::Class => frame.locals.parent.clone(),
        };
        let class_frame = Frame::new(FrameKind::Class, Env::new(enclosing));
        let saved = std::mem::take(&mut self.comp_scopes);
        let result = self.exec_block(&class_frame, body);
        self.comp_scopes = saved;
        match result {
            Ok(_) => self.frame_event(&class_frame, TraceEventKind::Return),
            Err(raised) => {
                self.frame_event(&class_frame, TraceEventKind::Exception);
                return Err(raised);
            }
        }

        let exception = base.as_ref().is_some_and(|b| b.exception);
        let class = Class::new(name, base, exception, false);
        let attrs = std::mem::take(&mut *class_frame.locals.vars.borrow_mut());
        *class.attrs.borrow_mut() = attrs;
        Ok(Value::Class(class))
    }

    // ── names and targets ───────────────────────────────

    fn store_name(&mut self, frame: &Frame, name: Rc<str>, value: Value) {
        match &frame.kind {
            FrameKind::Function(def) if def.globals.contains(&name) => self.globals.set(name, value),
            FrameKind::Module => self.globals.set(name, value),
            FrameKind::Function(_) | FrameKind::Class => frame.locals.set(name, value),
        }
    }

    fn remove_name(&mut self, frame: &Frame, name: &str) -> Option<Value> {
        match &frame.kind {
            FrameKind::Function(def) if def.globals.contains(name) => self.globals.remove(name),
            FrameKind::Module => self.globals.remove(name),
            FrameKind::Function(_) | FrameKind::Class => frame.locals.remove(name),
        }
    }

    fn load_name(&self, frame: &Frame, name: &Rc<str>) -> Result<Value, Raised> {
        for scope in self.comp_scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        let found = match &frame.kind {
            FrameKind::Module => self.globals.get(name),
            FrameKind::Function(def) if def.globals.contains(name) => self.globals.get(name),
            FrameKind::Function(def) if def.locals.contains(name) => {
                return frame.locals.get(name).ok_or_else(|| {
                    Raised::new(
                        "UnboundLocalError",
                        format!(
                            "cannot access local variable '{name}' where it is not associated with a value"
                        ),
                    )
                });
            }
            FrameKind::Function(_) => frame
                .locals
                .lookup_enclosing(name)
                .or_else(|| self.globals.get(name)),
            FrameKind::Class => frame
                .locals
                .get(name)
                .or_else(|| frame.locals.lookup_enclosing(name))
                .or_else(|| self.globals.get(name)),
        };
        found
            .or_else(|| self.builtins.get(name).cloned())
            .ok_or_else(|| Raised::new("NameError", format!("name '{name}' is not defined")))
    }

    fn assign(&mut self, frame: &Frame, target: &Expr, value: Value) -> Result<(), Raised> {
        match target {
            Expr::Name(name) => {
                self.store_name(frame, name.clone(), value);
                Ok(())
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                let values = unpack(&value, targets.len())?;
                for (target, value) in targets.iter().zip(values) {
                    self.assign(frame, target, value)?;
                }
                Ok(())
            }
            Expr::Attribute(object, name) => {
                let object = self.eval(frame, object)?;
                set_attr(&object, name, value)
            }
            Expr::Subscript(object, index) => {
                let object = self.eval(frame, object)?;
                let index = self.eval_index(frame, index)?;
                set_item(&object, &index, value)
            }
            _ => Err(Raised::new("SyntaxError", "cannot assign to expression")),
        }
    }

    fn aug_assign(
        &mut self,
        frame: &Frame,
        target: &Expr,
        op: BinOp,
        value: &Expr,
    ) -> Result<(), Raised> {
        match target {
            Expr::Name(name) => {
                let current = self.load_name(frame, name)?;
                let operand = self.eval(frame, value)?;
                let result = in_place(op, &current, &operand)?;
                self.store_name(frame, name.clone(), result);
            }
            Expr::Attribute(object, name) => {
                let object = self.eval(frame, object)?;
                let current = get_attr(&object, name)?;
                let operand = self.eval(frame, value)?;
                set_attr(&object, name, in_place(op, &current, &operand)?)?;
            }
            Expr::Subscript(object, index) => {
                let object = self.eval(frame, object)?;
                let index = self.eval_index(frame, index)?;
                let current = get_item(&object, &index)?;
                let operand = self.eval(frame, value)?;
                set_item(&object, &index, in_place(op, &current, &operand)?)?;
            }
            _ => return Err(Raised::new("SyntaxError", "illegal expression for augmented assignment")),
        }
        Ok(())
    }

    fn delete(&mut self, frame: &Frame, target: &Expr) -> Result<(), Raised> {
        match target {
            Expr::Name(name) => match self.remove_name(frame, name) {
                Some(_) => Ok(()),
                None => Err(Raised::new("NameError", format!("name '{name}' is not defined"))),
            },
            Expr::Tuple(targets) => {
                for target in targets {
                    self.delete(frame, target)?;
                }
                Ok(())
            }
            Expr::Attribute(object, name) => {
                let object = self.eval(frame, object)?;
                del_attr(&object, name)
            }
            Expr::Subscript(object, index) => {
                let object = self.eval(frame, object)?;
                let index = self.eval_index(frame, index)?;
                del_item(&object, &index)
            }
            _ => Err(Raised::new("SyntaxError", "cannot delete expression")),
        }
    }

    // ── expressions ─────────────────────────────────────

    fn eval(&mut self, frame: &Frame, expr: &Expr) -> Result<Value, Raised> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::FString(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        FStringPart::Literal(text) => out.push_str(text),
                        FStringPart::Field { expr, repr, spec } => {
                            let value = self.eval(frame, expr)?;
                            let text = match (repr, spec) {
                                (true, None) => value.repr(),
                                (true, Some(spec)) => format_value(&Value::str(&value.repr()), spec)?,
                                (false, Some(spec)) => format_value(&value, spec)?,
                                (false, None) => value.to_str(),
                            };
                            out.push_str(&text);
                        }
                    }
                }
                Ok(Value::str(&out))
            }
            Expr::Name(name) => self.load_name(frame, name),
            Expr::List(items) => Ok(Value::list(self.eval_all(frame, items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(frame, items)?)),
            Expr::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.eval(frame, key)?;
                    let value = self.eval(frame, value)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::Attribute(object, name) => {
                let object = self.eval(frame, object)?;
                get_attr(&object, name)
            }
            Expr::Subscript(object, index) => {
                let object = self.eval(frame, object)?;
                let index = self.eval_index(frame, index)?;
                get_item(&object, &index)
            }
            Expr::Slice { .. } => Err(Raised::type_error("slices are only valid inside subscripts")),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(frame, func)?;
                let positional = self.eval_all(frame, args)?;
                let mut evaluated = Vec::with_capacity(keywords.len());
                for (key, value) in keywords {
                    evaluated.push((key.clone(), self.eval(frame, value)?));
                }
                self.call(
                    &callee,
                    Args {
                        positional,
                        keywords: evaluated,
                    },
                )
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval(frame, operand)?;
                unary(*op, &operand)
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                binary(*op, &left, &right)
            }
            Expr::And(left, right) => {
                let left = self.eval(frame, left)?;
                if truthy(&left) {
                    self.eval(frame, right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(frame, left)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    self.eval(frame, right)
                }
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(frame, first)?;
                for (op, right) in rest {
                    let right = self.eval(frame, right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfExp { test, body, orelse } => {
                if truthy(&self.eval(frame, test)?) {
                    self.eval(frame, body)
                } else {
                    self.eval(frame, orelse)
                }
            }
            Expr::Lambda(def) => self.make_function(frame, def),
            Expr::ListComp { elt, generators } => {
                let mut items = Vec::new();
                self.comprehension(frame, generators, &mut |machine, frame| {
                    ensure_len(items.len() + 1, MAX_SEQUENCE_LEN)?;
                    items.push(machine.eval(frame, elt)?);
                    Ok(())
                })?;
                Ok(Value::list(items))
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                let mut dict = Dict::new();
                self.comprehension(frame, generators, &mut |machine, frame| {
                    let key = machine.eval(frame, key)?;
                    let value = machine.eval(frame, value)?;
                    dict.insert(key, value)
                })?;
                Ok(Value::dict(dict))
            }
        }
    }

    fn eval_all(&mut self, frame: &Frame, exprs: &[Expr]) -> Result<Vec<Value>, Raised> {
        exprs.iter().map(|expr| self.eval(frame, expr)).collect()
    }

    /// Evaluate a subscript, turning `a:b:c` into a slice value.
    fn eval_index(&mut self, frame: &Frame, index: &Expr) -> Result<Index, Raised> {
        let Expr::Slice { lower, upper, step } = index else {
            return Ok(Index::Item(self.eval(frame, index)?));
        };
        let mut bound = |expr: &Option<Box<Expr>>| -> Result<Option<i64>, Raised> {
            match expr {
                None => Ok(None),
                Some(expr) => match self.eval(frame, expr)? {
                    Value::None => Ok(None),
                    value => value.as_int().map(Some).ok_or_else(|| {
                        Raised::type_error("slice indices must be integers or None")
                    }),
                },
            }
        };
        let lower = bound(lower)?;
        let upper = bound(upper)?;
        let step = bound(step)?.unwrap_or(1);
        if step == 0 {
            return Err(Raised::value_error("slice step cannot be zero"));
        }
        Ok(Index::Slice(SliceSpec { lower, upper, step }))
    }

    fn comprehension(
        &mut self,
        frame: &Frame,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Machine<'h>, &Frame) -> Result<(), Raised>,
    ) -> Result<(), Raised> {
        self.comp_scopes.push(HashMap::new());
        let result = self.comprehension_level(frame, generators, emit);
        self.comp_scopes.pop();
        result
    }

    fn comprehension_level(
        &mut self,
        frame: &Frame,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Machine<'h>, &Frame) -> Result<(), Raised>,
    ) -> Result<(), Raised> {
        let Some((generator, rest)) = generators.split_first() else {
            return emit(self, frame);
        };
        let iterable = self.eval(frame, &generator.iter)?;
        for item in iter_of(&iterable)? {
            self.bind_comprehension_target(&generator.target, item)?;
            let mut keep = true;
            for condition in &generator.ifs {
                if !truthy(&self.eval(frame, condition)?) {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.comprehension_level(frame, rest, emit)?;
            }
        }
        Ok(())
    }

    fn bind_comprehension_target(&mut self, target: &Expr, value: Value) -> Result<(), Raised> {
        match target {
            Expr::Name(name) => {
                if let Some(scope) = self.comp_scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
            Expr::Tuple(targets) | Expr::List(targets) => {
                let values = unpack(&value, targets.len())?;
                for (target, value) in targets.iter().zip(values) {
                    self.bind_comprehension_target(target, value)?;
                }
                Ok(())
            }
            _ => Err(Raised::new(
                "SyntaxError",
                "comprehension targets must be names",
            )),
        }
    }

    // ── calls ───────────────────────────────────────────

    pub(crate) fn call(&mut self, callee: &Value, args: Args) -> Result<Value, Raised> {
        match callee {
            Value::Function(function) => self.call_function(function, None, args),
            Value::Method(method) => match &**method {
                Method::User { receiver, func } => {
                    self.call_function(func, Some(receiver.clone()), args)
                }
                Method::Native { receiver, name } => {
                    methods::call_method(self, receiver, name, args)
                }
            },
            Value::Builtin(builtin) => (builtin.func)(self, args),
            Value::Class(class) => self.instantiate(class, args),
            other => Err(Raised::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        receiver: Option<Value>,
        args: Args,
    ) -> Result<Value, Raised> {
        if self.depth >= self.max_depth {
            return Err(Raised::new(
                "RecursionError",
                "maximum recursion depth exceeded",
            ));
        }
        let locals = Env::new(function.enclosing.clone());
        bind_parameters(function, receiver, args, &locals)?;
        let frame = Frame::new(FrameKind::Function(function.def.clone()), locals);

        self.depth += 1;
        let saved = std::mem::take(&mut self.comp_scopes);
        let result = self.exec_block(&frame, &function.def.body);
        self.comp_scopes = saved;
        self.depth -= 1;

        match result {
            Ok(flow) => {
                self.frame_event(&frame, TraceEventKind::Return);
                Ok(match flow {
                    Flow::Return(value) => value,
                    _ => Value::None,
                })
            }
            Err(raised) => {
                self.frame_event(&frame, TraceEventKind::Exception);
                Err(raised)
            }
        }
    }

    pub(crate) fn instantiate(&mut self, class: &Rc<Class>, args: Args) -> Result<Value, Raised> {
        let instance = Instance::new(class.clone());
        if class.exception {
            if let Some((key, _)) = args.keywords.first() {
                return Err(Raised::type_error(format!(
                    "{}() got an unexpected keyword argument '{key}'",
                    class.name
                )));
            }
            instance.attrs.borrow_mut().insert(
                Rc::from("args"),
                Value::tuple(args.positional.clone()),
            );
        }
        match class.lookup("__init__") {
            Some(Value::Function(init)) => {
                let result = self.call_function(&init, Some(Value::Instance(instance.clone())), args)?;
                if !result.is_none() {
                    return Err(Raised::type_error(format!(
                        "__init__() should return None, not '{}'",
                        result.type_name()
                    )));
                }
            }
            Some(_) => return Err(Raised::type_error("__init__ must be a function")),
            None if !class.exception && (!args.is_empty() || !args.keywords.is_empty()) => {
                return Err(Raised::type_error(format!("{}() takes no arguments", class.name)));
            }
            None => {}
        }
        Ok(Value::Instance(instance))
    }
}

fn bind_parameters(
    function: &Function,
    receiver: Option<Value>,
    args: Args,
    locals: &Env,
) -> Result<(), Raised> {
    let def = &function.def;
    let params = &def.params;
    let positional: Vec<Value> = receiver.into_iter().chain(args.positional).collect();

    if positional.len() > params.len() {
        let required = function.defaults.iter().filter(|d| d.is_none()).count();
        let expected = if required == params.len() {
            format!(
                "{} positional argument{}",
                params.len(),
                if params.len() == 1 { "" } else { "s" }
            )
        } else {
            format!("from {required} to {} positional arguments", params.len())
        };
        return Err(Raised::type_error(format!(
            "{}() takes {expected} but {} {} given",
            def.name,
            positional.len(),
            if positional.len() == 1 { "was" } else { "were" }
        )));
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(positional) {
        *slot = Some(value);
    }
    for (key, value) in args.keywords {
        let Some(position) = params.iter().position(|p| p.name == key) else {
            return Err(Raised::type_error(format!(
                "{}() got an unexpected keyword argument '{key}'",
                def.name
            )));
        };
        if slots[position].is_some() {
            return Err(Raised::type_error(format!(
                "{}() got multiple values for argument '{key}'",
                def.name
            )));
        }
        slots[position] = Some(value);
    }

    let mut missing = Vec::new();
    for ((slot, param), default) in slots.iter_mut().zip(params).zip(&function.defaults) {
        if slot.is_none() {
            match default {
                Some(value) => *slot = Some(value.clone()),
                None => missing.push(format!("'{}'", param.name)),
            }
        }
    }
    if !missing.is_empty() {
        let count = missing.len();
        let names = match missing.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{} and {last}", rest.join(", ")),
            _ => missing.join(""),
        };
        return Err(Raised::type_error(format!(
            "{}() missing {count} required positional argument{}: {names}",
            def.name,
            if count == 1 { "" } else { "s" }
        )));
    }

    for (param, value) in params.iter().zip(slots) {
        if let Some(value) = value {
            locals.set(param.name.clone(), value);
        }
    }
    Ok(())
}

/// `a op= b`: lists extend in place, everything else rebinds.
fn in_place(op: BinOp, current: &Value, operand: &Value) -> Result<Value, Raised> {
    if let (BinOp::Add, Value::List(items)) = (op, current) {
        let extra = collect(operand)?;
        ensure_len(items.borrow().len() + extra.len(), MAX_SEQUENCE_LEN)?;
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    binary(op, current, operand)
}

fn unpack(value: &Value, expected: usize) -> Result<Vec<Value>, Raised> {
    let values = collect(value).map_err(|_| {
        Raised::type_error(format!(
            "cannot unpack non-iterable {} object",
            value.type_name()
        ))
    })?;
    match values.len() {
        n if n == expected => Ok(values),
        n if n > expected => Err(Raised::value_error(format!(
            "too many values to unpack (expected {expected})"
        ))),
        n => Err(Raised::value_error(format!(
            "not enough values to unpack (expected {expected}, got {n})"
        ))),
    }
}

// ── iteration ───────────────────────────────────────────

/// Iterator over any iterable value. Lists are read live.
pub(crate) enum PyIter {
    List {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    Values(std::vec::IntoIter<Value>),
    Range {
        next: i64,
        remaining: i64,
        step: i64,
    },
    Chars {
        text: Rc<str>,
        offset: usize,
    },
}

impl Iterator for PyIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            PyIter::List { items, index } => {
                let item = items.borrow().get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
            PyIter::Values(values) => values.next(),
            PyIter::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining <= 0 {
                    return None;
                }
                let value = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(value))
            }
            PyIter::Chars { text, offset } => {
                let c = text[*offset..].chars().next()?;
                *offset += c.len_utf8();
                Some(Value::str(c.encode_utf8(&mut [0; 4])))
            }
        }
    }
}

pub(crate) fn iter_of(value: &Value) -> Result<PyIter, Raised> {
    Ok(match value {
        Value::List(items) => PyIter::List {
            items: items.clone(),
            index: 0,
        },
        Value::Tuple(items) => PyIter::Values(items.to_vec().into_iter()),
        Value::Dict(dict) => PyIter::Values(dict.borrow().keys().into_iter()),
        Value::Str(text) => PyIter::Chars {
            text: text.clone(),
            offset: 0,
        },
        Value::Range(range) => PyIter::Range {
            next: range.start,
            remaining: range.len(),
            step: range.step,
        },
        other => {
            return Err(Raised::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    })
}

/// Materialize an iterable into a vector.
pub(crate) fn collect(value: &Value) -> Result<Vec<Value>, Raised> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Range(range) => {
            ensure_len(usize::try_from(range.len()).unwrap_or(0), MAX_SEQUENCE_LEN)?;
            Ok(iter_of(value)?.collect())
        }
        other => Ok(iter_of(other)?.collect()),
    }
}

// ── attributes and items ────────────────────────────────

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn no_attribute(value: &Value, name: &str) -> Raised {
    let message = match value {
        Value::Class(class) => format!("type object '{}' has no attribute '{name}'", class.name),
        other => format!("'{}' object has no attribute '{name}'", other.type_name()),
    };
    Raised::new("AttributeError", message)
}

pub(crate) fn get_attr(value: &Value, name: &str) -> Result<Value, Raised> {
    if is_dunder(name) {
        return match (value, name) {
            (Value::Function(f), "__name__") => Ok(Value::Str(f.def.name.clone())),
            (Value::Class(c), "__name__") => Ok(Value::Str(c.name.clone())),
            (Value::Builtin(b), "__name__") => Ok(Value::Str(b.name.clone())),
            (Value::Class(c), "__init__") => c.lookup(name).ok_or_else(|| no_attribute(value, name)),
            _ => Err(no_attribute(value, name)),
        };
    }
    match value {
        Value::Instance(instance) => {
            if let Some(found) = instance.attrs.borrow().get(name) {
                return Ok(found.clone());
            }
            match instance.class.lookup(name) {
                Some(Value::Function(func)) => Ok(Value::Method(Rc::new(Method::User {
                    receiver: value.clone(),
                    func,
                }))),
                Some(found) => Ok(found),
                None => Err(no_attribute(value, name)),
            }
        }
        Value::Class(class) => class.lookup(name).ok_or_else(|| no_attribute(value, name)),
        _ if methods::has_method(value, name) => Ok(Value::Method(Rc::new(Method::Native {
            receiver: value.clone(),
            name: Rc::from(name),
        }))),
        _ => Err(no_attribute(value, name)),
    }
}

fn set_attr(object: &Value, name: &Rc<str>, value: Value) -> Result<(), Raised> {
    if is_dunder(name) {
        return Err(Raised::new(
            "AttributeError",
            format!("cannot set attribute '{name}'"),
        ));
    }
    match object {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(name.clone(), value);
            Ok(())
        }
        Value::Class(class) if !class.builtin => {
            class.attrs.borrow_mut().insert(name.clone(), value);
            Ok(())
        }
        other => Err(no_attribute(other, name)),
    }
}

fn del_attr(object: &Value, name: &str) -> Result<(), Raised> {
    let removed = match object {
        Value::Instance(instance) => instance.attrs.borrow_mut().remove(name),
        Value::Class(class) if !class.builtin => class.attrs.borrow_mut().remove(name),
        _ => None,
    };
    removed.map(|_| ()).ok_or_else(|| no_attribute(object, name))
}

pub(crate) struct SliceSpec {
    lower: Option<i64>,
    upper: Option<i64>,
    step: i64,
}

impl SliceSpec {
    /// Positions selected from a sequence of `len` items.
    fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let clamp = |bound: i64, low: i64, high: i64| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(low, high)
        };
        let mut out = Vec::new();
        if self.step > 0 {
            let start = self.lower.map_or(0, |b| clamp(b, 0, len));
            let stop = self.upper.map_or(len, |b| clamp(b, 0, len));
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                i += self.step;
            }
        } else {
            let start = self.lower.map_or(len - 1, |b| clamp(b, -1, len - 1));
            let stop = self.upper.map_or(-1, |b| clamp(b, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                i += self.step;
            }
        }
        out
    }

    fn is_contiguous(&self) -> bool {
        self.step == 1
    }
}

pub(crate) enum Index {
    Item(Value),
    Slice(SliceSpec),
}

fn position(index: &Value, len: usize, kind: &str) -> Result<Option<usize>, Raised> {
    let Some(i) = index.as_int() else {
        return Err(Raised::type_error(format!(
            "{kind} indices must be integers or slices, not {}",
            index.type_name()
        )));
    };
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    Ok((0..len).contains(&i).then_some(i as usize))
}

fn get_item(object: &Value, index: &Index) -> Result<Value, Raised> {
    match (object, index) {
        (Value::List(items), Index::Item(i)) => {
            let items = items.borrow();
            position(i, items.len(), "list")?
                .map(|p| items[p].clone())
                .ok_or_else(|| Raised::index_error("list index out of range"))
        }
        (Value::List(items), Index::Slice(slice)) => {
            let items = items.borrow();
            Ok(Value::list(
                slice.indices(items.len()).into_iter().map(|p| items[p].clone()).collect(),
            ))
        }
        (Value::Tuple(items), Index::Item(i)) => position(i, items.len(), "tuple")?
            .map(|p| items[p].clone())
            .ok_or_else(|| Raised::index_error("tuple index out of range")),
        (Value::Tuple(items), Index::Slice(slice)) => Ok(Value::tuple(
            slice.indices(items.len()).into_iter().map(|p| items[p].clone()).collect(),
        )),
        (Value::Str(text), index) => {
            let chars: Vec<char> = text.chars().collect();
            match index {
                Index::Item(i) => position(i, chars.len(), "string")?
                    .map(|p| Value::str(chars[p].encode_utf8(&mut [0; 4])))
                    .ok_or_else(|| Raised::index_error("string index out of range")),
                Index::Slice(slice) => Ok(Value::str(
                    &slice.indices(chars.len()).into_iter().map(|p| chars[p]).collect::<String>(),
                )),
            }
        }
        (Value::Range(range), Index::Item(i)) => {
            let len = usize::try_from(range.len()).unwrap_or(0);
            position(i, len, "range")?
                .and_then(|p| range.get(p as i64))
                .map(Value::Int)
                .ok_or_else(|| Raised::index_error("range object index out of range"))
        }
        (Value::Range(range), Index::Slice(slice)) => {
            let len = usize::try_from(range.len()).unwrap_or(0);
            Ok(Value::list(
                slice
                    .indices(len)
                    .into_iter()
                    .filter_map(|p| range.get(p as i64).map(Value::Int))
                    .collect(),
            ))
        }
        (Value::Dict(dict), Index::Item(key)) => dict
            .borrow()
            .get(key)?
            .ok_or_else(|| Raised::key_error(key)),
        (Value::Dict(_), Index::Slice(_)) => Err(Raised::type_error("unhashable type: 'slice'")),
        (other, _) => Err(Raised::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(object: &Value, index: &Index, value: Value) -> Result<(), Raised> {
    match (object, index) {
        (Value::List(items), Index::Item(i)) => {
            let mut items = items.borrow_mut();
            let p = position(i, items.len(), "list")?
                .ok_or_else(|| Raised::index_error("list assignment index out of range"))?;
            items[p] = value;
            Ok(())
        }
        (Value::List(items), Index::Slice(slice)) => {
            let replacement = collect(&value)?;
            let mut items = items.borrow_mut();
            let positions = slice.indices(items.len());
            if slice.is_contiguous() {
                let start = slice
                    .lower
                    .map_or(0, |b| if b < 0 { (b + items.len() as i64).max(0) } else { b })
                    .min(items.len() as i64) as usize;
                let end = positions.last().map_or(start, |last| last + 1);
                items.splice(start..end.max(start), replacement);
                return Ok(());
            }
            if positions.len() != replacement.len() {
                return Err(Raised::value_error(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    replacement.len(),
                    positions.len()
                )));
            }
            for (p, value) in positions.into_iter().zip(replacement) {
                items[p] = value;
            }
            Ok(())
        }
        (Value::Dict(dict), Index::Item(key)) => dict.borrow_mut().insert(key.clone(), value),
        (other, _) => Err(Raised::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn del_item(object: &Value, index: &Index) -> Result<(), Raised> {
    match (object, index) {
        (Value::List(items), Index::Item(i)) => {
            let mut items = items.borrow_mut();
            let p = position(i, items.len(), "list")?
                .ok_or_else(|| Raised::index_error("list assignment index out of range"))?;
            items.remove(p);
            Ok(())
        }
        (Value::List(items), Index::Slice(slice)) => {
            let mut items = items.borrow_mut();
            let mut positions = slice.indices(items.len());
            positions.sort_unstable();
            for p in positions.into_iter().rev() {
                items.remove(p);
            }
            Ok(())
        }
        (Value::Dict(dict), Index::Item(key)) => dict
            .borrow_mut()
            .remove(key)?
            .map(|_| ())
            .ok_or_else(|| Raised::key_error(key)),
        (other, _) => Err(Raised::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}
