//! Runtime values and their textual representations.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::ast::FunctionDef;
use super::interp::Machine;
use super::{BindingKind, Fault, Repr};

/// Deepest container nesting rendered before eliding with `...`.
const MAX_REPR_DEPTH: usize = 100;

/// Most items one list, tuple or dict may hold.
pub const MAX_SEQUENCE_LEN: usize = 1 << 18;

/// Most bytes one string may hold.
pub const MAX_STR_LEN: usize = 1 << 22;

/// `MemoryError` when a result of `len` items would exceed `limit`.
pub fn ensure_len(len: usize, limit: usize) -> Result<(), Raised> {
    if len > limit {
        return Err(Raised::new(
            "MemoryError",
            format!("result exceeds the limit of {limit} items"),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Range(Range),
    Function(Rc<Function>),
    Builtin(Rc<Builtin>),
    Method(Rc<Method>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Str(Rc::from(text))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::from(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    /// Python-visible type name, as used in error messages.
    pub fn type_name(&self) -> Rc<str> {
        let name = match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(b) => match b.kind {
                BuiltinKind::Function => "builtin_function_or_method",
                BuiltinKind::Type => "type",
            },
            Value::Method(m) => match **m {
                Method::User { .. } => "method",
                Method::Native { .. } => "builtin_function_or_method",
            },
            Value::Class(_) => "type",
            Value::Instance(instance) => return instance.class.name.clone(),
        };
        Rc::from(name)
    }

    pub fn binding_kind(&self) -> BindingKind {
        match self {
            Value::Function(_) | Value::Method(_) => BindingKind::Callable,
            Value::Builtin(b) => match b.kind {
                BuiltinKind::Function => BindingKind::Callable,
                BuiltinKind::Type => BindingKind::Type,
            },
            Value::Class(_) => BindingKind::Type,
            _ => BindingKind::Data,
        }
    }

    pub fn hash_key(&self) -> Result<HashKey, Raised> {
        Ok(match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(i64::from(*b)),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.2e18 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(
                items
                    .iter()
                    .map(Value::hash_key)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Range(r) => HashKey::Range(r.start, r.stop, r.step),
            Value::List(_) | Value::Dict(_) => {
                return Err(Raised::new(
                    "TypeError",
                    format!("unhashable type: '{}'", self.type_name()),
                ))
            }
            Value::Function(f) => HashKey::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Builtin(b) => HashKey::Identity(Rc::as_ptr(b) as *const () as usize),
            Value::Method(m) => HashKey::Identity(Rc::as_ptr(m) as *const () as usize),
            Value::Class(c) => HashKey::Identity(Rc::as_ptr(c) as *const () as usize),
            Value::Instance(i) => HashKey::Identity(Rc::as_ptr(i) as *const () as usize),
        })
    }

    /// `repr(value)`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_value(self, &mut out, &mut Vec::new(), true);
        out
    }

    /// `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Instance(instance) if instance.class.exception => instance.message(),
            _ => self.repr(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

impl Repr for Value {
    fn write_repr(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write_value(self, out, &mut Vec::new(), true)
    }
}

/// Identity of a mutable container, used for cycle detection while printing.
fn container_id(value: &Value) -> Option<usize> {
    match value {
        Value::List(l) => Some(Rc::as_ptr(l) as *const () as usize),
        Value::Dict(d) => Some(Rc::as_ptr(d) as *const () as usize),
        _ => None,
    }
}

fn write_value(
    value: &Value,
    out: &mut dyn fmt::Write,
    seen: &mut Vec<usize>,
    repr: bool,
) -> fmt::Result {
    match value {
        Value::None => out.write_str("None"),
        Value::Bool(true) => out.write_str("True"),
        Value::Bool(false) => out.write_str("False"),
        Value::Int(i) => write!(out, "{i}"),
        Value::Float(f) => out.write_str(&float_repr(*f)),
        Value::Str(s) if repr => write_str_repr(s, out),
        Value::Str(s) => out.write_str(s),
        Value::List(_) | Value::Dict(_) | Value::Tuple(_) if seen.len() >= MAX_REPR_DEPTH => {
            out.write_str("...")
        }
        Value::List(items) => {
            let id = container_id(value).unwrap_or_default();
            if seen.contains(&id) {
                return out.write_str("[...]");
            }
            seen.push(id);
            out.write_char('[')?;
            // A failed write leaves `seen` dirty; the caller abandons it.
            write_items(&items.borrow(), out, seen)?;
            seen.pop();
            out.write_char(']')
        }
        Value::Tuple(items) => {
            seen.push(0);
            out.write_char('(')?;
            write_items(items, out, seen)?;
            if items.len() == 1 {
                out.write_char(',')?;
            }
            seen.pop();
            out.write_char(')')
        }
        Value::Dict(dict) => {
            let id = container_id(value).unwrap_or_default();
            if seen.contains(&id) {
                return out.write_str("{...}");
            }
            seen.push(id);
            out.write_char('{')?;
            for (i, (key, val)) in dict.borrow().iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_value(key, out, seen, true)?;
                out.write_str(": ")?;
                write_value(val, out, seen, true)?;
            }
            seen.pop();
            out.write_char('}')
        }
        Value::Range(r) => {
            if r.step == 1 {
                write!(out, "range({}, {})", r.start, r.stop)
            } else {
                write!(out, "range({}, {}, {})", r.start, r.stop, r.step)
            }
        }
        Value::Function(func) => write!(out, "<function {}>", func.def.name),
        Value::Builtin(b) => match b.kind {
            BuiltinKind::Function => write!(out, "<built-in function {}>", b.name),
            BuiltinKind::Type => write!(out, "<class '{}'>", b.name),
        },
        Value::Method(m) => match &**m {
            Method::User { receiver, func } => write!(
                out,
                "<bound method {}.{}>",
                receiver.type_name(),
                func.def.name
            ),
            Method::Native { receiver, name } => write!(
                out,
                "<built-in method {} of {} object>",
                name,
                receiver.type_name()
            ),
        },
        Value::Class(class) => write!(out, "<class '{}'>", class.qualified_name()),
        Value::Instance(instance) if instance.class.exception => {
            write!(out, "{}(", instance.class.name)?;
            write_items(&instance.args(), out, seen)?;
            out.write_char(')')
        }
        Value::Instance(instance) => {
            write!(out, "<{} object>", instance.class.qualified_name())
        }
    }
}

fn write_items(items: &[Value], out: &mut dyn fmt::Write, seen: &mut Vec<usize>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write_value(item, out, seen, true)?;
    }
    Ok(())
}

/// String literal form: single quotes unless the text holds a single quote
/// and no double quote.
fn write_str_repr(s: &str, out: &mut dyn fmt::Write) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if c == quote => {
                out.write_char('\\')?;
                out.write_char(c)?;
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(out, "\\x{:02x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char(quote)
}

/// Shortest round-trip float text, switching to exponent notation outside
/// `1e-4 <= |f| < 1e16`.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{f:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let plain = format!("{f}");
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

/// Text of an exception built from `args`: empty, the single argument's
/// `str`, or the tuple's repr.
pub fn exception_message(args: &[Value]) -> String {
    match args {
        [] => String::new(),
        [single] => single.to_str(),
        many => Value::tuple(many.to_vec()).repr(),
    }
}

/// Dictionary key identity: equal numbers share a key regardless of type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Range(i64, i64, i64),
    Identity(usize),
}

/// Insertion-ordered mapping.
#[derive(Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: HashMap<HashKey, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Raised> {
        let hash = key.hash_key()?;
        Ok(self.index.get(&hash).map(|&i| self.entries[i].1.clone()))
    }

    pub fn contains(&self, key: &Value) -> Result<bool, Raised> {
        Ok(self.index.contains_key(&key.hash_key()?))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), Raised> {
        let hash = key.hash_key()?;
        match self.index.get(&hash) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                ensure_len(self.entries.len() + 1, MAX_SEQUENCE_LEN)?;
                self.index.insert(hash, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, Raised> {
        let hash = key.hash_key()?;
        let Some(position) = self.index.remove(&hash) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    pub fn pop_last(&mut self) -> Option<(Value, Value)> {
        let (key, value) = self.entries.pop()?;
        if let Ok(hash) = key.hash_key() {
            self.index.remove(&hash);
        }
        Some((key, value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn items(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> i64 {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            0
        } else {
            let step = self.step.unsigned_abs() as i64;
            (span - 1) / step + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: i64) -> Option<i64> {
        if (0..self.len()).contains(&index) {
            Some(self.start + index * self.step)
        } else {
            None
        }
    }
}

/// Variables of one scope, chained to the scope it was defined in.
#[derive(Default)]
pub struct Env {
    pub vars: RefCell<HashMap<Rc<str>, Value>>,
    pub parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new(parent: Option<Rc<Env>>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    pub fn set(&self, name: Rc<str>, value: Value) {
        self.vars.borrow_mut().insert(name, value);
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.vars.borrow_mut().remove(name)
    }

    /// Look `name` up in the enclosing scopes, innermost first.
    pub fn lookup_enclosing(&self, name: &str) -> Option<Value> {
        let mut scope = self.parent.as_deref();
        while let Some(env) = scope {
            if let Some(value) = env.get(name) {
                return Some(value);
            }
            scope = env.parent.as_deref();
        }
        None
    }
}

pub struct Function {
    pub def: Rc<FunctionDef>,
    /// Evaluated default per parameter, `None` for required ones.
    pub defaults: Vec<Option<Value>>,
    pub enclosing: Option<Rc<Env>>,
}

pub struct Class {
    pub name: Rc<str>,
    pub base: Option<Rc<Class>>,
    pub attrs: RefCell<HashMap<Rc<str>, Value>>,
    /// Derives from `BaseException`.
    pub exception: bool,
    /// Defined by the runtime rather than by submitted code.
    pub builtin: bool,
}

impl Class {
    pub fn new(name: &str, base: Option<Rc<Class>>, exception: bool, builtin: bool) -> Rc<Self> {
        Rc::new(Self {
            name: Rc::from(name),
            base,
            attrs: RefCell::new(HashMap::new()),
            exception,
            builtin,
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attrs.borrow().get(name) {
            return Some(value.clone());
        }
        self.base.as_ref().and_then(|base| base.lookup(name))
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if Rc::ptr_eq(c, other) {
                return true;
            }
            class = c.base.as_ref();
        }
        false
    }

    fn is_key_error(&self) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.builtin && &*c.name == "KeyError" {
                return true;
            }
            class = c.base.as_deref();
        }
        false
    }

    pub fn qualified_name(&self) -> String {
        if self.builtin {
            self.name.to_string()
        } else {
            format!("__main__.{}", self.name)
        }
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attrs: RefCell<HashMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<Self> {
        Rc::new(Self {
            class,
            attrs: RefCell::new(HashMap::new()),
        })
    }

    /// Constructor arguments of an exception instance.
    pub fn args(&self) -> Vec<Value> {
        match self.attrs.borrow().get("args") {
            Some(Value::Tuple(items)) => items.to_vec(),
            _ => Vec::new(),
        }
    }

    /// `str()` of an exception instance.
    pub fn message(&self) -> String {
        let args = self.args();
        match args.as_slice() {
            [key] if self.class.is_key_error() => key.repr(),
            args => exception_message(args),
        }
    }
}

pub enum Method {
    /// A function looked up through an instance.
    User { receiver: Value, func: Rc<Function> },
    /// A built-in method of a str, list or dict.
    Native { receiver: Value, name: Rc<str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Function,
    /// Callable type such as `int` or `list`.
    Type,
}

pub type NativeFn = dyn Fn(&mut Machine<'_>, Args) -> Result<Value, Raised>;

pub struct Builtin {
    pub name: Rc<str>,
    pub kind: BuiltinKind,
    pub func: Box<NativeFn>,
}

impl Builtin {
    pub fn function(
        name: &str,
        func: impl Fn(&mut Machine<'_>, Args) -> Result<Value, Raised> + 'static,
    ) -> Value {
        Value::Builtin(Rc::new(Self {
            name: Rc::from(name),
            kind: BuiltinKind::Function,
            func: Box::new(func),
        }))
    }

    pub fn type_(
        name: &str,
        func: impl Fn(&mut Machine<'_>, Args) -> Result<Value, Raised> + 'static,
    ) -> Value {
        Value::Builtin(Rc::new(Self {
            name: Rc::from(name),
            kind: BuiltinKind::Type,
            func: Box::new(func),
        }))
    }
}

/// Call arguments after evaluation.
#[derive(Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(Rc<str>, Value)>,
}

impl Args {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Check the positional count of a call to `name`.
    pub fn expect(&self, name: &str, min: usize, max: usize) -> Result<(), Raised> {
        let given = self.positional.len();
        if given >= min && given <= max {
            return Ok(());
        }
        let message = if min == max {
            match min {
                0 => format!("{name}() takes no arguments ({given} given)"),
                1 => format!("{name}() takes exactly one argument ({given} given)"),
                n => format!("{name}() takes exactly {n} arguments ({given} given)"),
            }
        } else if given < min {
            format!("{name} expected at least {min} arguments, got {given}")
        } else {
            format!("{name} expected at most {max} arguments, got {given}")
        };
        Err(Raised::new("TypeError", message))
    }

    pub fn take_keyword(&mut self, key: &str) -> Option<Value> {
        let position = self.keywords.iter().position(|(k, _)| &**k == key)?;
        Some(self.keywords.remove(position).1)
    }

    /// Reject any keyword left after the accepted ones were taken.
    pub fn no_keywords(&self, name: &str) -> Result<(), Raised> {
        match self.keywords.first() {
            None => Ok(()),
            Some((key, _)) => Err(Raised::new(
                "TypeError",
                format!("{name}() got an unexpected keyword argument '{key}'"),
            )),
        }
    }
}

/// An exception propagating through the evaluated program.
#[derive(Clone)]
pub struct Raised {
    pub kind: Rc<str>,
    pub message: String,
    /// The exception object, once one exists.
    pub value: Option<Value>,
    /// Constructor argument when it differs from `message`, as for `KeyError`.
    pub arg: Option<Value>,
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Raised {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: Rc::from(kind),
            message: message.into(),
            value: None,
            arg: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new("IndexError", message)
    }

    pub fn key_error(key: &Value) -> Self {
        Self {
            arg: Some(key.clone()),
            ..Self::new("KeyError", key.repr())
        }
    }

    pub fn from_instance(instance: Rc<Instance>) -> Self {
        Self {
            kind: instance.class.name.clone(),
            message: instance.message(),
            value: Some(Value::Instance(instance)),
            arg: None,
        }
    }
}

impl From<Raised> for Fault {
    fn from(raised: Raised) -> Self {
        Fault::new(raised.kind.to_string(), raised.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(2.5), "2.5");
        assert_eq!(float_repr(-3.0), "-3.0");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(f64::INFINITY), "inf");
        assert_eq!(float_repr(f64::NAN), "nan");
    }

    #[test]
    fn test_string_repr_quotes() {
        assert_eq!(Value::str("hi").repr(), "'hi'");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("a\nb").repr(), "'a\\nb'");
        assert_eq!(Value::str("both ' and \"").repr(), "'both \\' and \"'");
    }

    #[test]
    fn test_container_repr() {
        let list = Value::list(vec![Value::Int(1), Value::str("a"), Value::None]);
        assert_eq!(list.repr(), "[1, 'a', None]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::tuple(vec![]).repr(), "()");

        let mut dict = Dict::new();
        dict.insert(Value::str("k"), Value::Bool(true)).unwrap();
        assert_eq!(Value::dict(dict).repr(), "{'k': True}");
    }

    #[test]
    fn test_self_referencing_list() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr(), "[1, [...]]");
    }

    #[test]
    fn test_dict_keys_unify_numbers() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("int")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("float")).unwrap();
        dict.insert(Value::Bool(true), Value::str("bool")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Int(1)).unwrap().unwrap().to_str(), "bool");
    }

    #[test]
    fn test_dict_remove_keeps_order() {
        let mut dict = Dict::new();
        for key in ["a", "b", "c"] {
            dict.insert(Value::str(key), Value::None).unwrap();
        }
        dict.remove(&Value::str("a")).unwrap();
        let keys: Vec<String> = dict.keys().iter().map(Value::to_str).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert!(dict.contains(&Value::str("c")).unwrap());
    }

    #[test]
    fn test_unhashable_key() {
        let mut dict = Dict::new();
        let err = dict.insert(Value::list(vec![]), Value::None).unwrap_err();
        assert_eq!(&*err.kind, "TypeError");
        assert_eq!(err.message, "unhashable type: 'list'");
    }

    #[test]
    fn test_range_len_and_get() {
        let r = Range {
            start: 0,
            stop: 10,
            step: 3,
        };
        assert_eq!(r.len(), 4);
        assert_eq!(r.get(3), Some(9));
        assert_eq!(r.get(4), None);
        let back = Range {
            start: 5,
            stop: 0,
            step: -2,
        };
        assert_eq!(back.len(), 3);
        assert_eq!(back.get(2), Some(1));
    }

    #[test]
    fn test_binding_kinds() {
        assert_eq!(Value::Int(1).binding_kind(), BindingKind::Data);
        let class = Class::new("P", None, false, false);
        assert_eq!(Value::Class(class.clone()).binding_kind(), BindingKind::Type);
        assert_eq!(
            Value::Instance(Instance::new(class)).binding_kind(),
            BindingKind::Data
        );
    }

    #[test]
    fn test_exception_instance_repr_and_str() {
        let class = Class::new("ValueError", None, true, true);
        let instance = Instance::new(class);
        instance
            .attrs
            .borrow_mut()
            .insert(Rc::from("args"), Value::tuple(vec![Value::str("bad")]));
        let value = Value::Instance(instance.clone());
        assert_eq!(value.repr(), "ValueError('bad')");
        assert_eq!(value.to_str(), "bad");

        let raised = Raised::from_instance(instance);
        assert_eq!(Fault::from(raised).to_string(), "ValueError: bad");
    }
}
