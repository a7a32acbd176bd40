//! Built-in functions, types and exception classes.

use std::cmp::Ordering;
use std::rc::Rc;

use super::ast::BinOp;
use super::interp::{collect, Machine};
use super::methods::sort_values;
use super::ops::{binary, py_cmp, truthy};
use super::value::{Args, Builtin, BuiltinKind, Class, Dict, Range, Raised, Value};
use super::OutputSink;

/// Exception classes as `(name, parent)`, parents first.
const EXCEPTIONS: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ArithmeticError", Some("Exception")),
    ("ZeroDivisionError", Some("ArithmeticError")),
    ("OverflowError", Some("ArithmeticError")),
    ("LookupError", Some("Exception")),
    ("IndexError", Some("LookupError")),
    ("KeyError", Some("LookupError")),
    ("ValueError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("NameError", Some("Exception")),
    ("UnboundLocalError", Some("NameError")),
    ("AttributeError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("RecursionError", Some("RuntimeError")),
    ("NotImplementedError", Some("RuntimeError")),
    ("AssertionError", Some("Exception")),
    ("MemoryError", Some("Exception")),
    ("SyntaxError", Some("Exception")),
    ("IndentationError", Some("SyntaxError")),
];

/// Every built-in symbol the runtime implements, with `print` bound to `output`.
pub(crate) fn standard(output: Rc<dyn OutputSink>) -> Vec<(&'static str, Value)> {
    let mut symbols: Vec<(&'static str, Value)> = vec![
        ("int", Builtin::type_("int", int)),
        ("float", Builtin::type_("float", float)),
        ("str", Builtin::type_("str", |_, args| {
            args.no_keywords("str")?;
            args.expect("str", 0, 1)?;
            Ok(args
                .positional
                .first()
                .map_or_else(|| Value::str(""), |v| Value::str(&v.to_str())))
        })),
        ("bool", Builtin::type_("bool", |_, args| {
            args.no_keywords("bool")?;
            args.expect("bool", 0, 1)?;
            Ok(Value::Bool(args.positional.first().is_some_and(truthy)))
        })),
        ("list", Builtin::type_("list", |_, args| {
            args.no_keywords("list")?;
            args.expect("list", 0, 1)?;
            match args.positional.first() {
                Some(iterable) => Ok(Value::list(collect(iterable)?)),
                None => Ok(Value::list(Vec::new())),
            }
        })),
        ("tuple", Builtin::type_("tuple", |_, args| {
            args.no_keywords("tuple")?;
            args.expect("tuple", 0, 1)?;
            match args.positional.first() {
                Some(iterable) => Ok(Value::tuple(collect(iterable)?)),
                None => Ok(Value::tuple(Vec::new())),
            }
        })),
        ("dict", Builtin::type_("dict", dict)),
        ("range", Builtin::type_("range", range)),
        ("abs", Builtin::function("abs", |_, args| {
            args.no_keywords("abs")?;
            args.expect("abs", 1, 1)?;
            match &args.positional[0] {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| Raised::new("OverflowError", "integer result too large")),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(Raised::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        })),
        ("min", Builtin::function("min", |m, args| extreme(m, args, "min", Ordering::Less))),
        ("max", Builtin::function("max", |m, args| extreme(m, args, "max", Ordering::Greater))),
        ("sum", Builtin::function("sum", sum)),
        ("round", Builtin::function("round", round)),
        ("divmod", Builtin::function("divmod", |_, args| {
            args.no_keywords("divmod")?;
            args.expect("divmod", 2, 2)?;
            let (a, b) = (&args.positional[0], &args.positional[1]);
            Ok(Value::tuple(vec![
                binary(BinOp::FloorDiv, a, b)?,
                binary(BinOp::Mod, a, b)?,
            ]))
        })),
        ("pow", Builtin::function("pow", pow)),
        ("len", Builtin::function("len", |_, args| {
            args.no_keywords("len")?;
            args.expect("len", 1, 1)?;
            len(&args.positional[0]).map(Value::Int)
        })),
        ("enumerate", Builtin::function("enumerate", |_, mut args| {
            let start = match args.take_keyword("start") {
                Some(value) => Some(value),
                None => args.positional.get(1).cloned(),
            };
            args.no_keywords("enumerate")?;
            args.expect("enumerate", 1, 2)?;
            let start = match start {
                Some(value) => value.as_int().ok_or_else(|| {
                    Raised::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        value.type_name()
                    ))
                })?,
                None => 0,
            };
            let items = collect(&args.positional[0])?;
            Ok(Value::list(
                items
                    .into_iter()
                    .zip(start..)
                    .map(|(item, i)| Value::tuple(vec![Value::Int(i), item]))
                    .collect(),
            ))
        })),
        ("zip", Builtin::function("zip", |_, args| {
            args.no_keywords("zip")?;
            let columns = args
                .positional
                .iter()
                .map(collect)
                .collect::<Result<Vec<_>, _>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect(),
            ))
        })),
        ("sorted", Builtin::function("sorted", |m, mut args| {
            let key = args.take_keyword("key");
            let reverse = args.take_keyword("reverse").is_some_and(|v| truthy(&v));
            args.no_keywords("sorted")?;
            args.expect("sorted", 1, 1)?;
            let items = collect(&args.positional[0])?;
            Ok(Value::list(sort_values(m, items, key.as_ref(), reverse)?))
        })),
        ("reversed", Builtin::function("reversed", |_, args| {
            args.no_keywords("reversed")?;
            args.expect("reversed", 1, 1)?;
            match &args.positional[0] {
                Value::Dict(_) => Err(Raised::type_error("'dict' object is not reversible")),
                other => {
                    let mut items = collect(other)?;
                    items.reverse();
                    Ok(Value::list(items))
                }
            }
        })),
        ("any", Builtin::function("any", |_, args| {
            args.no_keywords("any")?;
            args.expect("any", 1, 1)?;
            Ok(Value::Bool(collect(&args.positional[0])?.iter().any(truthy)))
        })),
        ("all", Builtin::function("all", |_, args| {
            args.no_keywords("all")?;
            args.expect("all", 1, 1)?;
            Ok(Value::Bool(collect(&args.positional[0])?.iter().all(truthy)))
        })),
        ("chr", Builtin::function("chr", |_, args| {
            args.no_keywords("chr")?;
            args.expect("chr", 1, 1)?;
            let code = args.positional[0].as_int().ok_or_else(|| {
                Raised::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    args.positional[0].type_name()
                ))
            })?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                .ok_or_else(|| Raised::value_error("chr() arg not in range(0x110000)"))
        })),
        ("ord", Builtin::function("ord", |_, args| {
            args.no_keywords("ord")?;
            args.expect("ord", 1, 1)?;
            let Value::Str(text) = &args.positional[0] else {
                return Err(Raised::type_error(format!(
                    "ord() expected string of length 1, but {} found",
                    args.positional[0].type_name()
                )));
            };
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(Raised::type_error(format!(
                    "ord() expected a character, but string of length {} found",
                    text.chars().count()
                ))),
            }
        })),
        ("type", Builtin::type_("type", type_of)),
        ("isinstance", Builtin::function("isinstance", |_, args| {
            args.no_keywords("isinstance")?;
            args.expect("isinstance", 2, 2)?;
            is_instance(&args.positional[0], &args.positional[1]).map(Value::Bool)
        })),
        ("repr", Builtin::function("repr", |_, args| {
            args.no_keywords("repr")?;
            args.expect("repr", 1, 1)?;
            Ok(Value::str(&args.positional[0].repr()))
        })),
        ("print", Builtin::function("print", move |_, args| print(&*output, args))),
    ];

    symbols.push(("object", Value::Class(Class::new("object", None, false, true))));

    let mut classes: Vec<Rc<Class>> = Vec::new();
    for (name, parent) in EXCEPTIONS {
        let base = parent.and_then(|p| classes.iter().find(|c| &*c.name == p).cloned());
        let class = Class::new(name, base, true, true);
        classes.push(class.clone());
        symbols.push((*name, Value::Class(class)));
    }
    symbols
}

fn print(output: &dyn OutputSink, mut args: Args) -> Result<Value, Raised> {
    let mut separator = |key: &str, default: &str| -> Result<String, Raised> {
        match args.take_keyword(key) {
            None | Some(Value::None) => Ok(default.to_string()),
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(Raised::type_error(format!(
                "{key} must be None or a string, not {}",
                other.type_name()
            ))),
        }
    };
    let sep = separator("sep", " ")?;
    let end = separator("end", "\n")?;
    args.no_keywords("print")?;

    let mut text = args
        .positional
        .iter()
        .map(Value::to_str)
        .collect::<Vec<_>>()
        .join(&sep);
    text.push_str(&end);
    output.write(&text);
    Ok(Value::None)
}

fn int(_: &mut Machine<'_>, mut args: Args) -> Result<Value, Raised> {
    let base = args.take_keyword("base").or_else(|| args.positional.get(1).cloned());
    args.no_keywords("int")?;
    args.expect("int", 0, 2)?;
    let Some(value) = args.positional.first() else {
        return Ok(Value::Int(0));
    };

    if let Some(base) = base {
        let Value::Str(text) = value else {
            return Err(Raised::type_error("int() can't convert non-string with explicit base"));
        };
        let radix = base
            .as_int()
            .and_then(|b| u32::try_from(b).ok())
            .filter(|b| (2..=36).contains(b))
            .ok_or_else(|| Raised::value_error("int() base must be >= 2 and <= 36, or 0"))?;
        return parse_int(text, radix);
    }

    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(f.trunc()).map(Value::Int),
        Value::Str(text) => parse_int(text, 10),
        other => Err(Raised::type_error(format!(
            "int() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

/// Convert an integral float, rejecting NaN, infinities and values past `i64`.
fn float_to_int(f: f64) -> Result<i64, Raised> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Err(Raised::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Raised::new(
            "OverflowError",
            "cannot convert float infinity to integer",
        ));
    }
    if !(-BOUND..BOUND).contains(&f) {
        return Err(Raised::new("OverflowError", "integer result too large"));
    }
    Ok(f as i64)
}

fn parse_int(text: &str, radix: u32) -> Result<Value, Raised> {
    let invalid = || {
        Raised::value_error(format!(
            "invalid literal for int() with base {radix}: {}",
            Value::str(text).repr()
        ))
    };
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i64::from_str_radix(&cleaned, radix).map_err(|err| {
        if matches!(err.kind(), std::num::IntErrorKind::PosOverflow) {
            Raised::new("OverflowError", "integer result too large")
        } else {
            invalid()
        }
    })?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn float(_: &mut Machine<'_>, args: Args) -> Result<Value, Raised> {
    args.no_keywords("float")?;
    args.expect("float", 0, 1)?;
    match args.positional.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(value @ (Value::Int(_) | Value::Bool(_))) => {
            Ok(Value::Float(value.as_int().unwrap_or(0) as f64))
        }
        Some(Value::Str(text)) => {
            let trimmed = text.trim();
            let lowered = trimmed.to_ascii_lowercase();
            let unsigned = lowered.trim_start_matches(['+', '-']);
            let parsed = match unsigned {
                "inf" | "infinity" | "nan" => lowered.replace("infinity", "inf").parse::<f64>().ok(),
                _ if unsigned.chars().any(|c| c.is_ascii_alphabetic() && c != 'e') => None,
                _ => trimmed.replace('_', "").parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                Raised::value_error(format!(
                    "could not convert string to float: {}",
                    Value::str(text).repr()
                ))
            })
        }
        Some(other) => Err(Raised::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn dict(_: &mut Machine<'_>, mut args: Args) -> Result<Value, Raised> {
    args.expect("dict", 0, 1)?;
    let mut out = Dict::new();
    match args.positional.first() {
        None => {}
        Some(Value::Dict(source)) => {
            for (key, value) in source.borrow().iter() {
                out.insert(key.clone(), value.clone())?;
            }
        }
        Some(iterable) => {
            for (i, pair) in collect(iterable)?.into_iter().enumerate() {
                let items = collect(&pair).map_err(|_| {
                    Raised::type_error(format!(
                        "cannot convert dictionary update sequence element #{i} to a sequence"
                    ))
                })?;
                let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
                    Raised::value_error(format!(
                        "dictionary update sequence element #{i} has length {}; 2 is required",
                        items.len()
                    ))
                })?;
                out.insert(key, value)?;
            }
        }
    }
    for (key, value) in args.keywords.drain(..) {
        out.insert(Value::Str(key), value)?;
    }
    Ok(Value::dict(out))
}

fn range(_: &mut Machine<'_>, args: Args) -> Result<Value, Raised> {
    args.no_keywords("range")?;
    args.expect("range", 1, 3)?;
    let mut bounds = Vec::with_capacity(3);
    for value in &args.positional {
        bounds.push(value.as_int().ok_or_else(|| {
            Raised::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?);
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(Raised::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(Range { start, stop, step }))
}

fn len(value: &Value) -> Result<i64, Raised> {
    Ok(match value {
        Value::Str(s) => s.chars().count() as i64,
        Value::List(items) => items.borrow().len() as i64,
        Value::Tuple(items) => items.len() as i64,
        Value::Dict(dict) => dict.borrow().len() as i64,
        Value::Range(range) => range.len(),
        other => {
            return Err(Raised::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    })
}

/// `min`/`max` over one iterable or several arguments, honouring `key` and `default`.
fn extreme(
    machine: &mut Machine<'_>,
    mut args: Args,
    name: &str,
    wanted: Ordering,
) -> Result<Value, Raised> {
    let key = args.take_keyword("key").filter(|k| !k.is_none());
    let default = args.take_keyword("default");
    args.no_keywords(name)?;

    let candidates = match args.positional.len() {
        0 => {
            return Err(Raised::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )))
        }
        1 => collect(&args.positional[0])?,
        _ if default.is_some() => {
            return Err(Raised::type_error(format!(
                "Cannot specify a default for {name}() with multiple positional arguments"
            )))
        }
        _ => args.positional,
    };

    let symbol = if wanted == Ordering::Less { "<" } else { ">" };
    let mut best: Option<(Value, Value)> = None;
    for candidate in candidates {
        let rank = match &key {
            Some(key) => machine.call(key, Args::positional(vec![candidate.clone()]))?,
            None => candidate.clone(),
        };
        let better = match &best {
            None => true,
            Some((_, best_rank)) => py_cmp(&rank, best_rank, symbol)? == wanted,
        };
        if better {
            best = Some((candidate, rank));
        }
    }
    match (best, default) {
        (Some((value, _)), _) => Ok(value),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Raised::value_error(format!(
            "{name}() arg is an empty sequence"
        ))),
    }
}

fn sum(_: &mut Machine<'_>, mut args: Args) -> Result<Value, Raised> {
    let start = args.take_keyword("start").or_else(|| args.positional.get(1).cloned());
    args.no_keywords("sum")?;
    args.expect("sum", 1, 2)?;
    let mut total = start.unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(Raised::type_error(
            "sum() can't sum strings [use ''.join(seq) instead]",
        ));
    }
    for item in collect(&args.positional[0])? {
        total = binary(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn round(_: &mut Machine<'_>, mut args: Args) -> Result<Value, Raised> {
    let digits = args.take_keyword("ndigits").or_else(|| args.positional.get(1).cloned());
    args.no_keywords("round")?;
    args.expect("round", 1, 2)?;
    let digits = match digits {
        None | Some(Value::None) => None,
        Some(value) => Some(value.as_int().ok_or_else(|| {
            Raised::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?),
    };

    match (&args.positional[0], digits) {
        (value @ (Value::Int(_) | Value::Bool(_)), None) => {
            Ok(Value::Int(value.as_int().unwrap_or(0)))
        }
        (value @ (Value::Int(_) | Value::Bool(_)), Some(d)) if d >= 0 => {
            Ok(Value::Int(value.as_int().unwrap_or(0)))
        }
        (Value::Int(i), Some(d)) => {
            let factor = 10f64.powi(i32::try_from(-d).unwrap_or(i32::MAX));
            Ok(Value::Int(((*i as f64 / factor).round_ties_even() * factor) as i64))
        }
        (Value::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Value::Float(f), Some(d)) => {
            let factor = 10f64.powi(i32::try_from(d).unwrap_or(i32::MAX).min(300));
            let rounded = (f * factor).round_ties_even() / factor;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { *f }))
        }
        (other, _) => Err(Raised::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

fn pow(_: &mut Machine<'_>, args: Args) -> Result<Value, Raised> {
    args.no_keywords("pow")?;
    args.expect("pow", 2, 3)?;
    let (base, exponent) = (&args.positional[0], &args.positional[1]);
    let Some(modulus) = args.positional.get(2) else {
        return binary(BinOp::Pow, base, exponent);
    };
    let (Some(b), Some(e), Some(m)) = (base.as_int(), exponent.as_int(), modulus.as_int()) else {
        return Err(Raised::type_error(
            "pow() 3rd argument not allowed unless all arguments are integers",
        ));
    };
    if m == 0 {
        return Err(Raised::value_error("pow() 3rd argument cannot be 0"));
    }
    if e < 0 {
        return Err(Raised::value_error("base is not invertible for the given modulus"));
    }
    let m = i128::from(m);
    let (mut result, mut b, mut e) = (1i128, i128::from(b).rem_euclid(m), e);
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        e >>= 1;
    }
    let result = result.rem_euclid(m);
    // Python's result takes the sign of the modulus.
    let result = if m < 0 && result != 0 { result + m } else { result };
    Ok(Value::Int(result as i64))
}

fn type_of(machine: &mut Machine<'_>, args: Args) -> Result<Value, Raised> {
    args.no_keywords("type")?;
    args.expect("type", 1, 1)?;
    let value = &args.positional[0];
    match value {
        Value::Instance(instance) => Ok(Value::Class(instance.class.clone())),
        Value::Class(_) => Ok(machine.builtin("type").unwrap_or(Value::None)),
        other => {
            let name = other.type_name();
            match machine.builtin(&name) {
                Some(builtin @ Value::Builtin(_)) => Ok(builtin),
                _ => Ok(Builtin::type_(&name.clone(), move |_, _| {
                    Err(Raised::type_error(format!("cannot create '{name}' instances")))
                })),
            }
        }
    }
}

fn is_instance(value: &Value, class: &Value) -> Result<bool, Raised> {
    match class {
        Value::Tuple(options) => {
            for option in options.iter() {
                if is_instance(value, option)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Class(class) => Ok(match value {
            Value::Instance(instance) => instance.class.is_subclass_of(class),
            _ => class.builtin && &*class.name == "object",
        }),
        Value::Builtin(b) if b.kind == BuiltinKind::Type => {
            let actual = value.type_name();
            Ok(*actual == *b.name
                || (&*b.name == "int" && matches!(value, Value::Bool(_)))
                || (&*b.name == "type" && matches!(value, Value::Class(_))))
        }
        _ => Err(Raised::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 42 ", 10).unwrap().as_int(), Some(42));
        assert_eq!(parse_int("-1_000", 10).unwrap().as_int(), Some(-1000));
        assert_eq!(parse_int("ff", 16).unwrap().as_int(), Some(255));
        let err = parse_int("abc", 10).unwrap_err();
        assert_eq!(err.message, "invalid literal for int() with base 10: 'abc'");
        assert_eq!(&*parse_int("99999999999999999999", 10).unwrap_err().kind, "OverflowError");
    }

    #[test]
    fn test_float_to_int_bounds() {
        assert_eq!(float_to_int(-3.0).unwrap(), -3);
        assert_eq!(float_to_int(-9_223_372_036_854_775_808.0).unwrap(), i64::MIN);

        let err = float_to_int(1e30).unwrap_err();
        assert_eq!(&*err.kind, "OverflowError");
        assert_eq!(err.message, "integer result too large");

        let err = float_to_int(f64::INFINITY).unwrap_err();
        assert_eq!(err.message, "cannot convert float infinity to integer");

        let err = float_to_int(f64::NAN).unwrap_err();
        assert_eq!(&*err.kind, "ValueError");
    }

    #[test]
    fn test_len_of_values() {
        assert_eq!(len(&Value::str("héllo")).unwrap(), 5);
        assert_eq!(
            len(&Value::Range(Range { start: 0, stop: 10, step: 2 })).unwrap(),
            5
        );
        let err = len(&Value::Int(3)).unwrap_err();
        assert_eq!(err.message, "object of type 'int' has no len()");
    }

    #[test]
    fn test_is_instance() {
        let int_type = Builtin::type_("int", |_, _| Ok(Value::None));
        assert!(is_instance(&Value::Int(1), &int_type).unwrap());
        assert!(is_instance(&Value::Bool(true), &int_type).unwrap());
        assert!(!is_instance(&Value::str("1"), &int_type).unwrap());
        assert!(is_instance(&Value::Int(1), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_exception_hierarchy() {
        struct Discard;
        impl OutputSink for Discard {
            fn write(&self, _: &str) {}
        }
        let symbols = standard(Rc::new(Discard));
        let class = |name: &str| match symbols.iter().find(|(n, _)| *n == name) {
            Some((_, Value::Class(class))) => class.clone(),
            _ => panic!("missing class {name}"),
        };
        assert!(class("ZeroDivisionError").is_subclass_of(&class("ArithmeticError")));
        assert!(class("KeyError").is_subclass_of(&class("Exception")));
        assert!(!class("TypeError").is_subclass_of(&class("LookupError")));
        assert!(class("RecursionError").exception);
    }
}
