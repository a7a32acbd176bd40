//! Operators, truthiness, ordering and value formatting.

use std::cmp::Ordering;
use std::rc::Rc;

use super::ast::{BinOp, CmpOp, UnaryOp};
use super::value::{ensure_len, float_repr, Raised, Value, MAX_SEQUENCE_LEN, MAX_STR_LEN};

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::None => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.borrow().is_empty(),
        Value::Tuple(items) => !items.is_empty(),
        Value::Dict(dict) => !dict.borrow().is_empty(),
        Value::Range(r) => !r.is_empty(),
        _ => true,
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn number(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn as_f64(num: &Num) -> f64 {
    match num {
        Num::Int(i) => *i as f64,
        Num::Float(f) => *f,
    }
}

pub fn py_eq(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return match (x, y) {
            (Num::Int(x), Num::Int(y)) => x == y,
            (x, y) => as_f64(&x) == as_f64(&y),
        };
    }
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            Rc::ptr_eq(x, y) || seq_eq(&x.borrow(), &y.borrow())
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(key, value)| {
                    matches!(y.get(key), Ok(Some(other)) if py_eq(value, &other))
                })
        }
        (Value::Range(x), Value::Range(y)) => {
            (x.is_empty() && y.is_empty()) || (x.start == y.start && x.len() == y.len() && (x.len() == 1 || x.step == y.step))
        }
        _ => is_same(a, b),
    }
}

fn seq_eq(x: &[Value], y: &[Value]) -> bool {
    x.len() == y.len() && x.iter().zip(y).all(|(a, b)| py_eq(a, b))
}

/// Identity comparison (`is`).
pub fn is_same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y) || x == y,
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y) || (x.is_empty() && y.is_empty()),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => Rc::ptr_eq(x, y),
        (Value::Method(x), Value::Method(y)) => Rc::ptr_eq(x, y),
        (Value::Class(x), Value::Class(y)) => Rc::ptr_eq(x, y),
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Ordering used by `<`, `sorted`, `min` and `max`.
pub fn py_cmp(a: &Value, b: &Value, symbol: &str) -> Result<Ordering, Raised> {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return Ok(match (x, y) {
            (Num::Int(x), Num::Int(y)) => x.cmp(&y),
            (x, y) => as_f64(&x)
                .partial_cmp(&as_f64(&y))
                .unwrap_or(Ordering::Equal),
        });
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => seq_cmp(&x.borrow(), &y.borrow(), symbol),
        (Value::Tuple(x), Value::Tuple(y)) => seq_cmp(x, y, symbol),
        _ => Err(Raised::type_error(format!(
            "'{symbol}' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn seq_cmp(x: &[Value], y: &[Value], symbol: &str) -> Result<Ordering, Raised> {
    for (a, b) in x.iter().zip(y) {
        if !py_eq(a, b) {
            return py_cmp(a, b, symbol);
        }
    }
    Ok(x.len().cmp(&y.len()))
}

pub fn contains(container: &Value, item: &Value) -> Result<bool, Raised> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| py_eq(v, item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| py_eq(v, item))),
        Value::Dict(dict) => dict.borrow().contains(item),
        Value::Str(text) => match item {
            Value::Str(needle) => Ok(text.contains(&**needle)),
            other => Err(Raised::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Range(r) => Ok(match item.as_int() {
            Some(i) => {
                let offset = i - r.start;
                r.len() > 0
                    && offset % r.step == 0
                    && (0..r.len()).contains(&(offset / r.step))
            }
            None => false,
        }),
        other => Err(Raised::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, Raised> {
    let symbol = op.symbol();
    Ok(match op {
        CmpOp::Eq => py_eq(a, b),
        CmpOp::NotEq => !py_eq(a, b),
        CmpOp::Lt => py_cmp(a, b, symbol)? == Ordering::Less && !is_nan_pair(a, b),
        CmpOp::LtE => py_cmp(a, b, symbol)? != Ordering::Greater && !is_nan_pair(a, b),
        CmpOp::Gt => py_cmp(a, b, symbol)? == Ordering::Greater && !is_nan_pair(a, b),
        CmpOp::GtE => py_cmp(a, b, symbol)? != Ordering::Less && !is_nan_pair(a, b),
        CmpOp::In => contains(b, a)?,
        CmpOp::NotIn => !contains(b, a)?,
        CmpOp::Is => is_same(a, b),
        CmpOp::IsNot => !is_same(a, b),
    })
}

fn is_nan_pair(a: &Value, b: &Value) -> bool {
    matches!(a, Value::Float(f) if f.is_nan()) || matches!(b, Value::Float(f) if f.is_nan())
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, Raised> {
    match (op, number(value)) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!truthy(value))),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (op, None) => {
            let symbol = if op == UnaryOp::Neg { "-" } else { "+" };
            Err(Raised::type_error(format!(
                "bad operand type for unary {symbol}: '{}'",
                value.type_name()
            )))
        }
    }
}

fn overflow() -> Raised {
    Raised::new("OverflowError", "integer result too large")
}

fn unsupported(op: BinOp, a: &Value, b: &Value) -> Raised {
    Raised::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        a.type_name(),
        b.type_name()
    ))
}

pub fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, Raised> {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return arithmetic(op, x, y);
    }
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            ensure_len(x.len() + y.len(), MAX_STR_LEN)?;
            let mut text = String::with_capacity(x.len() + y.len());
            text.push_str(x);
            text.push_str(y);
            Ok(Value::str(&text))
        }
        (BinOp::Add, Value::Str(_), other) => Err(Raised::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            ensure_len(x.borrow().len() + y.borrow().len(), MAX_SEQUENCE_LEN)?;
            let mut items = x.borrow().clone();
            items.extend(y.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::List(_), other) => Err(Raised::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            ensure_len(x.len() + y.len(), MAX_SEQUENCE_LEN)?;
            Ok(Value::tuple(x.iter().chain(y.iter()).cloned().collect()))
        }
        (BinOp::Mul, seq, count) | (BinOp::Mul, count, seq)
            if count.as_int().is_some()
                && matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            repeat(seq, count.as_int().unwrap_or(0))
        }
        (BinOp::Mod, Value::Str(template), args) => percent_format(template, args),
        _ => Err(unsupported(op, a, b)),
    }
}

fn repeat(seq: &Value, count: i64) -> Result<Value, Raised> {
    let count = usize::try_from(count).unwrap_or(0);
    let (len, limit) = match seq {
        Value::Str(s) => (s.len(), MAX_STR_LEN),
        Value::List(items) => (items.borrow().len(), MAX_SEQUENCE_LEN),
        Value::Tuple(items) => (items.len(), MAX_SEQUENCE_LEN),
        _ => (0, MAX_SEQUENCE_LEN),
    };
    ensure_len(len.checked_mul(count).unwrap_or(usize::MAX), limit)?;
    Ok(match seq {
        Value::Str(s) => Value::str(&s.repeat(count)),
        Value::List(items) => {
            let items = items.borrow();
            Value::list(items.iter().cloned().cycle().take(len * count).collect())
        }
        Value::Tuple(items) => {
            Value::tuple(items.iter().cloned().cycle().take(len * count).collect())
        }
        other => other.clone(),
    })
}

fn arithmetic(op: BinOp, x: Num, y: Num) -> Result<Value, Raised> {
    if let (Num::Int(a), Num::Int(b)) = (&x, &y) {
        let (a, b) = (*a, *b);
        return match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div => {
                if b == 0 {
                    return Err(zero_division("division by zero"));
                }
                Ok(Value::Float(a as f64 / b as f64))
            }
            BinOp::FloorDiv => {
                if b == 0 {
                    return Err(zero_division("integer division or modulo by zero"));
                }
                let q = a.checked_div(b).ok_or_else(overflow)?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            BinOp::Mod => {
                if b == 0 {
                    return Err(zero_division("integer modulo by zero"));
                }
                let r = a.checked_rem(b).unwrap_or(0);
                if r != 0 && ((r < 0) != (b < 0)) {
                    Ok(Value::Int(r + b))
                } else {
                    Ok(Value::Int(r))
                }
            }
            BinOp::Pow => {
                if b < 0 {
                    if a == 0 {
                        return Err(zero_division(
                            "0.0 cannot be raised to a negative power",
                        ));
                    }
                    return Ok(Value::Float((a as f64).powf(b as f64)));
                }
                u32::try_from(b)
                    .ok()
                    .and_then(|b| a.checked_pow(b))
                    .map(Value::Int)
                    .ok_or_else(overflow)
            }
        };
    }

    let (a, b) = (as_f64(&x), as_f64(&y));
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(zero_division("float modulo by zero"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(zero_division("0.0 cannot be raised to a negative power"));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(Raised::value_error("math domain error"));
            }
            a.powf(b)
        }
    };
    if result.is_infinite() && a.is_finite() && b.is_finite() {
        return Err(Raised::new("OverflowError", "numerical result out of range"));
    }
    Ok(Value::Float(result))
}

fn zero_division(message: &str) -> Raised {
    Raised::new("ZeroDivisionError", message)
}

/// `template % args` for the `%s`, `%r`, `%d`, `%i`, `%f` and `%%` directives.
fn percent_format(template: &str, args: &Value) -> Result<Value, Raised> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut values = values.into_iter();
    let mut out = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == '.' || next == '-' || next == '+' {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let directive = chars
            .next()
            .ok_or_else(|| Raised::value_error("incomplete format"))?;
        if directive == '%' {
            out.push('%');
            continue;
        }
        let value = values
            .next()
            .ok_or_else(|| Raised::type_error("not enough arguments for format string"))?;
        let spec = spec.replacen('-', "<", 1);
        let text = match directive {
            's' => format_value(&Value::str(&value.to_str()), &spec)?,
            'r' => format_value(&Value::str(&value.repr()), &spec)?,
            'd' | 'i' => format_value(&to_int_for_format(&value)?, &format!("{spec}d"))?,
            'f' | 'e' | 'g' | 'x' | 'o' => {
                format_value(&value, &format!("{spec}{directive}"))?
            }
            other => {
                return Err(Raised::value_error(format!(
                    "unsupported format character '{other}'"
                )))
            }
        };
        out.push_str(&text);
    }

    if values.next().is_some() {
        return Err(Raised::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(Value::str(&out))
}

fn to_int_for_format(value: &Value) -> Result<Value, Raised> {
    match value {
        Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(_) => Ok(value.clone()),
        other => Err(Raised::type_error(format!(
            "%d format: a real number is required, not {}",
            other.type_name()
        ))),
    }
}

#[derive(Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Result<FormatSpec, Raised> {
    let invalid = || Raised::value_error("Invalid format specifier");
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;

    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
    if chars.len() >= 2 && is_align(chars[1]) {
        parsed.fill = Some(chars[0]);
        parsed.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        parsed.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c) = chars.get(i) {
        if matches!(c, '+' | '-' | ' ') {
            parsed.sign = Some(c);
            i += 1;
        }
    }
    if chars.get(i) == Some(&'#') {
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        parsed.zero = true;
        i += 1;
    }
    let start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        parsed.width = digits.parse().map_err(|_| invalid())?;
    }
    if let Some(&c) = chars.get(i) {
        if c == ',' || c == '_' {
            parsed.grouping = Some(c);
            i += 1;
        }
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err(Raised::value_error("Format specifier missing precision"));
        }
        let digits: String = chars[start..i].iter().collect();
        parsed.precision = Some(digits.parse().map_err(|_| invalid())?);
    }
    if let Some(&c) = chars.get(i) {
        parsed.kind = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// `format(value, spec)` for the standard format mini-language.
pub fn format_value(value: &Value, spec: &str) -> Result<String, Raised> {
    if spec.is_empty() {
        return Ok(value.to_str());
    }
    let spec = parse_spec(spec)?;
    let unknown = |code: char| {
        Raised::value_error(format!(
            "Unknown format code '{code}' for object of type '{}'",
            value.type_name()
        ))
    };

    let (body, numeric) = match (value, spec.kind) {
        (Value::Str(s), None | Some('s')) => {
            let text: String = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.to_string(),
            };
            (text, false)
        }
        (Value::Str(_), Some(code)) => return Err(unknown(code)),
        (Value::Int(_) | Value::Bool(_), kind) => {
            let i = value.as_int().unwrap_or(0);
            let text = match kind {
                None | Some('d') | Some('n') => group(&i.unsigned_abs().to_string(), spec.grouping),
                Some('x') => format!("{:x}", i.unsigned_abs()),
                Some('X') => format!("{:X}", i.unsigned_abs()),
                Some('o') => format!("{:o}", i.unsigned_abs()),
                Some('b') => format!("{:b}", i.unsigned_abs()),
                Some('c') => char::from_u32(i as u32).map(String::from).unwrap_or_default(),
                Some(code @ ('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%')) => {
                    float_body((i as f64).abs(), Some(code), spec.precision, spec.grouping)
                }
                Some(code) => return Err(unknown(code)),
            };
            (with_sign(i < 0, spec.sign, text), true)
        }
        (Value::Float(f), kind) => {
            let text = match kind {
                None | Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%') => {
                    float_body(f.abs(), kind, spec.precision, spec.grouping)
                }
                Some(code) => return Err(unknown(code)),
            };
            (with_sign(f.is_sign_negative() && !f.is_nan(), spec.sign, text), true)
        }
        (_, None | Some('s')) if spec.precision.is_none() => (value.to_str(), false),
        _ => {
            return Err(Raised::type_error(format!(
                "unsupported format string passed to {}.__format__",
                value.type_name()
            )))
        }
    };

    Ok(pad(body, &spec, numeric))
}

fn with_sign(negative: bool, sign: Option<char>, text: String) -> String {
    match (negative, sign) {
        (true, _) => format!("-{text}"),
        (false, Some('+')) => format!("+{text}"),
        (false, Some(' ')) => format!(" {text}"),
        _ => text,
    }
}

fn float_body(f: f64, kind: Option<char>, precision: Option<usize>, grouping: Option<char>) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return "inf".to_string();
    }
    match kind {
        Some('f' | 'F') => group_fixed(&format!("{:.*}", precision.unwrap_or(6), f), grouping),
        Some('%') => format!(
            "{}%",
            group_fixed(&format!("{:.*}", precision.unwrap_or(6), f * 100.0), grouping)
        ),
        Some('e' | 'E') => exponent_form(f, precision.unwrap_or(6)),
        Some('g' | 'G') => general_form(f, precision.unwrap_or(6), false),
        _ => match precision {
            Some(p) => general_form(f, p, true),
            None => group_fixed(&float_repr(f), grouping),
        },
    }
}

fn exponent_form(f: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, f);
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

fn general_form(f: f64, precision: usize, keep_point: bool) -> String {
    let precision = precision.max(1);
    if f == 0.0 {
        return if keep_point { "0.0" } else { "0" }.to_string();
    }
    let exponent = format!("{:.*e}", precision - 1, f)
        .split_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
    if exponent >= -4 && exponent < precision as i32 {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, f);
        let trimmed = trim_zeros(&fixed);
        if keep_point && !trimmed.contains('.') {
            format!("{trimmed}.0")
        } else {
            trimmed
        }
    } else {
        let text = exponent_form(f, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", trim_zeros(mantissa)),
            None => text,
        }
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn group(digits: &str, grouping: Option<char>) -> String {
    let Some(separator) = grouping else {
        return digits.to_string();
    };
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn group_fixed(text: &str, grouping: Option<char>) -> String {
    match text.split_once('.') {
        Some((int, frac)) => format!("{}.{frac}", group(int, grouping)),
        None => group(text, grouping),
    }
}

fn pad(body: String, spec: &FormatSpec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let missing = spec.width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let padding = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        '<' => format!("{body}{}", padding(missing)),
        '^' => format!(
            "{}{body}{}",
            padding(missing / 2),
            padding(missing - missing / 2)
        ),
        '=' => {
            let split = body
                .char_indices()
                .find(|(_, c)| !matches!(c, '+' | '-' | ' '))
                .map_or(0, |(i, _)| i);
            let (sign, digits) = body.split_at(split);
            format!("{sign}{}{digits}", padding(missing))
        }
        _ => format!("{}{body}", padding(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    fn float(f: f64) -> Value {
        Value::Float(f)
    }

    fn err_kind(result: Result<Value, Raised>) -> String {
        result.unwrap_err().kind.to_string()
    }

    #[test]
    fn test_floor_division_and_modulo_follow_sign_of_divisor() {
        assert!(py_eq(&binary(BinOp::FloorDiv, &int(-7), &int(2)).unwrap(), &int(-4)));
        assert!(py_eq(&binary(BinOp::Mod, &int(-7), &int(2)).unwrap(), &int(1)));
        assert!(py_eq(&binary(BinOp::Mod, &int(7), &int(-2)).unwrap(), &int(-1)));
        assert!(py_eq(&binary(BinOp::Mod, &float(-1.5), &int(1)).unwrap(), &float(0.5)));
    }

    #[test]
    fn test_division_by_zero_messages() {
        let err = binary(BinOp::Div, &int(1), &int(0)).unwrap_err();
        assert_eq!(&*err.kind, "ZeroDivisionError");
        assert_eq!(err.message, "division by zero");
        assert_eq!(err_kind(binary(BinOp::Mod, &int(1), &int(0))), "ZeroDivisionError");
        assert_eq!(err_kind(binary(BinOp::Div, &float(1.0), &float(0.0))), "ZeroDivisionError");
    }

    #[test]
    fn test_integer_overflow() {
        assert_eq!(err_kind(binary(BinOp::Mul, &int(i64::MAX), &int(2))), "OverflowError");
        assert_eq!(err_kind(binary(BinOp::Pow, &int(10), &int(40))), "OverflowError");
        assert!(py_eq(&binary(BinOp::Pow, &int(2), &int(10)).unwrap(), &int(1024)));
        assert!(py_eq(&binary(BinOp::Pow, &int(2), &int(-1)).unwrap(), &float(0.5)));
    }

    #[test]
    fn test_true_division_is_float() {
        let v = binary(BinOp::Div, &int(6), &int(3)).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 2.0));
    }

    #[test]
    fn test_concatenation_errors() {
        let err = binary(BinOp::Add, &Value::str("a"), &int(1)).unwrap_err();
        assert_eq!(err.message, "can only concatenate str (not \"int\") to str");
        let err = binary(BinOp::Sub, &Value::str("a"), &int(1)).unwrap_err();
        assert_eq!(err.message, "unsupported operand type(s) for -: 'str' and 'int'");
    }

    #[test]
    fn test_repetition() {
        let v = binary(BinOp::Mul, &Value::str("ab"), &int(3)).unwrap();
        assert_eq!(v.to_str(), "ababab");
        let v = binary(BinOp::Mul, &int(2), &Value::list(vec![int(0)])).unwrap();
        assert_eq!(v.repr(), "[0, 0]");
        assert_eq!(err_kind(binary(BinOp::Mul, &Value::str("x"), &int(1 << 40))), "MemoryError");
    }

    #[test]
    fn test_mixed_comparisons() {
        assert!(compare(CmpOp::Lt, &int(1), &float(1.5)).unwrap());
        assert!(compare(CmpOp::Eq, &int(1), &Value::Bool(true)).unwrap());
        assert!(compare(CmpOp::Lt, &Value::str("a"), &Value::str("b")).unwrap());
        let err = compare(CmpOp::Lt, &int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err.message, "'<' not supported between instances of 'int' and 'str'");
    }

    #[test]
    fn test_membership() {
        let list = Value::list(vec![int(1), int(2)]);
        assert!(compare(CmpOp::In, &int(2), &list).unwrap());
        assert!(compare(CmpOp::NotIn, &int(3), &list).unwrap());
        assert!(compare(CmpOp::In, &Value::str("ell"), &Value::str("hello")).unwrap());
        let range = Value::Range(super::super::value::Range { start: 0, stop: 10, step: 3 });
        assert!(contains(&range, &int(9)).unwrap());
        assert!(!contains(&range, &int(10)).unwrap());
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::None));
        assert!(!truthy(&int(0)));
        assert!(!truthy(&Value::str("")));
        assert!(!truthy(&Value::list(vec![])));
        assert!(truthy(&Value::tuple(vec![Value::None])));
    }

    #[test]
    fn test_format_spec() {
        assert_eq!(format_value(&float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&int(42), "05d").unwrap(), "00042");
        assert_eq!(format_value(&int(-42), "05d").unwrap(), "-0042");
        assert_eq!(format_value(&int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::str("ab"), ">4").unwrap(), "  ab");
        assert_eq!(format_value(&Value::str("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&int(255), "x").unwrap(), "ff");
        assert_eq!(format_value(&float(0.25), ".0%").unwrap(), "25%");
        assert_eq!(format_value(&float(1234.5), ".2e").unwrap(), "1.23e+03");
        assert_eq!(format_value(&float(0.5), "g").unwrap(), "0.5");
        assert_eq!(format_value(&int(7), "+").unwrap(), "+7");
    }

    #[test]
    fn test_format_spec_errors() {
        let err = format_value(&Value::str("a"), "d").unwrap_err();
        assert_eq!(err.message, "Unknown format code 'd' for object of type 'str'");
        assert_eq!(&*format_value(&int(1), "q!").unwrap_err().kind, "ValueError");
    }

    #[test]
    fn test_percent_format() {
        let args = Value::tuple(vec![Value::str("x"), int(3), float(1.5)]);
        let v = binary(BinOp::Mod, &Value::str("%s=%d (%.2f) 100%%"), &args).unwrap();
        assert_eq!(v.to_str(), "x=3 (1.50) 100%");
    }
}
