//! Methods of the built-in str, list, dict and number types.

use std::cmp::Ordering;
use std::rc::Rc;

use super::interp::{collect, Machine};
use super::ops::{format_value, py_cmp, py_eq};
use super::value::{ensure_len, Args, Dict, Raised, Value, MAX_SEQUENCE_LEN};

const STR_METHODS: &[&str] = &[
    "capitalize", "center", "count", "endswith", "find", "format", "index", "isalnum",
    "isalpha", "isdigit", "islower", "isspace", "isupper", "join", "ljust", "lower", "lstrip",
    "replace", "rjust", "rstrip", "split", "splitlines", "startswith", "strip", "title", "upper",
    "zfill",
];

const LIST_METHODS: &[&str] = &[
    "append", "clear", "copy", "count", "extend", "index", "insert", "pop", "remove", "reverse",
    "sort",
];

const DICT_METHODS: &[&str] = &[
    "clear", "copy", "get", "items", "keys", "pop", "popitem", "setdefault", "update", "values",
];

const TUPLE_METHODS: &[&str] = &["count", "index"];

pub(crate) fn has_method(value: &Value, name: &str) -> bool {
    let table: &[&str] = match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Float(_) => &["is_integer"],
        Value::Int(_) | Value::Bool(_) => &["bit_length"],
        _ => &[],
    };
    table.contains(&name)
}

pub(crate) fn call_method(
    machine: &mut Machine<'_>,
    receiver: &Value,
    name: &str,
    mut args: Args,
) -> Result<Value, Raised> {
    match receiver {
        Value::Str(text) => str_method(text, name, args),
        Value::List(_) => list_method(machine, receiver, name, &mut args),
        Value::Dict(_) => dict_method(receiver, name, args),
        Value::Tuple(items) => sequence_method(items, name, &args),
        Value::Float(f) if name == "is_integer" => {
            args.expect(name, 0, 0)?;
            Ok(Value::Bool(f.is_finite() && f.fract() == 0.0))
        }
        Value::Int(_) | Value::Bool(_) if name == "bit_length" => {
            args.expect(name, 0, 0)?;
            let i = receiver.as_int().unwrap_or(0);
            Ok(Value::Int(i64::from(64 - i.unsigned_abs().leading_zeros())))
        }
        other => Err(Raised::new(
            "AttributeError",
            format!("'{}' object has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn str_arg<'a>(args: &'a Args, index: usize, method: &str) -> Result<&'a str, Raised> {
    match args.positional.get(index) {
        Some(Value::Str(s)) => Ok(&**s),
        Some(other) => Err(Raised::type_error(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(Raised::type_error(format!("{method}() missing required argument"))),
    }
}

fn int_arg(args: &Args, index: usize, default: i64) -> Result<i64, Raised> {
    match args.positional.get(index) {
        None => Ok(default),
        Some(value) => value.as_int().ok_or_else(|| {
            Raised::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        }),
    }
}

fn fill_char(args: &Args, index: usize, method: &str) -> Result<char, Raised> {
    match args.positional.get(index) {
        None => Ok(' '),
        Some(Value::Str(s)) if s.chars().count() == 1 => Ok(s.chars().next().unwrap_or(' ')),
        Some(_) => Err(Raised::type_error(format!(
            "{method}() argument 2 must be a single character"
        ))),
    }
}

fn strip_set(args: &Args, method: &str) -> Result<Option<Vec<char>>, Raised> {
    args.expect(method, 0, 1)?;
    match args.positional.first() {
        None | Some(Value::None) => Ok(None),
        Some(_) => Ok(Some(str_arg(args, 0, method)?.chars().collect())),
    }
}

fn str_method(text: &Rc<str>, name: &str, mut args: Args) -> Result<Value, Raised> {
    if name == "format" {
        return str_format(text, &args);
    }
    if name != "split" {
        args.no_keywords(name)?;
    }
    let s: &str = text;
    Ok(match name {
        "upper" | "lower" | "title" | "capitalize" | "isdigit" | "isalpha" | "isalnum"
        | "isspace" | "isupper" | "islower" | "splitlines" => {
            args.expect(name, 0, 0)?;
            match name {
                "upper" => Value::str(&s.to_uppercase()),
                "lower" => Value::str(&s.to_lowercase()),
                "title" => Value::str(&title_case(s)),
                "capitalize" => {
                    let mut chars = s.chars();
                    let capitalized = match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                        None => String::new(),
                    };
                    Value::str(&capitalized)
                }
                "isdigit" => Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())),
                "isalpha" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
                "isalnum" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric)),
                "isspace" => Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)),
                "isupper" => Value::Bool(
                    s.chars().any(char::is_alphabetic)
                        && !s.chars().any(char::is_lowercase),
                ),
                "islower" => Value::Bool(
                    s.chars().any(char::is_alphabetic)
                        && !s.chars().any(char::is_uppercase),
                ),
                _ => Value::list(s.lines().map(Value::str).collect()),
            }
        }
        "strip" | "lstrip" | "rstrip" => {
            let set = strip_set(&args, name)?;
            let matches = |c: char| match &set {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            let stripped = match name {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            Value::str(stripped)
        }
        "split" => {
            let max_split = match args.take_keyword("maxsplit") {
                Some(value) => value.as_int().unwrap_or(-1),
                None => int_arg(&args, 1, -1)?,
            };
            let sep = args
                .take_keyword("sep")
                .or_else(|| args.positional.first().cloned());
            args.no_keywords(name)?;
            let sep = match sep {
                Some(Value::Str(sep)) => Some(sep),
                _ => None,
            };
            let limit = usize::try_from(max_split).ok();
            let parts: Vec<Value> = match sep {
                Some(sep) if sep.is_empty() => {
                    return Err(Raised::value_error("empty separator"));
                }
                Some(sep) => match limit {
                    Some(n) => s.splitn(n + 1, &*sep).map(Value::str).collect(),
                    None => s.split(&*sep).map(Value::str).collect(),
                },
                None => split_whitespace(s, limit),
            };
            Value::list(parts)
        }
        "join" => {
            args.expect(name, 1, 1)?;
            let mut out = String::new();
            for (i, item) in collect(&args.positional[0])?.iter().enumerate() {
                let Value::Str(piece) = item else {
                    return Err(Raised::type_error(format!(
                        "sequence item {i}: expected str instance, {} found",
                        item.type_name()
                    )));
                };
                if i > 0 {
                    out.push_str(s);
                }
                out.push_str(piece);
            }
            Value::str(&out)
        }
        "replace" => {
            args.expect(name, 2, 3)?;
            let old = str_arg(&args, 0, name)?;
            let new = str_arg(&args, 1, name)?;
            let count = int_arg(&args, 2, -1)?;
            match usize::try_from(count) {
                Ok(n) => Value::str(&s.replacen(old, new, n)),
                Err(_) => Value::str(&s.replace(old, new)),
            }
        }
        "startswith" | "endswith" => {
            args.expect(name, 1, 1)?;
            let candidates: Vec<Value> = match &args.positional[0] {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            let mut found = false;
            for candidate in &candidates {
                let Value::Str(affix) = candidate else {
                    return Err(Raised::type_error(format!(
                        "{name} first arg must be str or a tuple of str, not {}",
                        candidate.type_name()
                    )));
                };
                found |= if name == "startswith" {
                    s.starts_with(&**affix)
                } else {
                    s.ends_with(&**affix)
                };
            }
            Value::Bool(found)
        }
        "find" | "index" => {
            args.expect(name, 1, 1)?;
            let needle = str_arg(&args, 0, name)?;
            match s.find(needle) {
                Some(byte) => Value::Int(s[..byte].chars().count() as i64),
                None if name == "find" => Value::Int(-1),
                None => return Err(Raised::value_error("substring not found")),
            }
        }
        "count" => {
            args.expect(name, 1, 1)?;
            let needle = str_arg(&args, 0, name)?;
            let count = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Value::Int(count as i64)
        }
        "center" | "ljust" | "rjust" => {
            args.expect(name, 1, 2)?;
            let width = usize::try_from(int_arg(&args, 0, 0)?).unwrap_or(0);
            let fill = fill_char(&args, 1, name)?;
            let len = s.chars().count();
            let missing = width.saturating_sub(len);
            let pad = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
            let out = match name {
                "ljust" => format!("{s}{}", pad(missing)),
                "rjust" => format!("{}{s}", pad(missing)),
                _ => {
                    let left = missing / 2 + (missing & width & 1);
                    format!("{}{s}{}", pad(left), pad(missing - left))
                }
            };
            Value::str(&out)
        }
        "zfill" => {
            args.expect(name, 1, 1)?;
            let width = usize::try_from(int_arg(&args, 0, 0)?).unwrap_or(0);
            let len = s.chars().count();
            if len >= width {
                Value::str(s)
            } else {
                let (sign, digits) = match s.chars().next() {
                    Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                    _ => (String::new(), s),
                };
                Value::str(&format!("{sign}{}{digits}", "0".repeat(width - len)))
            }
        }
        _ => {
            return Err(Raised::new(
                "AttributeError",
                format!("'str' object has no attribute '{name}'"),
            ))
        }
    })
}

fn split_whitespace(s: &str, limit: Option<usize>) -> Vec<Value> {
    let Some(limit) = limit else {
        return s.split_whitespace().map(Value::str).collect();
    };
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(Value::str(rest));
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(Value::str(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(Value::str(rest));
                break;
            }
        }
    }
    parts
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

/// `str.format` with automatic, numbered and named fields.
fn str_format(template: &str, args: &Args) -> Result<Value, Raised> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut auto_index = 0;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(Raised::value_error(
                    "Single '}' encountered in format string",
                ))
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(Raised::value_error(
                                "expected '}' before end of string",
                            ))
                        }
                    }
                }
                let (field, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (field, conversion) = match field.split_once('!') {
                    Some((field, conversion)) => (field, Some(conversion)),
                    None => (field, None),
                };

                let value = if field.is_empty() {
                    let value = args.positional.get(auto_index);
                    auto_index += 1;
                    value
                } else if let Ok(index) = field.parse::<usize>() {
                    args.positional.get(index)
                } else {
                    args.keywords
                        .iter()
                        .find(|(key, _)| &**key == field)
                        .map(|(_, value)| value)
                };
                let Some(value) = value else {
                    return Err(if field.is_empty() || field.parse::<usize>().is_ok() {
                        Raised::index_error("Replacement index out of range for positional args tuple")
                    } else {
                        Raised::key_error(&Value::str(field))
                    });
                };

                let text = match conversion {
                    Some("r") => format_value(&Value::str(&value.repr()), spec)?,
                    Some("s") => format_value(&Value::str(&value.to_str()), spec)?,
                    Some(other) => {
                        return Err(Raised::value_error(format!(
                            "Unknown conversion specifier {other}"
                        )))
                    }
                    None => format_value(value, spec)?,
                };
                out.push_str(&text);
            }
            c => out.push(c),
        }
    }
    Ok(Value::str(&out))
}

fn sequence_method(items: &[Value], name: &str, args: &Args) -> Result<Value, Raised> {
    args.no_keywords(name)?;
    args.expect(name, 1, 1)?;
    let needle = &args.positional[0];
    match name {
        "count" => Ok(Value::Int(
            items.iter().filter(|item| py_eq(item, needle)).count() as i64,
        )),
        _ => items
            .iter()
            .position(|item| py_eq(item, needle))
            .map(|p| Value::Int(p as i64))
            .ok_or_else(|| Raised::value_error(format!("{} is not in list", needle.repr()))),
    }
}

fn list_method(
    machine: &mut Machine<'_>,
    receiver: &Value,
    name: &str,
    args: &mut Args,
) -> Result<Value, Raised> {
    let Value::List(list) = receiver else {
        return Err(Raised::type_error("expected a list"));
    };
    if name == "sort" {
        return sort_list(machine, receiver, args);
    }
    args.no_keywords(name)?;
    match name {
        "append" => {
            args.expect(name, 1, 1)?;
            ensure_len(list.borrow().len() + 1, MAX_SEQUENCE_LEN)?;
            list.borrow_mut().push(args.positional[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            args.expect(name, 1, 1)?;
            let extra = collect(&args.positional[0])?;
            ensure_len(list.borrow().len() + extra.len(), MAX_SEQUENCE_LEN)?;
            list.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "insert" => {
            args.expect(name, 2, 2)?;
            let mut items = list.borrow_mut();
            ensure_len(items.len() + 1, MAX_SEQUENCE_LEN)?;
            let len = items.len() as i64;
            let index = int_arg(args, 0, 0)?;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(index as usize, args.positional[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            args.expect(name, 0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(Raised::index_error("pop from empty list"));
            }
            let len = items.len() as i64;
            let index = int_arg(args, 0, -1)?;
            let index = if index < 0 { index + len } else { index };
            if !(0..len).contains(&index) {
                return Err(Raised::index_error("pop index out of range"));
            }
            Ok(items.remove(index as usize))
        }
        "remove" => {
            args.expect(name, 1, 1)?;
            let mut items = list.borrow_mut();
            let position = items
                .iter()
                .position(|item| py_eq(item, &args.positional[0]))
                .ok_or_else(|| Raised::value_error("list.remove(x): x not in list"))?;
            items.remove(position);
            Ok(Value::None)
        }
        "reverse" => {
            args.expect(name, 0, 0)?;
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "clear" => {
            args.expect(name, 0, 0)?;
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.expect(name, 0, 0)?;
            Ok(Value::list(list.borrow().clone()))
        }
        "count" | "index" => sequence_method(&list.borrow().clone(), name, args),
        _ => Err(Raised::new(
            "AttributeError",
            format!("'list' object has no attribute '{name}'"),
        )),
    }
}

/// `list.sort(key=None, reverse=False)`; stable in both directions.
fn sort_list(machine: &mut Machine<'_>, receiver: &Value, args: &mut Args) -> Result<Value, Raised> {
    let Value::List(list) = receiver else {
        return Ok(Value::None);
    };
    args.expect("sort", 0, 0)?;
    let key = args.take_keyword("key");
    let reverse = args
        .take_keyword("reverse")
        .is_some_and(|value| super::ops::truthy(&value));
    args.no_keywords("sort")?;

    let items = list.borrow().clone();
    let sorted = sort_values(machine, items, key.as_ref(), reverse)?;
    *list.borrow_mut() = sorted;
    Ok(Value::None)
}

/// Sort `items` by their natural order or by `key(item)`.
pub(crate) fn sort_values(
    machine: &mut Machine<'_>,
    items: Vec<Value>,
    key: Option<&Value>,
    reverse: bool,
) -> Result<Vec<Value>, Raised> {
    let keys = match key {
        Some(key) if !key.is_none() => {
            let mut keys = Vec::with_capacity(items.len());
            for item in &items {
                keys.push(machine.call(key, Args::positional(vec![item.clone()]))?);
            }
            keys
        }
        _ => items.clone(),
    };

    let mut order: Vec<usize> = (0..items.len()).collect();
    let mut failure = None;
    order.sort_by(|&a, &b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let (left, right) = if reverse { (&keys[b], &keys[a]) } else { (&keys[a], &keys[b]) };
        py_cmp(left, right, "<").unwrap_or_else(|err| {
            failure = Some(err);
            Ordering::Equal
        })
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(order.into_iter().map(|i| items[i].clone()).collect())
}

fn dict_method(receiver: &Value, name: &str, mut args: Args) -> Result<Value, Raised> {
    let Value::Dict(dict) = receiver else {
        return Err(Raised::type_error("expected a dict"));
    };
    if name == "update" {
        let mut updates = Vec::new();
        if let Some(other) = args.positional.first() {
            match other {
                Value::Dict(other) => {
                    updates.extend(other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())))
                }
                other => {
                    for pair in collect(other)? {
                        let pair = collect(&pair)?;
                        let [k, v] = <[Value; 2]>::try_from(pair).map_err(|_| {
                            Raised::value_error("dictionary update sequence element has wrong length")
                        })?;
                        updates.push((k, v));
                    }
                }
            }
        }
        args.expect(name, 0, 1)?;
        for (key, value) in args.keywords.drain(..) {
            updates.push((Value::Str(key), value));
        }
        let mut dict = dict.borrow_mut();
        for (key, value) in updates {
            dict.insert(key, value)?;
        }
        return Ok(Value::None);
    }

    args.no_keywords(name)?;
    match name {
        "get" => {
            args.expect(name, 1, 2)?;
            let default = args.positional.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.borrow().get(&args.positional[0])?.unwrap_or(default))
        }
        "keys" | "values" | "items" => {
            args.expect(name, 0, 0)?;
            let dict = dict.borrow();
            Ok(Value::list(match name {
                "keys" => dict.keys(),
                "values" => dict.values(),
                _ => dict.items(),
            }))
        }
        "pop" => {
            args.expect(name, 1, 2)?;
            let key = &args.positional[0];
            match (dict.borrow_mut().remove(key)?, args.positional.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(Raised::key_error(key)),
            }
        }
        "popitem" => {
            args.expect(name, 0, 0)?;
            dict.borrow_mut()
                .pop_last()
                .map(|(k, v)| Value::tuple(vec![k, v]))
                .ok_or_else(|| Raised::new("KeyError", "'popitem(): dictionary is empty'"))
        }
        "setdefault" => {
            args.expect(name, 1, 2)?;
            let key = args.positional[0].clone();
            let default = args.positional.get(1).cloned().unwrap_or(Value::None);
            let mut dict = dict.borrow_mut();
            if let Some(existing) = dict.get(&key)? {
                return Ok(existing);
            }
            dict.insert(key, default.clone())?;
            Ok(default)
        }
        "clear" => {
            args.expect(name, 0, 0)?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.expect(name, 0, 0)?;
            let mut copy = Dict::new();
            for (key, value) in dict.borrow().iter() {
                copy.insert(key.clone(), value.clone())?;
            }
            Ok(Value::dict(copy))
        }
        _ => Err(Raised::new(
            "AttributeError",
            format!("'dict' object has no attribute '{name}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_str(text: &str, name: &str, args: Vec<Value>) -> Result<Value, Raised> {
        str_method(&Rc::from(text), name, Args::positional(args))
    }

    #[test]
    fn test_method_tables() {
        assert!(has_method(&Value::str(""), "split"));
        assert!(has_method(&Value::list(vec![]), "append"));
        assert!(!has_method(&Value::list(vec![]), "__len__"));
        assert!(!has_method(&Value::None, "anything"));
    }

    #[test]
    fn test_split_variants() {
        let v = call_str("  a b  c ", "split", vec![]).unwrap();
        assert_eq!(v.repr(), "['a', 'b', 'c']");
        let v = call_str("a,b,,c", "split", vec![Value::str(",")]).unwrap();
        assert_eq!(v.repr(), "['a', 'b', '', 'c']");
        let v = call_str("a b c", "split", vec![Value::None, Value::Int(1)]).unwrap();
        assert_eq!(v.repr(), "['a', 'b c']");
        let err = call_str("abc", "split", vec![Value::str("")]).unwrap_err();
        assert_eq!(err.message, "empty separator");
    }

    #[test]
    fn test_join_requires_strings() {
        let items = Value::list(vec![Value::str("a"), Value::Int(1)]);
        let err = call_str(",", "join", vec![items]).unwrap_err();
        assert_eq!(err.message, "sequence item 1: expected str instance, int found");
    }

    #[test]
    fn test_format_fields() {
        let mut args = Args::positional(vec![Value::Int(1), Value::str("x")]);
        args.keywords.push((Rc::from("name"), Value::Float(2.5)));
        let v = str_format("{} {1!r} {name:.1f} {{}}", &args).unwrap();
        assert_eq!(v.to_str(), "1 'x' 2.5 {}");
        let err = str_format("{5}", &args).unwrap_err();
        assert_eq!(&*err.kind, "IndexError");
    }

    #[test]
    fn test_padding_methods() {
        assert_eq!(call_str("ab", "center", vec![Value::Int(6), Value::str("*")]).unwrap().to_str(), "**ab**");
        assert_eq!(call_str("7", "zfill", vec![Value::Int(3)]).unwrap().to_str(), "007");
        assert_eq!(call_str("-7", "zfill", vec![Value::Int(4)]).unwrap().to_str(), "-007");
        assert_eq!(call_str("ab", "rjust", vec![Value::Int(4)]).unwrap().to_str(), "  ab");
    }

    #[test]
    fn test_case_methods() {
        assert_eq!(call_str("hello world", "title", vec![]).unwrap().to_str(), "Hello World");
        assert_eq!(call_str("hELLO", "capitalize", vec![]).unwrap().to_str(), "Hello");
        assert!(matches!(call_str("123", "isdigit", vec![]).unwrap(), Value::Bool(true)));
    }

    #[test]
    fn test_find_counts_characters() {
        assert_eq!(call_str("héllo", "find", vec![Value::str("l")]).unwrap().as_int(), Some(2));
        let err = call_str("abc", "index", vec![Value::str("z")]).unwrap_err();
        assert_eq!(err.message, "substring not found");
    }

    #[test]
    fn test_dict_methods() {
        let dict = Value::dict(Dict::new());
        let set = |k: &str, v: i64| {
            dict_method(&dict, "setdefault", Args::positional(vec![Value::str(k), Value::Int(v)])).unwrap()
        };
        assert_eq!(set("a", 1).as_int(), Some(1));
        assert_eq!(set("a", 2).as_int(), Some(1));
        let got = dict_method(&dict, "get", Args::positional(vec![Value::str("zz"), Value::Int(0)])).unwrap();
        assert_eq!(got.as_int(), Some(0));
        let err = dict_method(&dict, "pop", Args::positional(vec![Value::str("zz")])).unwrap_err();
        assert_eq!(format!("{err:?}"), "KeyError: 'zz'");
    }
}
