//! Methods of the built-in container and string types.

use std::rc::Rc;

use super::error::{RuntimeError, RuntimeResult};
use super::evaluator::{normalize_index, Interpreter};
use super::format::format_with_spec;
use super::stdlib::sort_values;
use super::values::{Arity, CallArgs, DictKey, Value};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "count", "isdigit", "splitlines", "format", "title", "zfill",
];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "pop", "insert", "remove", "index", "count", "sort", "reverse", "copy",
    "clear",
];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "update", "setdefault", "copy", "clear",
];
const TUPLE_METHODS: &[&str] = &["index", "count"];

fn method_table(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        _ => &[],
    }
}

pub fn has_method(value: &Value, name: &str) -> bool {
    method_table(value).contains(&name)
}

/// Dispatch `receiver.name(args)` for built-in types.
pub fn call(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: CallArgs,
) -> RuntimeResult<Value> {
    if !has_method(receiver, name) {
        return Err(RuntimeError::attribute_not_found(&receiver.type_name(), name));
    }
    let qualified = format!("{}.{}", receiver.type_name(), name);
    match receiver {
        Value::Str(text) => str_method(text, name, &qualified, args),
        Value::List(_) => list_method(interp, receiver, name, &qualified, args),
        Value::Dict(_) => dict_method(interp, receiver, name, &qualified, args),
        Value::Tuple(items) => sequence_query(interp, items, name, &qualified, args),
        _ => Err(RuntimeError::attribute_not_found(&receiver.type_name(), name)),
    }
}

fn arity(args: &CallArgs, qualified: &str, arity: Arity) -> RuntimeResult<()> {
    args.check_arity(qualified, &arity)?;
    args.reject_keywords(qualified)
}

fn str_arg(args: &CallArgs, index: usize, qualified: &str) -> RuntimeResult<Rc<str>> {
    args.get(index)
        .ok_or_else(|| RuntimeError::InternalError(format!("{qualified}: missing argument")))?
        .expect_str(qualified)
}

/// Optional character-set argument of the strip family; `None` means whitespace.
fn strip_chars(args: &CallArgs, qualified: &str) -> RuntimeResult<Option<Vec<char>>> {
    match args.get(0) {
        None | Some(Value::None) => Ok(None),
        Some(value) => Ok(Some(value.expect_str(qualified)?.chars().collect())),
    }
}

fn str_method(text: &Rc<str>, name: &str, qualified: &str, args: CallArgs) -> RuntimeResult<Value> {
    if name == "format" {
        return format_str(text, args).map(Value::from);
    }
    if name == "split" {
        return split(text, args, qualified);
    }
    match name {
        "upper" | "lower" | "isdigit" | "splitlines" | "title" => arity(&args, qualified, Arity::Fixed(0))?,
        "strip" | "lstrip" | "rstrip" => arity(&args, qualified, Arity::Range(0, 1))?,
        "find" | "count" | "startswith" | "endswith" | "join" | "zfill" => {
            arity(&args, qualified, Arity::Fixed(1))?
        }
        "replace" => arity(&args, qualified, Arity::Fixed(2))?,
        _ => {}
    }
    Ok(match name {
        "upper" => text.to_uppercase().into(),
        "lower" => text.to_lowercase().into(),
        "title" => title_case(text).into(),
        "strip" => match strip_chars(&args, qualified)? {
            None => text.trim().into(),
            Some(chars) => text.trim_matches(chars.as_slice()).into(),
        },
        "lstrip" => match strip_chars(&args, qualified)? {
            None => text.trim_start().into(),
            Some(chars) => text.trim_start_matches(chars.as_slice()).into(),
        },
        "rstrip" => match strip_chars(&args, qualified)? {
            None => text.trim_end().into(),
            Some(chars) => text.trim_end_matches(chars.as_slice()).into(),
        },
        "join" => {
            let items = args.positional[0].clone();
            let mut parts = Vec::new();
            for item in join_items(&items)? {
                parts.push(item.expect_str(qualified)?.to_string());
            }
            parts.join(&**text).into()
        }
        "replace" => {
            let from = str_arg(&args, 0, qualified)?;
            let to = str_arg(&args, 1, qualified)?;
            text.replace(&*from, &to).into()
        }
        "startswith" => Value::Bool(text.starts_with(&*str_arg(&args, 0, qualified)?)),
        "endswith" => Value::Bool(text.ends_with(&*str_arg(&args, 0, qualified)?)),
        "find" => {
            let needle = str_arg(&args, 0, qualified)?;
            match text.find(&*needle) {
                Some(byte_index) => Value::Int(text[..byte_index].chars().count() as i64),
                None => Value::Int(-1),
            }
        }
        "count" => {
            let needle = str_arg(&args, 0, qualified)?;
            if needle.is_empty() {
                Value::Int(text.chars().count() as i64 + 1)
            } else {
                Value::Int(text.matches(&*needle).count() as i64)
            }
        }
        "isdigit" => Value::Bool(!text.is_empty() && text.chars().all(|c| c.is_ascii_digit())),
        "splitlines" => Value::list(text.lines().map(Value::from).collect()),
        "zfill" => {
            let width = args.positional[0].expect_int(qualified)?.max(0) as usize;
            let length = text.chars().count();
            if length >= width {
                text.to_string().into()
            } else {
                let (sign, digits) = match text.strip_prefix(['-', '+']) {
                    Some(rest) => (&text[..1], rest),
                    None => ("", &text[..]),
                };
                format!("{sign}{}{digits}", "0".repeat(width - length)).into()
            }
        }
        _ => return Err(RuntimeError::attribute_not_found("str", name)),
    })
}

fn join_items(items: &Value) -> RuntimeResult<Vec<Value>> {
    match items {
        Value::List(list) => Ok(list.borrow().clone()),
        Value::Tuple(tuple) => Ok(tuple.to_vec()),
        Value::Dict(entries) => Ok(entries.borrow().keys().map(DictKey::to_value).collect()),
        other => Err(RuntimeError::type_error("iterable", &other.type_name(), "str.join")),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn split(text: &str, mut args: CallArgs, qualified: &str) -> RuntimeResult<Value> {
    let maxsplit = args.take_keyword("maxsplit");
    let separator = args.take_keyword("sep");
    args.check_arity(qualified, &Arity::Range(0, 2))?;
    args.reject_keywords(qualified)?;
    let separator = separator.or_else(|| args.get(0).cloned()).unwrap_or(Value::None);
    let limit = match maxsplit.or_else(|| args.get(1).cloned()) {
        Some(value) if !value.is_none() => value.expect_int(qualified)?,
        _ => -1,
    };

    let parts: Vec<String> = match &separator {
        Value::None => {
            let mut parts = Vec::new();
            let mut rest = text.trim_start();
            while !rest.is_empty() {
                if limit >= 0 && parts.len() as i64 == limit {
                    parts.push(rest.trim_end().to_string());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            parts
        }
        Value::Str(sep) if sep.is_empty() => {
            return Err(RuntimeError::value_error("empty separator"));
        }
        Value::Str(sep) => {
            if limit >= 0 {
                text.splitn(limit as usize + 1, &**sep)
                    .map(str::to_string)
                    .collect()
            } else {
                text.split(&**sep).map(str::to_string).collect()
            }
        }
        other => return Err(RuntimeError::type_error("str or None", &other.type_name(), qualified)),
    };
    Ok(Value::list(parts.into_iter().map(Value::from).collect()))
}

/// `"{} and {name:>4}".format(...)`.
fn format_str(template: &str, args: CallArgs) -> RuntimeResult<String> {
    let mut out = String::new();
    let mut auto_index = 0;
    let mut chars = template.chars().peekable();
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
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(RuntimeError::value_error(
                                "single '{' encountered in format string",
                            ))
                        }
                    }
                }
                let (name, spec) = match field.split_once(':') {
                    Some((name, spec)) => (name.trim(), spec),
                    None => (field.trim(), ""),
                };
                let value = if name.is_empty() {
                    let value = args.get(auto_index).cloned();
                    auto_index += 1;
                    value.ok_or_else(|| {
                        RuntimeError::IndexOutOfBounds {
                            index: auto_index as i64 - 1,
                            length: args.len(),
                        }
                    })?
                } else if let Ok(index) = name.parse::<usize>() {
                    args.get(index)
                        .cloned()
                        .ok_or(RuntimeError::IndexOutOfBounds {
                            index: index as i64,
                            length: args.len(),
                        })?
                } else {
                    args.keywords
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| RuntimeError::KeyNotFound {
                            key: format!("'{name}'"),
                        })?
                };
                out.push_str(&format_with_spec(&value, spec)?);
            }
            '}' => {
                return Err(RuntimeError::value_error(
                    "single '}' encountered in format string",
                ))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn list_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    qualified: &str,
    mut args: CallArgs,
) -> RuntimeResult<Value> {
    let Value::List(list) = receiver else {
        return Err(RuntimeError::attribute_not_found(&receiver.type_name(), name));
    };
    if name == "sort" {
        let key = args.take_keyword("key");
        let reverse = match args.take_keyword("reverse") {
            Some(value) => value.is_truthy(),
            None => false,
        };
        arity(&args, qualified, Arity::Fixed(0))?;
        let items = list.borrow().clone();
        let sorted = sort_values(interp, items, key, reverse)?;
        *list.borrow_mut() = sorted;
        return Ok(Value::None);
    }
    if name == "extend" {
        arity(&args, qualified, Arity::Fixed(1))?;
        let extra = interp.collect_items(&args.positional[0])?;
        list.borrow_mut().extend(extra);
        return Ok(Value::None);
    }
    if matches!(name, "index" | "count") {
        let snapshot = list.borrow().clone();
        return sequence_query(interp, &snapshot, name, qualified, args);
    }
    if name == "remove" {
        arity(&args, qualified, Arity::Fixed(1))?;
        let snapshot = list.borrow().clone();
        let index = position_of(interp, &snapshot, &args.positional[0])?
            .ok_or_else(|| RuntimeError::value_error("list.remove(x): x not in list"))?;
        list.borrow_mut().remove(index);
        return Ok(Value::None);
    }

    match name {
        "append" => arity(&args, qualified, Arity::Fixed(1))?,
        "pop" => arity(&args, qualified, Arity::Range(0, 1))?,
        "insert" => arity(&args, qualified, Arity::Fixed(2))?,
        _ => arity(&args, qualified, Arity::Fixed(0))?,
    }
    let mut items = list.borrow_mut();
    Ok(match name {
        "append" => {
            items.push(args.positional[0].clone());
            Value::None
        }
        "pop" => {
            if items.is_empty() {
                return Err(RuntimeError::value_error("pop from empty list"));
            }
            let index = match args.get(0) {
                Some(value) => normalize_index(value.expect_int(qualified)?, items.len())?,
                None => items.len() - 1,
            };
            items.remove(index)
        }
        "insert" => {
            let length = items.len() as i64;
            let index = args.positional[0].expect_int(qualified)?;
            let resolved = if index < 0 { index + length } else { index };
            items.insert(resolved.clamp(0, length) as usize, args.positional[1].clone());
            Value::None
        }
        "reverse" => {
            items.reverse();
            Value::None
        }
        "copy" => Value::list(items.clone()),
        "clear" => {
            items.clear();
            Value::None
        }
        _ => return Err(RuntimeError::attribute_not_found("list", name)),
    })
}

fn sequence_query(
    interp: &Interpreter,
    items: &[Value],
    name: &str,
    qualified: &str,
    args: CallArgs,
) -> RuntimeResult<Value> {
    arity(&args, qualified, Arity::Fixed(1))?;
    let target = &args.positional[0];
    match name {
        "index" => position_of(interp, items, target)?
            .map(|index| Value::Int(index as i64))
            .ok_or_else(|| RuntimeError::value_error(format!("{} is not in sequence", target.repr()))),
        "count" => {
            let mut count = 0;
            for item in items {
                if interp.values_equal(item, target)? {
                    count += 1;
                }
            }
            Ok(Value::Int(count))
        }
        _ => Err(RuntimeError::attribute_not_found("tuple", name)),
    }
}

fn position_of(interp: &Interpreter, items: &[Value], target: &Value) -> RuntimeResult<Option<usize>> {
    for (index, item) in items.iter().enumerate() {
        if interp.values_equal(item, target)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn dict_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    qualified: &str,
    args: CallArgs,
) -> RuntimeResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Err(RuntimeError::attribute_not_found(&receiver.type_name(), name));
    };
    match name {
        "get" | "pop" => arity(&args, qualified, Arity::Range(1, 2))?,
        "setdefault" => arity(&args, qualified, Arity::Range(1, 2))?,
        "update" => arity(&args, qualified, Arity::Fixed(1))?,
        _ => arity(&args, qualified, Arity::Fixed(0))?,
    }

    if name == "update" {
        let pairs = pairs_of(interp, &args.positional[0])?;
        dict.borrow_mut().extend(pairs);
        return Ok(Value::None);
    }

    let mut entries = dict.borrow_mut();
    Ok(match name {
        "get" => {
            let key = DictKey::from_value(&args.positional[0])?;
            entries
                .get(&key)
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None))
        }
        "pop" => {
            let key = DictKey::from_value(&args.positional[0])?;
            match entries.shift_remove(&key) {
                Some(value) => value,
                None => match args.get(1) {
                    Some(default) => default.clone(),
                    None => {
                        return Err(RuntimeError::KeyNotFound {
                            key: args.positional[0].repr(),
                        })
                    }
                },
            }
        }
        "setdefault" => {
            let key = DictKey::from_value(&args.positional[0])?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            entries.entry(key).or_insert(default).clone()
        }
        "keys" => Value::list(entries.keys().map(DictKey::to_value).collect()),
        "values" => Value::list(entries.values().cloned().collect()),
        "items" => Value::list(
            entries
                .iter()
                .map(|(key, value)| Value::tuple(vec![key.to_value(), value.clone()]))
                .collect(),
        ),
        "copy" => Value::dict(entries.clone()),
        "clear" => {
            entries.clear();
            Value::None
        }
        _ => return Err(RuntimeError::attribute_not_found("dict", name)),
    })
}

/// Key/value pairs from a dict or an iterable of 2-item sequences.
pub(crate) fn pairs_of(interp: &Interpreter, source: &Value) -> RuntimeResult<Vec<(DictKey, Value)>> {
    if let Value::Dict(entries) = source {
        return Ok(entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect());
    }
    let mut pairs = Vec::new();
    for item in interp.iterate(source)? {
        let pair = interp.collect_items(&item?)?;
        let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
            RuntimeError::value_error(format!(
                "dictionary update sequence element has length {}; 2 is required",
                pair.len()
            ))
        })?;
        pairs.push((DictKey::from_value(&key)?, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(values: Vec<Value>) -> CallArgs {
        CallArgs::positional(values)
    }

    #[test]
    fn test_split_variants() {
        let cases = vec![
            ("  a  b c ", vec![], "['a', 'b', 'c']"),
            ("a,b,,c", vec![Value::from(",")], "['a', 'b', '', 'c']"),
            ("a,b,c", vec![Value::from(","), Value::Int(1)], "['a', 'b,c']"),
            ("a b c", vec![Value::None, Value::Int(1)], "['a', 'b c']"),
        ];
        for (text, call_args, expected) in cases {
            let result = split(text, args(call_args), "str.split").unwrap();
            assert_eq!(result.repr(), expected, "{text:?}");
        }
    }

    #[test]
    fn test_format_fields() {
        let mut call_args = args(vec![Value::Int(3), Value::Float(1.5)]);
        call_args.keywords.push(("net".into(), Value::from("GND")));
        assert_eq!(
            format_str("{} pads, {1:.2f} mm on {net} {{ok}}", call_args).unwrap(),
            "3 pads, 1.50 mm on GND {ok}"
        );
        assert!(format_str("{", CallArgs::default()).is_err());
    }

    #[test]
    fn test_string_helpers() {
        let text: Rc<str> = Rc::from("xxnetxx");
        assert_eq!(
            str_method(&text, "strip", "str.strip", args(vec![Value::from("x")])).unwrap(),
            Value::from("net")
        );
        assert_eq!(title_case("top copper layer"), "Top Copper Layer");
        let number: Rc<str> = Rc::from("-42");
        assert_eq!(
            str_method(&number, "zfill", "str.zfill", args(vec![Value::Int(5)])).unwrap(),
            Value::from("-0042")
        );
    }

    #[test]
    fn test_method_table() {
        assert!(has_method(&Value::from("x"), "upper"));
        assert!(has_method(&Value::list(vec![]), "append"));
        assert!(!has_method(&Value::Int(1), "append"));
        assert!(!has_method(&Value::tuple(vec![]), "append"));
    }
}
