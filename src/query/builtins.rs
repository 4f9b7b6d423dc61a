// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Built-in functions callable from queries

use serde_json::{Map, Value};

use super::eval::{Outputs, collect, compile_regex, eval, fail, index_value, nothing, single};
use super::parser::Filter;
use super::value::{self, compare, equals, is_truthy, number, preview, type_name};
use crate::error::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Empty,
    Error,
    Not,
    Length,
    Keys,
    Values,
    Has,
    Select,
    Map,
    Type,
    ToString,
    ToNumber,
    ToJson,
    First,
    Last,
    Add,
    Any,
    All,
    Min,
    Max,
    Sort,
    Unique,
    Reverse,
    Contains,
    StartsWith,
    EndsWith,
    Test,
    AsciiDowncase,
    AsciiUpcase,
    Join,
    Split,
    ToEntries,
    FromEntries,
}

/// Name, arity and implementation of every builtin
const BUILTINS: &[(&str, usize, Builtin)] = &[
    ("empty", 0, Builtin::Empty),
    ("error", 0, Builtin::Error),
    ("error", 1, Builtin::Error),
    ("not", 0, Builtin::Not),
    ("length", 0, Builtin::Length),
    ("keys", 0, Builtin::Keys),
    ("values", 0, Builtin::Values),
    ("has", 1, Builtin::Has),
    ("select", 1, Builtin::Select),
    ("map", 1, Builtin::Map),
    ("type", 0, Builtin::Type),
    ("tostring", 0, Builtin::ToString),
    ("tonumber", 0, Builtin::ToNumber),
    ("tojson", 0, Builtin::ToJson),
    ("first", 0, Builtin::First),
    ("first", 1, Builtin::First),
    ("last", 0, Builtin::Last),
    ("add", 0, Builtin::Add),
    ("any", 0, Builtin::Any),
    ("all", 0, Builtin::All),
    ("min", 0, Builtin::Min),
    ("max", 0, Builtin::Max),
    ("sort", 0, Builtin::Sort),
    ("unique", 0, Builtin::Unique),
    ("reverse", 0, Builtin::Reverse),
    ("contains", 1, Builtin::Contains),
    ("startswith", 1, Builtin::StartsWith),
    ("endswith", 1, Builtin::EndsWith),
    ("test", 1, Builtin::Test),
    ("ascii_downcase", 0, Builtin::AsciiDowncase),
    ("ascii_upcase", 0, Builtin::AsciiUpcase),
    ("join", 1, Builtin::Join),
    ("split", 1, Builtin::Split),
    ("to_entries", 0, Builtin::ToEntries),
    ("from_entries", 0, Builtin::FromEntries),
];

impl Builtin {
    pub fn lookup(name: &str, arity: usize) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(n, a, _)| *n == name && *a == arity)
            .map(|(_, _, b)| *b)
    }
}

fn error(message: String) -> EvaluationError {
    EvaluationError::new(message)
}

fn type_error(value: &Value, what: &str) -> EvaluationError {
    error(format!("{} ({}) {}", type_name(value), preview(value), what))
}

pub fn call<'a>(builtin: Builtin, args: &'a [Filter], input: Value) -> Outputs<'a> {
    match (builtin, args) {
        (Builtin::Empty, _) => nothing(),
        (Builtin::Error, []) => fail(error_from(input)),
        (Builtin::Error, [message]) => Box::new(
            eval(message, input).map(|m| m.and_then(|m| Err::<Value, _>(error_from(m)))),
        ),
        (Builtin::Values, _) => match input {
            Value::Null => nothing(),
            other => single(other),
        },
        (Builtin::Select, [condition]) => {
            let subject = input.clone();
            Box::new(eval(condition, input).filter_map(move |c| match c {
                Ok(c) if is_truthy(&c) => Some(Ok(subject.clone())),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }))
        }
        (Builtin::Map, [f]) => {
            let items = match input {
                Value::Array(items) => items,
                Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                other => return fail(error(format!("Cannot iterate over {}", type_name(&other)))),
            };
            let mut mapped = Vec::new();
            for item in items {
                match collect(f, item) {
                    Ok(outputs) => mapped.extend(outputs),
                    Err(e) => return fail(e),
                }
            }
            single(Value::Array(mapped))
        }
        (Builtin::First, [f]) => Box::new(eval(f, input).take(1)),
        (Builtin::Has, [key]) => with_arg(key, input, has),
        (Builtin::Contains, [other]) => with_arg(other, input, |a, b| {
            contains(a, &b).map(Value::Bool)
        }),
        (Builtin::StartsWith, [prefix]) => with_arg(prefix, input, |s, p| match (s, &p) {
            (Value::String(s), Value::String(p)) => Ok(Value::Bool(s.starts_with(p.as_str()))),
            _ => Err(error("startswith() requires string inputs".to_string())),
        }),
        (Builtin::EndsWith, [suffix]) => with_arg(suffix, input, |s, p| match (s, &p) {
            (Value::String(s), Value::String(p)) => Ok(Value::Bool(s.ends_with(p.as_str()))),
            _ => Err(error("endswith() requires string inputs".to_string())),
        }),
        (Builtin::Test, [pattern]) => with_arg(pattern, input, |s, p| match (s, &p) {
            (Value::String(s), Value::String(p)) => Ok(Value::Bool(compile_regex(p)?.is_match(s))),
            (Value::String(_), other) => Err(type_error(other, "cannot be matched, as it is not a string")),
            (other, _) => Err(type_error(other, "cannot be matched, as it is not a string")),
        }),
        (Builtin::Join, [separator]) => with_arg(separator, input, join),
        (Builtin::Split, [separator]) => with_arg(separator, input, |s, sep| match (s, &sep) {
            (Value::String(s), Value::String(sep)) => Ok(value::split_string(s, sep)),
            _ => Err(error("split input and separator must be strings".to_string())),
        }),
        (builtin, _) => match apply(builtin, input) {
            Ok(v) => single(v),
            Err(e) => fail(e),
        },
    }
}

/// Evaluate a single argument against the input and apply `f` per output
fn with_arg<'a>(
    arg: &'a Filter,
    input: Value,
    f: fn(&Value, Value) -> Result<Value, EvaluationError>,
) -> Outputs<'a> {
    let subject = input.clone();
    Box::new(eval(arg, input).map(move |a| a.and_then(|a| f(&subject, a))))
}

fn error_from(message: Value) -> EvaluationError {
    match message {
        Value::String(s) => error(s),
        other => error(format!("{} (not a string)", other)),
    }
}

/// Zero-argument builtins that map one input to one output
fn apply(builtin: Builtin, input: Value) -> Result<Value, EvaluationError> {
    match builtin {
        Builtin::Not => Ok(Value::Bool(!is_truthy(&input))),
        Builtin::Length => length(&input),
        Builtin::Keys => match &input {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                Ok(Value::Array(keys.into_iter().map(|k| Value::String(k.clone())).collect()))
            }
            Value::Array(items) => Ok(Value::Array((0..items.len()).map(Value::from).collect())),
            other => Err(type_error(other, "has no keys")),
        },
        Builtin::Type => Ok(Value::String(type_name(&input).to_string())),
        Builtin::ToString => match input {
            Value::String(s) => Ok(Value::String(s)),
            other => Ok(Value::String(other.to_string())),
        },
        Builtin::ToNumber => match input {
            Value::Number(n) => Ok(Value::Number(n)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(number)
                .map_err(|_| error(format!("Cannot parse '{}' as a number", s))),
            other => Err(type_error(&other, "cannot be parsed as a number")),
        },
        Builtin::ToJson => Ok(Value::String(input.to_string())),
        Builtin::First => index_value(&input, &Value::from(0)),
        Builtin::Last => index_value(&input, &Value::from(-1)),
        Builtin::Add => elements(input)?
            .into_iter()
            .try_fold(Value::Null, value::add),
        Builtin::Any => Ok(Value::Bool(elements(input)?.iter().any(is_truthy))),
        Builtin::All => Ok(Value::Bool(elements(input)?.iter().all(is_truthy))),
        Builtin::Min => Ok(array(input, "min")?
            .into_iter()
            .min_by(compare)
            .unwrap_or(Value::Null)),
        Builtin::Max => Ok(array(input, "max")?
            .into_iter()
            .max_by(compare)
            .unwrap_or(Value::Null)),
        Builtin::Sort => {
            let mut items = array(input, "sorted")?;
            items.sort_by(compare);
            Ok(Value::Array(items))
        }
        Builtin::Unique => {
            let mut items = array(input, "sorted")?;
            items.sort_by(compare);
            items.dedup_by(|a, b| equals(a, b));
            Ok(Value::Array(items))
        }
        Builtin::Reverse => match input {
            Value::Null => Ok(Value::Array(Vec::new())),
            Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
            Value::Array(mut items) => {
                items.reverse();
                Ok(Value::Array(items))
            }
            other => Err(type_error(&other, "cannot be reversed, as it is not an array")),
        },
        Builtin::AsciiDowncase => match input {
            Value::String(s) => Ok(Value::String(s.to_ascii_lowercase())),
            other => Err(type_error(&other, "cannot be ascii_downcased")),
        },
        Builtin::AsciiUpcase => match input {
            Value::String(s) => Ok(Value::String(s.to_ascii_uppercase())),
            other => Err(type_error(&other, "cannot be ascii_upcased")),
        },
        Builtin::ToEntries => match input {
            Value::Object(map) => Ok(Value::Array(
                map.into_iter()
                    .map(|(k, v)| {
                        let mut entry = Map::new();
                        entry.insert("key".to_string(), Value::String(k));
                        entry.insert("value".to_string(), v);
                        Value::Object(entry)
                    })
                    .collect(),
            )),
            other => Err(type_error(&other, "has no keys")),
        },
        Builtin::FromEntries => from_entries(input),
        // Generator and argument-taking builtins are dispatched by `call`
        _ => Err(error(format!("{:?} cannot be applied here", builtin))),
    }
}

fn length(input: &Value) -> Result<Value, EvaluationError> {
    match input {
        Value::Null => Ok(Value::from(0)),
        Value::Bool(_) => Err(type_error(input, "has no length")),
        Value::Number(n) => Ok(number(n.as_f64().unwrap_or_default().abs())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
    }
}

/// Array items or object values
fn elements(input: Value) -> Result<Vec<Value>, EvaluationError> {
    match input {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        other => Err(error(format!("Cannot iterate over {}", type_name(&other)))),
    }
}

fn array(input: Value, verb: &str) -> Result<Vec<Value>, EvaluationError> {
    match input {
        Value::Array(items) => Ok(items),
        other => Err(type_error(&other, &format!("cannot be {}, as it is not an array", verb))),
    }
}

fn has(subject: &Value, key: Value) -> Result<Value, EvaluationError> {
    match (subject, &key) {
        (Value::Object(map), Value::String(k)) => Ok(Value::Bool(map.contains_key(k))),
        (Value::Array(items), Value::Number(n)) => {
            let idx = n.as_f64().unwrap_or(-1.0);
            Ok(Value::Bool(idx >= 0.0 && (idx as usize) < items.len()))
        }
        _ => Err(error(format!(
            "Cannot check whether {} has a {} key",
            type_name(subject),
            type_name(&key)
        ))),
    }
}

fn contains(a: &Value, b: &Value) -> Result<bool, EvaluationError> {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            for (key, expected) in y {
                match x.get(key) {
                    Some(actual) if contains(actual, expected)? => {}
                    _ => return Ok(false),
                }
            }
            Ok(true)
        }
        (Value::Array(x), Value::Array(y)) => {
            for expected in y {
                let mut found = false;
                for actual in x {
                    if contains(actual, expected)? {
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::String(x), Value::String(y)) => Ok(x.contains(y.as_str())),
        _ if type_name(a) == type_name(b) => Ok(equals(a, b)),
        _ => Err(error(format!(
            "{} ({}) and {} ({}) cannot have their containment checked",
            type_name(a),
            preview(a),
            type_name(b),
            preview(b)
        ))),
    }
}

fn join(subject: &Value, separator: Value) -> Result<Value, EvaluationError> {
    let Value::String(separator) = separator else {
        return Err(type_error(&separator, "cannot be used as a join separator"));
    };
    let items = match subject {
        Value::Array(items) => items,
        other => return Err(error(format!("Cannot iterate over {}", type_name(other)))),
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => parts.push(String::new()),
            Value::String(s) => parts.push(s.clone()),
            Value::Number(_) | Value::Bool(_) => parts.push(item.to_string()),
            other => {
                return Err(error(format!("Cannot join with {}", type_name(other))));
            }
        }
    }
    Ok(Value::String(parts.join(&separator)))
}

fn from_entries(input: Value) -> Result<Value, EvaluationError> {
    let entries = match input {
        Value::Array(entries) => entries,
        other => return Err(error(format!("Cannot iterate over {}", type_name(&other)))),
    };
    let mut out = Map::new();
    for entry in entries {
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| entry.get(*n).filter(|v| !v.is_null()))
                .cloned()
        };
        let key = match field(&["key", "k", "name", "Name", "Key", "K"]) {
            Some(Value::String(s)) => s,
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
            Some(other) => {
                return Err(type_error(&other, "cannot be used as an object key"));
            }
            None => return Err(error("Cannot use null (null) as object key".to_string())),
        };
        let value = field(&["value", "v", "Value", "V"]).unwrap_or(Value::Null);
        out.insert(key, value);
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use serde_json::json;

    fn run(query: &str, input: Value) -> Vec<Result<Value, String>> {
        let filter = parse(query).unwrap();
        eval(&filter, input).map(|r| r.map_err(|e| e.message)).collect()
    }

    fn one(query: &str, input: Value) -> Value {
        let mut out = run(query, input);
        assert_eq!(out.len(), 1, "{query} produced {out:?}");
        out.remove(0).unwrap()
    }

    fn pods() -> Value {
        json!([
            {"metadata": {"name": "web-1", "namespace": "default"}, "status": {"phase": "Running"}},
            {"metadata": {"name": "web-2", "namespace": "default"}, "status": {"phase": "Pending"}},
            {"metadata": {"name": "dns-1", "namespace": "kube-system"}, "status": {"phase": "Running"}}
        ])
    }

    #[test]
    fn test_lookup_respects_arity() {
        assert_eq!(Builtin::lookup("first", 0), Some(Builtin::First));
        assert_eq!(Builtin::lookup("first", 1), Some(Builtin::First));
        assert_eq!(Builtin::lookup("select", 0), None);
        assert_eq!(Builtin::lookup("bogus", 0), None);
    }

    #[test]
    fn test_select_and_map() {
        assert_eq!(
            one(r#"map(select(.status.phase == "Running") | .metadata.name)"#, pods()),
            json!(["web-1", "dns-1"])
        );
        assert_eq!(
            one(r#"[.[] | select(.metadata.namespace == "default")] | length"#, pods()),
            json!(2)
        );
    }

    #[test]
    fn test_empty_and_error() {
        assert_eq!(run("empty", json!(1)), vec![]);
        assert_eq!(run(r#"error("nope")"#, json!(1)), vec![Err("nope".to_string())]);
        assert_eq!(run("error", json!("from input")), vec![Err("from input".to_string())]);
    }

    #[test]
    fn test_length_keys_values() {
        assert_eq!(one("length", json!("héllo")), json!(5));
        assert_eq!(one("length", json!(null)), json!(0));
        assert_eq!(one("length", json!(-3)), json!(3));
        assert!(run("length", json!(true))[0].is_err());
        assert_eq!(one("keys", json!({"b": 1, "a": 2})), json!(["a", "b"]));
        assert_eq!(one("keys", json!([5, 6])), json!([0, 1]));
        assert_eq!(run("values", json!(null)), vec![]);
        assert_eq!(one("[.[] | values]", json!([1, null, 2])), json!([1, 2]));
    }

    #[test]
    fn test_has() {
        assert_eq!(one(r#"has("a")"#, json!({"a": null})), json!(true));
        assert_eq!(one("has(2)", json!([1, 2])), json!(false));
        assert!(run("has(0)", json!({"a": 1}))[0].is_err());
    }

    #[test]
    fn test_type_conversions() {
        assert_eq!(one("type", json!([])), json!("array"));
        assert_eq!(one("tostring", json!({"a": 1})), json!(r#"{"a":1}"#));
        assert_eq!(one("tostring", json!("x")), json!("x"));
        assert_eq!(one("tonumber", json!("42")), json!(42));
        assert!(run("tonumber", json!("forty")).remove(0).is_err());
        assert_eq!(one("tojson", json!("x")), json!("\"x\""));
    }

    #[test]
    fn test_first_last() {
        assert_eq!(one("first", json!([3, 4])), json!(3));
        assert_eq!(one("last", json!([3, 4])), json!(4));
        assert_eq!(one("first", json!([])), json!(null));
        assert_eq!(one("first(.[] | select(. > 3))", json!([1, 5, 7])), json!(5));
        assert_eq!(run("first(empty)", json!(null)), vec![]);
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(one("add", json!([1, 2, 3])), json!(6));
        assert_eq!(one("add", json!(["a", "b"])), json!("ab"));
        assert_eq!(one("add", json!([])), json!(null));
        assert_eq!(one("any", json!([false, 1])), json!(true));
        assert_eq!(one("all", json!([true, null])), json!(false));
        assert_eq!(one("all", json!([])), json!(true));
        assert_eq!(one("min", json!([3, 1, 2])), json!(1));
        assert_eq!(one("max", json!(["a", "c", "b"])), json!("c"));
        assert_eq!(one("max", json!([])), json!(null));
    }

    #[test]
    fn test_sort_unique_reverse() {
        assert_eq!(one("sort", json!([3, null, "a", 1])), json!([null, 1, 3, "a"]));
        assert_eq!(one("unique", json!([2, 1, 2, 1.0])), json!([1, 2]));
        assert_eq!(one("reverse", json!([1, 2])), json!([2, 1]));
        assert_eq!(one("reverse", json!("abc")), json!("cba"));
        assert!(run("sort", json!({})).remove(0).is_err());
    }

    #[test]
    fn test_contains() {
        assert_eq!(one(r#"contains("bar")"#, json!("foobar")), json!(true));
        assert_eq!(one(r#"contains(["a"])"#, json!(["abc", "d"])), json!(true));
        assert_eq!(
            one(r#"contains({"metadata": {"labels": {"app": "web"}}})"#,
                json!({"metadata": {"labels": {"app": "web", "tier": "fe"}}})),
            json!(true)
        );
        assert_eq!(one("contains(1)", json!(2)), json!(false));
        assert!(run(r#"contains("a")"#, json!(1)).remove(0).is_err());
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(one(r#"startswith("web")"#, json!("web-1")), json!(true));
        assert_eq!(one(r#"endswith("-2")"#, json!("web-1")), json!(false));
        assert_eq!(one(r#"test("^web-[0-9]+$")"#, json!("web-12")), json!(true));
        assert!(run(r#"test("(")"#, json!("x")).remove(0).is_err());
        assert_eq!(one("ascii_downcase", json!("ReAdY")), json!("ready"));
        assert_eq!(one("ascii_upcase", json!("ready")), json!("READY"));
        assert_eq!(one(r#"join(",")"#, json!(["a", 1, null, true])), json!("a,1,,true"));
        assert_eq!(one(r#"split("/")"#, json!("apps/v1")), json!(["apps", "v1"]));
    }

    #[test]
    fn test_entries() {
        assert_eq!(
            one("to_entries", json!({"a": 1})),
            json!([{"key": "a", "value": 1}])
        );
        assert_eq!(
            one("from_entries", json!([{"name": "a", "value": 1}, {"k": "b", "v": 2}])),
            json!({"a": 1, "b": 2})
        );
        assert_eq!(
            one("to_entries | map(select(.value > 1)) | from_entries", json!({"a": 1, "b": 2})),
            json!({"b": 2})
        );
    }
}
