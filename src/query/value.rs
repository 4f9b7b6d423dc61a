// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Value semantics of the query language on top of `serde_json::Value`:
//! type names, truthiness, total ordering and arithmetic.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::error::EvaluationError;

/// Largest integer an f64 represents exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Upper bound on the length of a string built by repetition
const MAX_REPEAT_LEN: usize = 1 << 26;

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `false` and `null` are falsy, everything else is truthy
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Build a number value, keeping integral results as integers
pub fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Short rendering of a value for error messages
pub fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 30 {
        let truncated: String = text.chars().take(27).collect();
        format!("{}...", truncated)
    } else {
        text
    }
}

/// Negate a number, staying exact for integers
pub fn negate(n: &Number) -> Value {
    match n.as_i64().and_then(i64::checked_neg) {
        Some(i) => Value::from(i),
        None => number(-n.as_f64().unwrap_or_default()),
    }
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Rebuild a value with sorted object keys and integral floats as integers
pub fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) if as_integer(n).is_some() => value.clone(),
        Value::Number(n) => n.as_f64().map(number).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total order: null < false < true < numbers < strings < arrays < objects
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (as_integer(x), as_integer(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let mut xk: Vec<&String> = x.keys().collect();
            let mut yk: Vec<&String> = y.keys().collect();
            xk.sort();
            yk.sort();
            let ord = xk.cmp(&yk);
            if ord != Ordering::Equal {
                return ord;
            }
            for key in xk {
                let ord = compare(&x[key], &y[key]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

pub fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Ordering::Equal
}

fn arithmetic_error(a: &Value, b: &Value, verb: &str) -> EvaluationError {
    EvaluationError::new(format!(
        "{} ({}) and {} ({}) cannot be {}",
        type_name(a),
        preview(a),
        type_name(b),
        preview(b),
        verb
    ))
}

pub fn add(a: Value, b: Value) -> Result<Value, EvaluationError> {
    match (a, b) {
        (Value::Null, b) => Ok(b),
        (a, Value::Null) => Ok(a),
        (Value::Number(x), Value::Number(y)) => Ok(number(
            x.as_f64().unwrap_or_default() + y.as_f64().unwrap_or_default(),
        )),
        (Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
        (Value::Array(mut x), Value::Array(y)) => {
            x.extend(y);
            Ok(Value::Array(x))
        }
        (Value::Object(mut x), Value::Object(y)) => {
            x.extend(y);
            Ok(Value::Object(x))
        }
        (a, b) => Err(arithmetic_error(&a, &b, "added")),
    }
}

pub fn subtract(a: Value, b: Value) -> Result<Value, EvaluationError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(number(
            x.as_f64().unwrap_or_default() - y.as_f64().unwrap_or_default(),
        )),
        (Value::Array(x), Value::Array(y)) => Ok(Value::Array(
            x.into_iter()
                .filter(|item| !y.iter().any(|r| equals(item, r)))
                .collect(),
        )),
        (a, b) => Err(arithmetic_error(&a, &b, "subtracted")),
    }
}

fn deep_merge(mut target: Map<String, Value>, source: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in source {
        let merged = match (target.remove(&key), value) {
            (Some(Value::Object(l)), Value::Object(r)) => Value::Object(deep_merge(l, r)),
            (_, r) => r,
        };
        target.insert(key, merged);
    }
    target
}

pub fn multiply(a: Value, b: Value) -> Result<Value, EvaluationError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(number(
            x.as_f64().unwrap_or_default() * y.as_f64().unwrap_or_default(),
        )),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            let times = n.as_f64().unwrap_or_default();
            if times <= 0.0 {
                return Ok(Value::Null);
            }
            let limit = MAX_REPEAT_LEN / s.len().max(1);
            if times.ceil() > limit as f64 {
                return Err(EvaluationError::new(format!(
                    "string ({}) cannot be repeated {} times",
                    preview(&Value::String(s)),
                    n
                )));
            }
            Ok(Value::String(s.repeat(times.ceil() as usize)))
        }
        (Value::Object(x), Value::Object(y)) => Ok(Value::Object(deep_merge(x, y))),
        (a, b) => Err(arithmetic_error(&a, &b, "multiplied")),
    }
}

pub fn divide(a: Value, b: Value) -> Result<Value, EvaluationError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let divisor = y.as_f64().unwrap_or_default();
            if divisor == 0.0 {
                return Err(EvaluationError::new(format!(
                    "number ({}) and number ({}) cannot be divided because the divisor is zero",
                    x, y
                )));
            }
            Ok(number(x.as_f64().unwrap_or_default() / divisor))
        }
        (Value::String(x), Value::String(y)) => Ok(split_string(&x, &y)),
        (a, b) => Err(arithmetic_error(&a, &b, "divided")),
    }
}

pub fn modulo(a: Value, b: Value) -> Result<Value, EvaluationError> {
    match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default() as i64;
            let y = y.as_f64().unwrap_or_default() as i64;
            if y == 0 {
                return Err(EvaluationError::new(format!(
                    "number ({}) and number ({}) cannot be divided because the divisor is zero",
                    x, y
                )));
            }
            x.checked_rem(y).map(Value::from).ok_or_else(|| {
                EvaluationError::new(format!(
                    "number ({}) and number ({}) cannot be divided because the remainder overflows",
                    x, y
                ))
            })
        }
        _ => Err(arithmetic_error(&a, &b, "divided")),
    }
}

pub fn split_string(s: &str, separator: &str) -> Value {
    if s.is_empty() {
        return Value::Array(vec![]);
    }
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(separator)
            .map(|p| Value::String(p.to_string()))
            .collect()
    };
    Value::Array(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(0)));
        assert!(is_truthy(&json!("")));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn test_number_keeps_integers() {
        assert_eq!(number(3.0), json!(3));
        assert_eq!(number(2.5), json!(2.5));
        assert_eq!(number(f64::NAN), Value::Null);
    }

    #[test]
    fn test_type_ordering() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(-1),
            json!(10),
            json!("a"),
            json!("b"),
            json!([1]),
            json!([1, 2]),
            json!({"a": 1}),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare(&pair[0], &pair[1]), Ordering::Less, "{:?}", pair);
        }
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        assert!(equals(&json!(1), &json!(1.0)));
        assert!(!equals(&json!(1), &json!("1")));
    }

    #[test]
    fn test_canonical_sorts_and_normalizes() {
        let value = json!({"b": 1.0, "a": [2.0, 2.5]});
        assert_eq!(
            serde_json::to_string(&canonical(&value)).unwrap(),
            r#"{"a":[2,2.5],"b":1}"#
        );
    }

    #[test]
    fn test_add() {
        assert_eq!(add(json!(1), json!(2)).unwrap(), json!(3));
        assert_eq!(add(json!("a"), json!("b")).unwrap(), json!("ab"));
        assert_eq!(add(json!(null), json!(5)).unwrap(), json!(5));
        assert_eq!(add(json!([1]), json!([2])).unwrap(), json!([1, 2]));
        assert_eq!(
            add(json!({"a": 1}), json!({"b": 2})).unwrap(),
            json!({"a": 1, "b": 2})
        );
        let err = add(json!(1), json!("a")).unwrap_err();
        assert!(err.message.contains("cannot be added"));
    }

    #[test]
    fn test_subtract_and_divide() {
        assert_eq!(subtract(json!([1, 2, 1, 3]), json!([1])).unwrap(), json!([2, 3]));
        assert_eq!(divide(json!(7), json!(2)).unwrap(), json!(3.5));
        assert_eq!(divide(json!("a,b"), json!(",")).unwrap(), json!(["a", "b"]));
        assert!(divide(json!(1), json!(0)).is_err());
        assert_eq!(modulo(json!(7), json!(3)).unwrap(), json!(1));
    }

    #[test]
    fn test_modulo_overflow_is_an_error() {
        let err = modulo(json!(i64::MIN), json!(-1)).unwrap_err();
        assert!(err.message.contains("remainder overflows"), "{}", err.message);
        // out-of-range dividends saturate before the remainder
        assert!(modulo(json!(-1e19), json!(-1)).is_err());
        assert_eq!(modulo(json!(-7), json!(3)).unwrap(), json!(-1));
    }

    #[test]
    fn test_repeat_is_bounded() {
        let err = multiply(json!("ab"), json!(1e19)).unwrap_err();
        assert!(err.message.contains("cannot be repeated"), "{}", err.message);
        assert_eq!(multiply(json!(1.5), json!("ab")).unwrap(), json!("abab"));
        assert_eq!(multiply(json!("ab"), json!(0)).unwrap(), Value::Null);
    }

    #[test]
    fn test_large_integers_stay_exact() {
        let big = json!(9007199254740993u64);
        assert_eq!(serde_json::to_string(&canonical(&big)).unwrap(), "9007199254740993");
        assert!(!equals(&big, &json!(9007199254740992u64)));
        assert_eq!(compare(&json!(u64::MAX), &json!(i64::MIN)), Ordering::Greater);
        assert_eq!(compare(&json!(-1), &json!(u64::MAX)), Ordering::Less);
        assert!(equals(&json!(3), &json!(3.0)));
    }

    #[test]
    fn test_negate() {
        assert_eq!(negate(&Number::from(3)), json!(-3));
        assert_eq!(negate(&Number::from(i64::MIN)), json!(9223372036854775808.0));
        assert_eq!(negate(&Number::from_f64(2.5).unwrap()), json!(-2.5));
    }

    #[test]
    fn test_multiply_merges_objects() {
        assert_eq!(
            multiply(json!({"a": {"b": 1}}), json!({"a": {"c": 2}})).unwrap(),
            json!({"a": {"b": 1, "c": 2}})
        );
        assert_eq!(multiply(json!("ab"), json!(2)).unwrap(), json!("abab"));
    }
}
