// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Lazy evaluation of a [`Filter`] against one input document

use regex::Regex;
use serde_json::{Map, Value};
use std::iter;

use super::builtins;
use super::parser::{BinOp, Filter, ObjectKey};
use super::value::{self, is_truthy, preview, type_name};
use crate::error::EvaluationError;

/// Stream of results produced by a filter; errors are ordinary elements
pub type Outputs<'a> = Box<dyn Iterator<Item = Result<Value, EvaluationError>> + 'a>;

pub(super) fn single<'a>(value: Value) -> Outputs<'a> {
    Box::new(iter::once(Ok(value)))
}

pub(super) fn fail<'a>(err: EvaluationError) -> Outputs<'a> {
    Box::new(iter::once(Err(err)))
}

pub(super) fn nothing<'a>() -> Outputs<'a> {
    Box::new(iter::empty())
}

/// Run every output of a filter to completion, stopping at the first error
pub(super) fn collect(filter: &Filter, input: Value) -> Result<Vec<Value>, EvaluationError> {
    eval(filter, input).collect()
}

pub fn eval<'a>(filter: &'a Filter, input: Value) -> Outputs<'a> {
    match filter {
        Filter::Identity => single(input),
        Filter::RecurseAll => Box::new(recurse(input).into_iter().map(Ok)),
        Filter::Literal(v) => single(v.clone()),
        Filter::Field(term, name) => Box::new(
            eval(term, input).map(move |t| t.and_then(|t| index_field(&t, name))),
        ),
        Filter::Index(term, index) => {
            let original = input.clone();
            Box::new(eval(term, input).flat_map(move |t| match t {
                Err(e) => fail(e),
                Ok(t) => Box::new(
                    eval(index, original.clone())
                        .map(move |i| i.and_then(|i| index_value(&t, &i))),
                ),
            }))
        }
        Filter::Slice(term, from, to) => {
            let original = input.clone();
            Box::new(eval(term, input).flat_map(move |t| match t {
                Err(e) => fail(e),
                Ok(t) => slice_outputs(t, from.as_deref(), to.as_deref(), &original),
            }))
        }
        Filter::Iterate(term) => Box::new(eval(term, input).flat_map(|t| match t {
            Err(e) => fail(e),
            Ok(t) => iterate(t),
        })),
        Filter::Array(None) => single(Value::Array(Vec::new())),
        Filter::Array(Some(inner)) => match collect(inner, input) {
            Ok(items) => single(Value::Array(items)),
            Err(e) => fail(e),
        },
        Filter::Object(entries) => match build_objects(entries, &input) {
            Ok(objects) => Box::new(objects.into_iter().map(|m| Ok(Value::Object(m)))),
            Err(e) => fail(e),
        },
        Filter::Neg(inner) => Box::new(eval(inner, input).map(|v| {
            v.and_then(|v| match &v {
                Value::Number(n) => Ok(value::negate(n)),
                _ => Err(EvaluationError::new(format!(
                    "{} ({}) cannot be negated",
                    type_name(&v),
                    preview(&v)
                ))),
            })
        })),
        Filter::Pipe(lhs, rhs) => Box::new(eval(lhs, input).flat_map(move |v| match v {
            Ok(v) => eval(rhs, v),
            Err(e) => fail(e),
        })),
        Filter::Comma(lhs, rhs) => Box::new(eval(lhs, input.clone()).chain(eval(rhs, input))),
        Filter::Binary(op, lhs, rhs) => {
            let op = *op;
            // Right operand varies slowest
            let original = input.clone();
            Box::new(eval(rhs, input).flat_map(move |r| match r {
                Err(e) => fail(e),
                Ok(r) => Box::new(
                    eval(lhs, original.clone())
                        .map(move |l| l.and_then(|l| binary(op, l, r.clone()))),
                ),
            }))
        }
        Filter::And(lhs, rhs) => logical(lhs, rhs, input, false),
        Filter::Or(lhs, rhs) => logical(lhs, rhs, input, true),
        Filter::Not(inner) => Box::new(
            eval(inner, input).map(|v| v.map(|v| Value::Bool(!is_truthy(&v)))),
        ),
        Filter::Alternative(lhs, rhs) => {
            let truthy: Vec<Value> = eval(lhs, input.clone())
                .filter_map(Result::ok)
                .filter(is_truthy)
                .collect();
            if truthy.is_empty() {
                eval(rhs, input)
            } else {
                Box::new(truthy.into_iter().map(Ok))
            }
        }
        Filter::If(condition, then_branch, else_branch) => {
            let original = input.clone();
            Box::new(eval(condition, input).flat_map(move |c| match c {
                Err(e) => fail(e),
                Ok(c) if is_truthy(&c) => eval(then_branch, original.clone()),
                Ok(_) => eval(else_branch, original.clone()),
            }))
        }
        Filter::Try(body, handler) => Box::new(TryOutputs {
            body: eval(body, input),
            handler: handler.as_deref(),
            caught: None,
            finished: false,
        }),
        Filter::Call(builtin, args) => builtins::call(*builtin, args, input),
    }
}

/// Yields body outputs until the first error, then hands the error message
/// to the optional `catch` filter
struct TryOutputs<'a> {
    body: Outputs<'a>,
    handler: Option<&'a Filter>,
    caught: Option<Outputs<'a>>,
    finished: bool,
}

impl Iterator for TryOutputs<'_> {
    type Item = Result<Value, EvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(caught) = self.caught.as_mut() {
            return caught.next();
        }
        if self.finished {
            return None;
        }
        match self.body.next() {
            Some(Ok(v)) => Some(Ok(v)),
            Some(Err(e)) => {
                self.finished = true;
                let handler = self.handler?;
                let mut caught = eval(handler, Value::String(e.message));
                let first = caught.next();
                self.caught = Some(caught);
                first
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

fn logical<'a>(lhs: &'a Filter, rhs: &'a Filter, input: Value, short_circuit_on: bool) -> Outputs<'a> {
    let original = input.clone();
    Box::new(eval(lhs, input).flat_map(move |l| match l {
        Err(e) => fail(e),
        Ok(l) if is_truthy(&l) == short_circuit_on => single(Value::Bool(short_circuit_on)),
        Ok(_) => Box::new(
            eval(rhs, original.clone()).map(|r| r.map(|r| Value::Bool(is_truthy(&r)))),
        ),
    }))
}

/// Pre-order walk over a value and everything below it
fn recurse(value: Value) -> Vec<Value> {
    let mut found = Vec::new();
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match &value {
            Value::Array(items) => pending.extend(items.iter().rev().cloned()),
            Value::Object(map) => pending.extend(map.values().rev().cloned()),
            _ => {}
        }
        found.push(value);
    }
    found
}

fn iterate<'a>(value: Value) -> Outputs<'a> {
    match value {
        Value::Array(items) => Box::new(items.into_iter().map(Ok)),
        Value::Object(map) => Box::new(map.into_iter().map(|(_, v)| Ok(v))),
        other => fail(EvaluationError::new(format!(
            "Cannot iterate over {}",
            describe(&other)
        ))),
    }
}

/// Type name with a preview for scalars, as used by iteration errors
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => format!("{} ({})", type_name(other), preview(other)),
    }
}

pub(super) fn index_field(value: &Value, name: &str) -> Result<Value, EvaluationError> {
    match value {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(EvaluationError::new(format!(
            "Cannot index {} with \"{}\"",
            type_name(other),
            name
        ))),
    }
}

pub(super) fn index_value(value: &Value, index: &Value) -> Result<Value, EvaluationError> {
    match (value, index) {
        (_, Value::String(name)) if !value.is_array() => index_field(value, name),
        (Value::Array(items), Value::Number(n)) => {
            let n = n.as_f64().unwrap_or_default().floor() as i64;
            let idx = if n < 0 { items.len() as i64 + n } else { n };
            Ok(usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null))
        }
        (Value::Null, Value::Number(_)) => Ok(Value::Null),
        _ => Err(EvaluationError::new(format!(
            "Cannot index {} with {}",
            type_name(value),
            type_name(index)
        ))),
    }
}

fn slice_outputs<'a>(
    target: Value,
    from: Option<&'a Filter>,
    to: Option<&'a Filter>,
    input: &Value,
) -> Outputs<'a> {
    let bounds = |bound: Option<&'a Filter>| match bound {
        Some(f) => collect(f, input.clone()),
        None => Ok(vec![Value::Null]),
    };
    let (froms, tos) = match (bounds(from), bounds(to)) {
        (Ok(f), Ok(t)) => (f, t),
        (Err(e), _) | (_, Err(e)) => return fail(e),
    };
    let mut results = Vec::new();
    for to in &tos {
        for from in &froms {
            results.push(slice(&target, from, to));
        }
    }
    Box::new(results.into_iter())
}

fn slice(target: &Value, from: &Value, to: &Value) -> Result<Value, EvaluationError> {
    let resolve = |bound: &Value, len: usize, default: usize| -> Result<usize, EvaluationError> {
        match bound {
            Value::Null => Ok(default),
            Value::Number(n) => {
                let n = n.as_f64().unwrap_or_default().floor() as i64;
                let len = len as i64;
                let idx = if n < 0 { len + n } else { n };
                Ok(idx.clamp(0, len) as usize)
            }
            other => Err(EvaluationError::new(format!(
                "Start and end indices of a slice must be numbers, not {}",
                type_name(other)
            ))),
        }
    };
    match target {
        Value::Null => Ok(Value::Null),
        Value::Array(items) => {
            let start = resolve(from, items.len(), 0)?;
            let end = resolve(to, items.len(), items.len())?.max(start);
            Ok(Value::Array(items[start..end].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let start = resolve(from, chars.len(), 0)?;
            let end = resolve(to, chars.len(), chars.len())?.max(start);
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        other => Err(EvaluationError::new(format!(
            "Cannot index {} with object",
            type_name(other)
        ))),
    }
}

fn build_objects(
    entries: &[(ObjectKey, Option<Filter>)],
    input: &Value,
) -> Result<Vec<Map<String, Value>>, EvaluationError> {
    let mut partial = vec![Map::new()];
    for (key, value) in entries {
        let keys = match key {
            ObjectKey::Name(name) => vec![name.clone()],
            ObjectKey::Computed(f) => collect(f, input.clone())?
                .into_iter()
                .map(|k| match k {
                    Value::String(s) => Ok(s),
                    other => Err(EvaluationError::new(format!(
                        "Object keys must be strings, not {}",
                        type_name(&other)
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        let mut next = Vec::new();
        for key in keys {
            let values = match value {
                Some(f) => collect(f, input.clone())?,
                None => vec![index_field(input, &key)?],
            };
            for object in &partial {
                for v in &values {
                    let mut object = object.clone();
                    object.insert(key.clone(), v.clone());
                    next.push(object);
                }
            }
        }
        partial = next;
    }
    Ok(partial)
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvaluationError> {
    use std::cmp::Ordering::*;

    match op {
        BinOp::Add => value::add(lhs, rhs),
        BinOp::Sub => value::subtract(lhs, rhs),
        BinOp::Mul => value::multiply(lhs, rhs),
        BinOp::Div => value::divide(lhs, rhs),
        BinOp::Mod => value::modulo(lhs, rhs),
        BinOp::Eq => Ok(Value::Bool(value::compare(&lhs, &rhs) == Equal)),
        BinOp::Ne => Ok(Value::Bool(value::compare(&lhs, &rhs) != Equal)),
        BinOp::Lt => Ok(Value::Bool(value::compare(&lhs, &rhs) == Less)),
        BinOp::Le => Ok(Value::Bool(value::compare(&lhs, &rhs) != Greater)),
        BinOp::Gt => Ok(Value::Bool(value::compare(&lhs, &rhs) == Greater)),
        BinOp::Ge => Ok(Value::Bool(value::compare(&lhs, &rhs) != Less)),
        BinOp::Matches => match (&lhs, &rhs) {
            (Value::String(text), Value::String(pattern)) => {
                Ok(Value::Bool(compile_regex(pattern)?.is_match(text)))
            }
            _ => Err(EvaluationError::new(format!(
                "{} ({}) cannot be matched, as it is not a string",
                type_name(&lhs),
                preview(&lhs)
            ))),
        },
    }
}

pub(super) fn compile_regex(pattern: &str) -> Result<Regex, EvaluationError> {
    Regex::new(pattern).map_err(|e| {
        EvaluationError::new(format!("{} is not a valid regex: {}", pattern, e))
    })
}
