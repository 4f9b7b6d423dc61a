// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! jq-style query language over untyped JSON documents.
//!
//! A query is compiled once with [`compile`] and then run against a
//! document. Running yields a lazy sequence whose elements are either
//! values or [`EvaluationError`]s; an error element ends the sequence.

mod builtins;
pub(crate) mod eval;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod value;

use serde_json::Value;
use tracing::debug;

use crate::error::{EvaluationError, SyntaxError};
use eval::{Outputs, eval};
use parser::Filter;

/// A parsed query, ready to run any number of times
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    filter: Filter,
}

impl CompiledQuery {
    /// Run the query against a document
    pub fn run(&self, document: Value) -> QueryOutput<'_> {
        QueryOutput {
            inner: eval(&self.filter, document),
            failed: false,
        }
    }
}

/// Parse query text. An empty query is the identity.
pub fn compile(text: &str) -> Result<CompiledQuery, SyntaxError> {
    let filter = parser::parse(text)?;
    debug!(query = %text, "Compiled query");
    Ok(CompiledQuery { filter })
}

/// Lazy query results; nothing is yielded after the first error
pub struct QueryOutput<'a> {
    inner: Outputs<'a>,
    failed: bool,
}

impl Iterator for QueryOutput<'_> {
    type Item = Result<Value, EvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

impl std::iter::FusedIterator for QueryOutput<'_> {}

/// Drain a result sequence and keep the last successful value
pub fn last_value<I>(results: I) -> Option<Value>
where
    I: IntoIterator<Item = Result<Value, EvaluationError>>,
{
    let mut last = None;
    for result in results {
        match result {
            Ok(v) => last = Some(v),
            Err(e) => debug!(error = %e, "Skipping query error element"),
        }
    }
    last
}

/// Compact JSON with sorted object keys, used for literal comparisons
pub fn canonical_json(value: &Value) -> String {
    value::canonical(value).to_string()
}
