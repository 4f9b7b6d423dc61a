// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-invocation check configuration
//!
//! Built once from the parsed command line and passed by reference into the
//! pipeline. Validation happens here, so a bad threshold pair or a query
//! check without an assertion fails before the cluster is contacted.

use crate::cli::{Command, QueryArgs, SelectionArgs, ThresholdArgs};
use crate::error::ConfigError;
use crate::kubernetes::ApiFilters;
use crate::threshold::{Direction, ThresholdSpec};

/// Which resources a check looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub resource_kind: String,
    /// Empty means cluster-wide
    pub namespace: String,
    pub filters: ApiFilters,
}

impl From<&SelectionArgs> for Selection {
    fn from(args: &SelectionArgs) -> Self {
        Self {
            resource_kind: args.resource_kind.trim().to_string(),
            namespace: args.namespace.trim().to_string(),
            filters: ApiFilters::new(&args.label_selector, &args.field_selector),
        }
    }
}

/// How the result of a query check is judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Every query result must serialize to exactly this JSON text
    Literal(String),
    /// Comparison expression applied to the last query result
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    Count(ThresholdSpec),
    List,
    Query {
        resource_name: String,
        query: String,
        assertion: Assertion,
    },
    Metrics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub selection: Selection,
    pub kind: CheckKind,
}

impl CheckConfig {
    pub fn from_command(command: &Command) -> Result<Self, ConfigError> {
        let (selection, kind) = match command {
            Command::Count {
                selection,
                thresholds,
            } => (selection, CheckKind::Count(thresholds_from(thresholds)?)),
            Command::List { selection } => (selection, CheckKind::List),
            Command::Query { selection, query } => (selection, query_from(query)?),
            Command::Metrics { selection } => (selection, CheckKind::Metrics),
        };
        Ok(Self {
            selection: Selection::from(selection),
            kind,
        })
    }
}

fn thresholds_from(args: &ThresholdArgs) -> Result<ThresholdSpec, ConfigError> {
    ThresholdSpec::new(
        args.threshold_critical,
        args.threshold_warning,
        Direction::from_sign(args.threshold_direction),
    )
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn query_from(args: &QueryArgs) -> Result<CheckKind, ConfigError> {
    let resource_name = non_empty(&args.resource_name).ok_or(ConfigError::MissingResourceName)?;
    let query = non_empty(&args.query).ok_or(ConfigError::MissingQuery)?;
    let assertion = match (&args.assertion, non_empty(&args.expression)) {
        (Some(_), Some(_)) => return Err(ConfigError::MissingAssertion),
        (Some(literal), None) => Assertion::Literal(literal.trim().to_string()),
        (None, Some(expression)) => Assertion::Expression(expression),
        (None, None) => return Err(ConfigError::MissingAssertion),
    };
    Ok(CheckKind::Query {
        resource_name,
        query,
        assertion,
    })
}
