// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for the check pipeline.
//!
//! Every stage has its own error type so callers can tell a misconfigured
//! check apart from an unreachable cluster. All of them funnel into
//! [`CheckError`], which the pipeline turns into a CRITICAL verdict.

use thiserror::Error;

use crate::threshold::Direction;

/// Failure to map a kind name onto a served API resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("resource kind '{kind}' is not served by the cluster")]
    NotFound { kind: String },

    #[error("resource kind '{kind}' is ambiguous, served by groups: {}; qualify it as Kind.group", .groups.join(", "))]
    Ambiguous { kind: String, groups: Vec<String> },

    #[error("resource kind '{kind}' could not be resolved, discovery failed for: {}", .failed.join("; "))]
    DiscoveryPartialFailure { kind: String, failed: Vec<String> },
}

/// Failure reported by the cluster while listing or getting objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("cluster request failed: {0}")]
    TransportFailure(String),
}

/// Invalid combination of check options
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "threshold direction is {direction}, but warning threshold {warning} is {} than critical threshold {critical}",
        .direction.inverted_relation()
    )]
    InvertedThresholds {
        direction: Direction,
        warning: i64,
        critical: i64,
    },

    #[error("a query is required (--query)")]
    MissingQuery,

    #[error("a resource name is required (--resource-name)")]
    MissingResourceName,

    #[error("exactly one of --assertion or --expression is required")]
    MissingAssertion,
}

/// Malformed query or expression text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Error value produced while running a query; carried inside the result sequence
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to evaluate an assertion expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("invalid expression: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("expression did not evaluate to a boolean (got {found})")]
    TypeMismatch { found: &'static str },

    #[error("expression evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
}

/// Any failure that aborts a check run
#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid query: {0}")]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("query produced no value")]
    NoQueryResult,

    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_thresholds_message() {
        let err = ConfigError::InvertedThresholds {
            direction: Direction::Descending,
            warning: 1,
            critical: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("less than critical"), "{msg}");

        let err = ConfigError::InvertedThresholds {
            direction: Direction::Ascending,
            warning: 5,
            critical: 3,
        };
        assert!(err.to_string().contains("bigger than critical"));
    }

    #[test]
    fn test_ambiguous_lists_groups() {
        let err = ResolutionError::Ambiguous {
            kind: "Event".to_string(),
            groups: vec!["core".to_string(), "events.k8s.io".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("core, events.k8s.io"));
        assert!(msg.contains("Kind.group"));
    }

    #[test]
    fn test_check_error_wraps_fetch() {
        let err: CheckError = FetchError::NotFound {
            kind: "Pod".to_string(),
            name: "web-0".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Pod 'web-0' not found");
    }
}
