// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Check pipelines
//!
//! Every check runs resolve → fetch → judge once and turns the result into a
//! [`CheckOutcome`]. Any error along the way ends the run with a CRITICAL
//! verdict carrying the error text.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::config::{Assertion, CheckConfig, CheckKind, Selection};
use crate::error::{CheckError, CheckResult};
use crate::expression;
use crate::kubernetes::{ClusterApi, ResourceAddress, ResourceFetcher, discover, resolve};
use crate::metrics;
use crate::query::{self, CompiledQuery};
use crate::threshold::{Direction, ThresholdSpec, Verdict};

/// Value of one reported detail line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    /// Shown verbatim
    Text(String),
    /// Shown as compact JSON
    Json(Value),
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Text(s) => write!(f, "{}", s),
            DetailValue::Json(v) => write!(f, "{}", query::canonical_json(v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub label: &'static str,
    pub value: DetailValue,
}

impl Detail {
    fn text(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: DetailValue::Text(value.into()),
        }
    }

    fn json(label: &'static str, value: impl Into<Value>) -> Self {
        Self {
            label,
            value: DetailValue::Json(value.into()),
        }
    }
}

/// Result of one check run
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    /// Explanation of a non-OK verdict
    pub message: Option<String>,
    /// Effective inputs and observations, in display order
    pub details: Vec<Detail>,
    /// Text exposition of emitted metrics
    pub metrics: Option<String>,
}

impl CheckOutcome {
    /// A CRITICAL outcome for failures outside the pipeline (configuration, connection)
    pub fn critical(message: impl fmt::Display) -> Self {
        Self {
            verdict: Verdict::Critical,
            message: Some(message.to_string()),
            details: Vec::new(),
            metrics: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }

    #[cfg(test)]
    pub fn detail(&self, label: &str) -> Option<&DetailValue> {
        self.details.iter().find(|d| d.label == label).map(|d| &d.value)
    }
}

/// What a pipeline observed
struct Finding {
    verdict: Verdict,
    message: Option<String>,
    metrics: Option<String>,
}

impl Finding {
    fn new(verdict: Verdict, message: Option<String>) -> Self {
        Self {
            verdict,
            message,
            metrics: None,
        }
    }
}

/// Run the configured check against a cluster
pub async fn run(config: &CheckConfig, cluster: &dyn ClusterApi) -> CheckOutcome {
    let mut details = header(config);
    let outcome = match execute(config, cluster, &mut details).await {
        Ok(finding) => CheckOutcome {
            verdict: finding.verdict,
            message: finding.message,
            details,
            metrics: finding.metrics,
        },
        Err(e) => {
            debug!(error = ?e, "Check pipeline failed");
            CheckOutcome {
                verdict: Verdict::Critical,
                message: Some(e.to_string()),
                details,
                metrics: None,
            }
        }
    };
    info!(verdict = %outcome.verdict, message = ?outcome.message, "Check finished");
    outcome
}

/// Effective inputs, shown before the observations
fn header(config: &CheckConfig) -> Vec<Detail> {
    let selection = &config.selection;
    let mut details = vec![
        Detail::text("ResourceKind", &selection.resource_kind),
        Detail::text("Namespace", &selection.namespace),
        Detail::text(
            "LabelSelector",
            selection.filters.label_selector.as_deref().unwrap_or_default(),
        ),
        Detail::text(
            "FieldSelector",
            selection.filters.field_selector.as_deref().unwrap_or_default(),
        ),
    ];
    match &config.kind {
        CheckKind::Count(spec) => {
            details.push(Detail::json("ThresholdCritical", spec.critical));
            details.push(Detail::json("ThresholdWarning", spec.warning));
            details.push(Detail::text("ThresholdDirection", spec.direction.to_string()));
        }
        CheckKind::Query {
            resource_name,
            query,
            assertion,
        } => {
            details.push(Detail::text("ResourceName", resource_name));
            details.push(Detail::text("Query", query));
            details.push(match assertion {
                Assertion::Literal(text) => Detail::text("Assertion", text),
                Assertion::Expression(text) => Detail::text("Expression", text),
            });
        }
        CheckKind::List | CheckKind::Metrics => {}
    }
    details
}

async fn execute(
    config: &CheckConfig,
    cluster: &dyn ClusterApi,
    details: &mut Vec<Detail>,
) -> CheckResult<Finding> {
    let selection = &config.selection;
    match &config.kind {
        CheckKind::Count(spec) => {
            let objects = list(cluster, selection).await?;
            let amount = objects.len() as i64;
            details.push(Detail::json("AmountResourcesFound", amount));
            let verdict = spec.classify(amount);
            debug!(amount, ?verdict, "Classified resource count");
            Ok(Finding::new(verdict, explain_count(amount, spec, verdict)))
        }
        CheckKind::List => {
            let objects = list(cluster, selection).await?;
            details.push(Detail::json("AmountResourcesFound", objects.len()));
            Ok(Finding::new(Verdict::Ok, None))
        }
        CheckKind::Metrics => {
            let objects = list(cluster, selection).await?;
            let samples = metrics::resource_samples(&objects, chrono::Utc::now().timestamp_millis());
            debug!(samples = samples.len(), "Emitting metrics");
            let mut finding = Finding::new(Verdict::Ok, None);
            finding.metrics = Some(metrics::serialize(&samples)?);
            Ok(finding)
        }
        CheckKind::Query {
            resource_name,
            query,
            assertion,
        } => {
            // Compile first so a malformed query never reaches the cluster
            let compiled = query::compile(query)?;
            let address = locate(cluster, selection).await?;
            let object = ResourceFetcher::new(cluster)
                .get(&address, &selection.namespace, resource_name)
                .await?;
            match assertion {
                Assertion::Literal(expected) => assert_literal(&compiled, object, expected, details),
                Assertion::Expression(expr) => assert_expression(&compiled, object, expr, details),
            }
        }
    }
}

async fn locate(cluster: &dyn ClusterApi, selection: &Selection) -> CheckResult<ResourceAddress> {
    let catalog = discover(cluster).await?;
    let address = resolve(&catalog, &selection.resource_kind)?;
    info!(kind = %selection.resource_kind, resource = %address, "Resolved resource");
    Ok(address)
}

async fn list(cluster: &dyn ClusterApi, selection: &Selection) -> CheckResult<Vec<Value>> {
    let address = locate(cluster, selection).await?;
    let objects = ResourceFetcher::new(cluster)
        .list(&address, &selection.namespace, &selection.filters)
        .await?;
    Ok(objects)
}

fn explain_count(amount: i64, spec: &ThresholdSpec, verdict: Verdict) -> Option<String> {
    let message = match (spec.direction, verdict) {
        (_, Verdict::Ok) => return None,
        (Direction::Equality, _) => {
            format!("found {} resources, expected exactly {}", amount, spec.critical)
        }
        (Direction::Descending, Verdict::Critical) => format!(
            "found {} resources, fewer than the critical threshold {}",
            amount, spec.critical
        ),
        (Direction::Descending, _) => format!(
            "found {} resources, fewer than the warning threshold {}",
            amount, spec.warning
        ),
        (Direction::Ascending, Verdict::Critical) => format!(
            "found {} resources, more than the critical threshold {}",
            amount, spec.critical
        ),
        (Direction::Ascending, _) => format!(
            "found {} resources, more than the warning threshold {}",
            amount, spec.warning
        ),
    };
    Some(message)
}

/// Every query result must equal the expected JSON text
fn assert_literal(
    compiled: &CompiledQuery,
    object: Value,
    expected: &str,
    details: &mut Vec<Detail>,
) -> CheckResult<Finding> {
    // Accept any formatting of valid JSON in the assertion
    let expected = serde_json::from_str::<Value>(expected)
        .map(|v| query::canonical_json(&v))
        .unwrap_or_else(|_| expected.to_string());

    let mut found = Vec::new();
    for result in compiled.run(object) {
        match result {
            Ok(value) => found.push(value),
            Err(e) => {
                record_found(&found, details);
                return Ok(Finding::new(
                    Verdict::Critical,
                    Some(format!("query failed: {}", e)),
                ));
            }
        }
    }
    if found.is_empty() {
        return Err(CheckError::NoQueryResult);
    }
    record_found(&found, details);

    let mismatch = found
        .iter()
        .map(query::canonical_json)
        .find(|actual| *actual != expected);
    match mismatch {
        None => Ok(Finding::new(Verdict::Ok, None)),
        Some(actual) => Ok(Finding::new(
            Verdict::Critical,
            Some(format!("query result {} does not match assertion {}", actual, expected)),
        )),
    }
}

fn record_found(found: &[Value], details: &mut Vec<Detail>) {
    match found {
        [] => {}
        [single] => details.push(Detail::json("Found", single.clone())),
        many => details.push(Detail::json("Found", many.to_vec())),
    }
}

/// The last successful query result must satisfy the expression
fn assert_expression(
    compiled: &CompiledQuery,
    object: Value,
    expression: &str,
    details: &mut Vec<Detail>,
) -> CheckResult<Finding> {
    let value = query::last_value(compiled.run(object)).ok_or(CheckError::NoQueryResult)?;
    details.push(Detail::json("Found", value.clone()));

    if expression::evaluate(&value, expression)? {
        Ok(Finding::new(Verdict::Ok, None))
    } else {
        Ok(Finding::new(
            Verdict::Critical,
            Some(format!(
                "expression '{}' is false for {}",
                expression,
                query::canonical_json(&value)
            )),
        ))
    }
}
