// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Metric samples and their Prometheus text exposition.
//!
//! Only names present in the registry below produce samples. Anything else
//! is dropped without error so callers can emit speculatively.

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub const RESOURCES_TOTAL: &str = "kubernetes_query_resources_total";
pub const RESOURCES_NAMESPACE_TOTAL: &str = "kubernetes_query_resources_namespace_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

struct MetricDefinition {
    name: &'static str,
    help: &'static str,
    kind: MetricKind,
}

const REGISTRY: &[MetricDefinition] = &[
    MetricDefinition {
        name: RESOURCES_TOTAL,
        help: "number of resources matching the query",
        kind: MetricKind::Gauge,
    },
    MetricDefinition {
        name: RESOURCES_NAMESPACE_TOTAL,
        help: "number of resources matching the query per namespace",
        kind: MetricKind::Gauge,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp_ms: i64,
    pub labels: Vec<(String, String)>,
}

impl MetricSample {
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    fn to_metric(&self) -> Metric {
        let mut metric = Metric::default();
        for (key, value) in &self.labels {
            let mut pair = LabelPair::default();
            pair.set_name(key.clone());
            pair.set_value(value.clone());
            metric.mut_label().push(pair);
        }
        match self.kind {
            MetricKind::Counter => {
                let mut counter = Counter::default();
                counter.set_value(self.value);
                metric.set_counter(counter);
            }
            MetricKind::Gauge => {
                let mut gauge = Gauge::default();
                gauge.set_value(self.value);
                metric.set_gauge(gauge);
            }
        }
        metric.set_timestamp_ms(self.timestamp_ms);
        metric
    }
}

/// Build a sample for a registered metric.
///
/// Returns `None` when the name is unknown or `kind` disagrees with the
/// registered kind.
pub fn emit(name: &str, kind: MetricKind, value: f64, timestamp_ms: i64) -> Option<MetricSample> {
    let Some(definition) = REGISTRY.iter().find(|d| d.name == name) else {
        debug!(metric = %name, "Dropping unregistered metric");
        return None;
    };
    if definition.kind != kind {
        debug!(metric = %name, ?kind, expected = ?definition.kind, "Dropping metric with mismatched kind");
        return None;
    }
    Some(MetricSample {
        name: definition.name,
        help: definition.help,
        kind,
        value,
        timestamp_ms,
        labels: Vec::new(),
    })
}

/// Render samples in the text exposition format, one family per metric name
pub fn serialize(samples: &[MetricSample]) -> Result<String, prometheus::Error> {
    let mut families: Vec<MetricFamily> = Vec::new();
    for sample in samples {
        let position = families.iter().position(|f| f.get_name() == sample.name);
        let family = match position {
            Some(idx) => &mut families[idx],
            None => {
                let mut family = MetricFamily::default();
                family.set_name(sample.name.to_string());
                family.set_help(sample.help.to_string());
                family.set_field_type(match sample.kind {
                    MetricKind::Counter => MetricType::COUNTER,
                    MetricKind::Gauge => MetricType::GAUGE,
                });
                families.push(family);
                let last = families.len() - 1;
                &mut families[last]
            }
        };
        family.mut_metric().push(sample.to_metric());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Count objects per namespace; cluster-scoped objects are skipped
pub fn namespace_breakdown(objects: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for object in objects {
        if let Some(ns) = object
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
        {
            *counts.entry(ns.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Samples describing a listed resource set
pub fn resource_samples(objects: &[Value], timestamp_ms: i64) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    samples.extend(emit(
        RESOURCES_TOTAL,
        MetricKind::Gauge,
        objects.len() as f64,
        timestamp_ms,
    ));
    for (namespace, count) in namespace_breakdown(objects) {
        samples.extend(
            emit(
                RESOURCES_NAMESPACE_TOTAL,
                MetricKind::Gauge,
                count as f64,
                timestamp_ms,
            )
            .map(|s| s.with_label("namespace", namespace)),
        );
    }
    samples
}
