// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use serde_json::{Map, Value, json};

use crate::check::CheckOutcome;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn to_value(outcome: &CheckOutcome) -> Value {
        let mut details = Map::new();
        for detail in &outcome.details {
            let value = serde_json::to_value(&detail.value).unwrap_or(Value::Null);
            details.insert(detail.label.to_string(), value);
        }
        if let Some(metrics) = &outcome.metrics {
            details.insert("Metrics".to_string(), Value::String(metrics.clone()));
        }
        json!({
            "verdict": outcome.verdict,
            "exit_code": outcome.exit_code(),
            "message": outcome.message,
            "details": details,
        })
    }

    pub fn format(outcome: &CheckOutcome) -> String {
        serde_json::to_string_pretty(&Self::to_value(outcome)).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Detail, DetailValue};
    use crate::threshold::Verdict;

    #[test]
    fn test_outcome_object() {
        let outcome = CheckOutcome {
            verdict: Verdict::Warning,
            message: Some("found 3 resources".to_string()),
            details: vec![
                Detail {
                    label: "ResourceKind",
                    value: DetailValue::Text("Pod".to_string()),
                },
                Detail {
                    label: "AmountResourcesFound",
                    value: DetailValue::Json(json!(3)),
                },
            ],
            metrics: None,
        };

        let value = JsonFormatter::to_value(&outcome);
        assert_eq!(
            value,
            json!({
                "verdict": "WARNING",
                "exit_code": 1,
                "message": "found 3 resources",
                "details": {"ResourceKind": "Pod", "AmountResourcesFound": 3}
            })
        );

        let parsed: Value = serde_json::from_str(&JsonFormatter::format(&outcome)).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_metrics_and_missing_message() {
        let mut outcome = CheckOutcome::critical("x");
        outcome.verdict = Verdict::Ok;
        outcome.message = None;
        outcome.metrics = Some("m 1 0\n".to_string());

        let value = JsonFormatter::to_value(&outcome);
        assert_eq!(value["message"], Value::Null);
        assert_eq!(value["exit_code"], json!(0));
        assert_eq!(value["details"]["Metrics"], json!("m 1 0\n"));
    }
}
