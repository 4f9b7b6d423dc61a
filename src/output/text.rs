// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::fmt::Write;

use crate::check::CheckOutcome;

/// Operator-facing lines: inputs, observations, metrics, then the verdict
pub struct TextFormatter;

impl TextFormatter {
    pub fn format(outcome: &CheckOutcome) -> String {
        let mut out = String::new();
        for detail in &outcome.details {
            let _ = writeln!(out, "{}: {}", detail.label, detail.value);
        }
        if let Some(metrics) = &outcome.metrics {
            out.push_str(metrics);
            if !metrics.ends_with('\n') {
                out.push('\n');
            }
        }
        let _ = write!(out, "Result: {}", outcome.verdict);
        if let Some(message) = &outcome.message {
            let _ = write!(out, "\n{}", message);
        }
        out
    }
}
