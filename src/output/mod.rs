// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::check::CheckOutcome;
use crate::cli::OutputFormat;

impl CheckOutcome {
    pub fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => TextFormatter::format(self),
            OutputFormat::Json => JsonFormatter::format(self),
        }
    }
}
