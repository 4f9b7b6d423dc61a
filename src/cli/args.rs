// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "kubecheck")]
#[command(author, version, about = "Monitoring checks for Kubernetes resources")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Kubernetes context to use. Defaults to the in-cluster service account,
    /// then the current kubeconfig context.
    #[arg(long, global = true, value_name = "CONTEXT", env = "KUBECHECK_CONTEXT")]
    pub context: Option<String>,

    /// Output format of the check result
    #[arg(short, long, global = true, value_enum, default_value = "text", env = "KUBECHECK_OUTPUT")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count matching resources and classify the count against thresholds
    Count {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        thresholds: ThresholdArgs,
    },

    /// Report how many resources match
    List {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Run a query over a named resource and assert on the result
    Query {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print metrics about matching resources
    Metrics {
        #[command(flatten)]
        selection: SelectionArgs,
    },
}

/// Which resources a check looks at
#[derive(clap::Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Namespace to query (leave empty to check cluster-wide)
    #[arg(short, long, default_value = "", env = "KUBECHECK_NAMESPACE")]
    pub namespace: String,

    /// Resource kind to query, optionally qualified with its group (e.g. Pod, Deployment.apps)
    #[arg(short = 't', long, default_value = "Pod", env = "KUBECHECK_RESOURCE_KIND")]
    pub resource_kind: String,

    /// Label selector to filter resources
    #[arg(short, long, default_value = "", env = "KUBECHECK_LABEL_SELECTOR")]
    pub label_selector: String,

    /// Field selector to filter resources
    #[arg(short, long, default_value = "", env = "KUBECHECK_FIELD_SELECTOR")]
    pub field_selector: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ThresholdArgs {
    /// Critical threshold
    #[arg(short = 'c', long, default_value_t = 1, allow_negative_numbers = true, env = "KUBECHECK_THRESHOLD_CRITICAL")]
    pub threshold_critical: i64,

    /// Warning threshold
    #[arg(short = 'w', long, default_value_t = 1, allow_negative_numbers = true, env = "KUBECHECK_THRESHOLD_WARNING")]
    pub threshold_warning: i64,

    /// Threshold direction: < 0 alerts on too few, > 0 on too many, 0 on anything but critical
    #[arg(long, default_value_t = -1, allow_negative_numbers = true, env = "KUBECHECK_THRESHOLD_DIRECTION")]
    pub threshold_direction: i64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Name of the resource to query
    #[arg(short = 'r', long, env = "KUBECHECK_RESOURCE_NAME")]
    pub resource_name: Option<String>,

    /// Query to run over the resource (jq syntax)
    #[arg(short, long, env = "KUBECHECK_QUERY")]
    pub query: Option<String>,

    /// Compact JSON every query result must equal
    #[arg(short, long, conflicts_with = "expression", env = "KUBECHECK_ASSERTION")]
    pub assertion: Option<String>,

    /// Comparison expression evaluated against the last query result (e.g. "> 2")
    #[arg(short, long, env = "KUBECHECK_EXPRESSION")]
    pub expression: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
