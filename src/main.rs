// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod check;
mod cli;
mod config;
mod error;
mod expression;
mod kubernetes;
mod metrics;
mod output;
mod query;
mod threshold;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::prelude::*;

use check::CheckOutcome;
use cli::Args;
use config::CheckConfig;
use kubernetes::KubeCluster;

/// Initialize logging on stderr; stdout carries the check result
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "kubecheck=debug"
    } else {
        "kubecheck=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

async fn run_check(args: &Args) -> CheckOutcome {
    // Validate before touching the cluster
    let config = match CheckConfig::from_command(&args.command) {
        Ok(config) => config,
        Err(e) => return CheckOutcome::critical(e),
    };
    debug!(?config, "Check configuration");

    let cluster = match KubeCluster::connect(args.context.as_deref()).await {
        Ok(cluster) => cluster,
        Err(e) => return CheckOutcome::critical(format!("{:#}", e)),
    };

    check::run(&config, &cluster).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    // Install rustls crypto provider (aws-lc-rs)
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let outcome = run_check(&args).await;
    println!("{}", outcome.format(args.output));
    std::process::exit(outcome.exit_code());
}
