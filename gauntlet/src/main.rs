//! Gauntlet - concurrent API invariant tester.
//!
//! Drives storms of overlapping HTTP operations against a stateful REST
//! backend and verifies safety invariants: no 5xx, no diagnostic leakage,
//! single-winner contention, idempotency under duplication.

#![forbid(unsafe_code)]

mod scenarios;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gauntlet_common::{ApiClient, HarnessConfig, SuiteReport, wait_until_healthy};
use scenarios::SuiteCtx;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(author, version, about = "Concurrent API invariant tester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario suites against a backend
    Run {
        /// Backend base URL (overrides config and GAUNTLET_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// Suites to run; defaults to all
        #[arg(long)]
        suite: Vec<String>,

        /// Concurrency budget override
        #[arg(long)]
        concurrency: Option<u32>,

        /// Iteration count override for storm scenarios
        #[arg(long)]
        iterations: Option<u32>,

        /// Explicit config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit the suite reports as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available scenario suites
    List,

    /// Serve the reference mock backend
    Mock {
        /// Port to listen on
        #[arg(short, long, default_value = "8900")]
        port: u16,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            base_url,
            suite,
            concurrency,
            iterations,
            config,
            json,
            verbose,
        } => {
            init_logging(verbose);
            run(base_url, suite, concurrency, iterations, config, json).await
        }
        Commands::List => {
            for (suite, id, description) in scenarios::catalog() {
                println!("{suite:<10} {id:<36} {description}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mock { port, verbose } => {
            init_logging(verbose);
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            gauntlet_mockapi::serve(addr, gauntlet_mockapi::MockApiConfig::default())
                .await
                .context("mock backend failed")?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(
    base_url: Option<String>,
    suites: Vec<String>,
    concurrency: Option<u32>,
    iterations: Option<u32>,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let config = match config_path {
        Some(path) => HarnessConfig::load_with(Some(&path))?,
        None => HarnessConfig::load()?,
    };

    let base_url = base_url.unwrap_or_else(|| config.base_url.get().clone());
    let concurrency = concurrency.unwrap_or_else(|| config.concurrency.value()) as usize;
    let iterations = iterations.unwrap_or_else(|| config.iterations.value()) as usize;

    let selected: Vec<String> = if suites.is_empty() {
        scenarios::SUITE_NAMES.iter().map(|s| s.to_string()).collect()
    } else {
        suites
    };
    for name in &selected {
        if !scenarios::SUITE_NAMES.contains(&name.as_str()) {
            anyhow::bail!(
                "unknown suite '{name}' (available: {})",
                scenarios::SUITE_NAMES.join(", ")
            );
        }
    }

    info!(%base_url, concurrency, iterations, "starting run");

    let client = ApiClient::with_timeout(&base_url, config.request_timeout())
        .context("building HTTP client")?;
    wait_until_healthy(&client, config.health_timeout())
        .await
        .with_context(|| format!("backend at {base_url} never became healthy"))?;

    let ctx = SuiteCtx::new(client, concurrency, iterations);
    let mut reports = Vec::new();
    for name in &selected {
        info!(suite = %name, "running suite");
        if let Some(report) = scenarios::run_suite(name, &ctx).await {
            reports.push(report);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }

    let failed: usize = reports.iter().map(SuiteReport::failed_count).sum();
    if failed > 0 {
        info!(failed, "run finished with failures");
        Ok(ExitCode::FAILURE)
    } else {
        info!("run finished clean");
        Ok(ExitCode::SUCCESS)
    }
}

fn print_summary(reports: &[SuiteReport]) {
    for report in reports {
        println!("suite {} ({} scenarios)", report.suite, report.scenarios.len());
        for scenario in &report.scenarios {
            println!(
                "  [{}] {} ({} ms)",
                scenario.status, scenario.id, scenario.duration_ms
            );
            for check in scenario.failed_checks() {
                println!(
                    "      check {} failed: {}",
                    check.name,
                    check.detail.as_deref().unwrap_or("no detail")
                );
            }
            for error in &scenario.errors {
                println!("      error: {error}");
            }
        }
    }
    let total: usize = reports.iter().map(|r| r.scenarios.len()).sum();
    let failed: usize = reports.iter().map(SuiteReport::failed_count).sum();
    println!("{total} scenarios, {failed} failed");
}
