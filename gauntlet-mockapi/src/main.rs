//! Standalone mock backend binary.
//!
//! `gauntlet mock` embeds the same server; this binary exists so the
//! backend can be run and poked independently of the harness CLI.

#![forbid(unsafe_code)]

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gauntlet_mockapi::MockApiConfig;

#[derive(Parser)]
#[command(name = "gauntlet-mockapi")]
#[command(author, version, about = "Reference mock backend for the Gauntlet harness")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8900")]
    port: u16,

    /// Login attempts allowed per identity per rate window
    #[arg(long, default_value = "50")]
    login_rate_limit: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = MockApiConfig {
        login_rate_limit: cli.login_rate_limit,
        ..MockApiConfig::default()
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    gauntlet_mockapi::serve(addr, config).await?;
    Ok(())
}
