// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Node
//!
//! Entry point for the `tessera-node` binary. Parses CLI arguments,
//! initializes logging, and runs one of:
//!
//! - `transfer`: a local threshold transfer, printed as JSON
//! - `simulate`: in-process replication from a producer to N followers
//! - `version` : print build version information
//!
//! Reports go to stdout as JSON; logs go to stderr.

mod cli;
mod logging;
mod simulate;
mod transfer;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::signal;

use cli::{Commands, TesseraNodeCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TesseraNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Transfer(args) => {
            let report = transfer::run_transfer(&args)?;
            print_json(&report)
        }
        Commands::Simulate(args) => {
            tracing::info!(
                peers = args.peers,
                snapshots = args.snapshots,
                batch_limit = args.batch_limit,
                announce_timeout_ms = args.announce_timeout_ms,
                "starting simulation"
            );
            tokio::select! {
                report = simulate::run_simulation(&args) => print_json(&report?),
                _ = shutdown_signal() => {
                    tracing::info!("interrupted, abandoning simulation");
                    Ok(())
                }
            }
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("tessera-node {}", env!("CARGO_PKG_VERSION"));
    println!("tx version   {}", tessera_protocol::config::TX_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
