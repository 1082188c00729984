//! # CLI Interface
//!
//! Defines the command-line argument structure for `tessera-node` using
//! `clap` derive. Three subcommands: `transfer`, `simulate` and `version`.

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Tessera ledger node.
///
/// Runs the ledger core against in-memory stores: a local script-gated
/// transfer, or a multi-node replication simulation over channel transports.
#[derive(Parser, Debug)]
#[command(
    name = "tessera-node",
    about = "Tessera ledger node",
    version,
    propagate_version = true
)]
pub struct TesseraNodeCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "TESSERA_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(
        long,
        global = true,
        env = "TESSERA_LOG",
        default_value = "tessera_node=info,tessera_protocol=info"
    )]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Tessera node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a genesis, sign and validate a threshold transfer out of it,
    /// and print the result as JSON.
    Transfer(TransferArgs),
    /// Replicate a producer's history to a set of followers and report
    /// how it went.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `transfer` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct TransferArgs {
    /// Number of accounts. Genesis pays output `i` to accounts `0..=i`.
    #[arg(long, env = "TESSERA_ACCOUNTS", default_value_t = 3)]
    pub accounts: usize,

    /// Signatures required to spend the transfer's output.
    #[arg(long, env = "TESSERA_THRESHOLD", default_value_t = 2)]
    pub threshold: u8,

    /// Also print the full signed transaction.
    #[arg(long)]
    pub show_transaction: bool,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of follower nodes replicating from the producer.
    #[arg(long, env = "TESSERA_PEERS", default_value_t = 3)]
    pub peers: usize,

    /// Length of the producer's transfer chain.
    #[arg(long, env = "TESSERA_SNAPSHOTS", default_value_t = 50)]
    pub snapshots: u64,

    /// Snapshots streamed per sync step.
    #[arg(long, env = "TESSERA_SYNC_BATCH_LIMIT", default_value_t = tessera_protocol::config::SYNC_BATCH_LIMIT)]
    pub batch_limit: usize,

    /// Milliseconds a sync loop waits for a graph before streaming anyway.
    #[arg(long, env = "TESSERA_SYNC_ANNOUNCE_TIMEOUT_MS", default_value_t = 100)]
    pub announce_timeout_ms: u64,

    /// Give up if replication has not finished after this many seconds.
    #[arg(long, env = "TESSERA_DEADLINE_SECS", default_value_t = 30)]
    pub deadline_secs: u64,
}
