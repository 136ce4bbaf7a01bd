//! # CLI Interface
//!
//! Defines the command-line argument structure for `atrium-node` using
//! `clap` derive. Two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};

use atrium_engine::config;

/// Atrium economy service node.
///
/// Runs the full virtual-economy engine — ledger, marketplace, and
/// rewards — behind a REST API, with Prometheus metrics and a periodic
/// expiry sweep.
#[derive(Parser, Debug)]
#[command(
    name = "atrium-node",
    about = "Atrium economy service node",
    version,
    propagate_version = true
)]
pub struct AtriumNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Atrium node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the economy node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the REST API.
    #[arg(long, env = "ATRIUM_API_PORT", default_value_t = config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "ATRIUM_METRICS_PORT", default_value_t = config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds between expiry sweeps (stale transactions, elapsed
    /// listings and auctions).
    #[arg(long, env = "ATRIUM_SWEEP_INTERVAL", default_value_t = config::DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "ATRIUM_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
