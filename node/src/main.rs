// Copyright (c) 2026 Atrium Contributors. MIT License.
// See LICENSE for details.

//! # Atrium Economy Node
//!
//! Entry point for the `atrium-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the ledger, marketplace, and
//! reward engines together, and serves the REST API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the economy node
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use atrium_engine::gateway::ApprovingGateway;
use atrium_engine::ledger::{HeuristicRiskAssessor, Ledger};
use atrium_engine::marketplace::AuctionEngine;
use atrium_engine::rewards::RewardEngine;
use atrium_engine::store::memory::{
    MemoryAccountStore, MemoryBidStore, MemoryListingStore, MemoryQuestProgressStore,
    MemoryQuestStore, MemoryTransactionStore,
};
use atrium_engine::store::{AccountStore, ListingStore, TransactionStore};
use atrium_engine::LockTable;

use cli::{AtriumNodeCli, Commands};
use logging::LogFormat;
use metrics::EngineMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AtriumNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full economy node: REST API, metrics endpoint, and the
/// periodic expiry sweep.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "atrium_node=info,atrium_engine=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        sweep_interval_secs = args.sweep_interval_secs,
        "starting atrium-node"
    );

    // --- Storage ---
    let accounts: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let transactions: Arc<dyn TransactionStore> = Arc::new(MemoryTransactionStore::new());
    let listings: Arc<dyn ListingStore> = Arc::new(MemoryListingStore::new());
    let bids = Arc::new(MemoryBidStore::new());
    let quests = Arc::new(MemoryQuestStore::new());
    let progress = Arc::new(MemoryQuestProgressStore::new());

    // --- Engines ---
    let locks = Arc::new(LockTable::new());
    let risk = Arc::new(HeuristicRiskAssessor::new(
        Arc::clone(&accounts),
        Arc::clone(&transactions),
    ));
    let ledger = Arc::new(Ledger::new(
        Arc::clone(&accounts),
        Arc::clone(&transactions),
        risk,
        Some(Arc::new(ApprovingGateway)),
        Arc::clone(&locks),
    ));
    let auctions = Arc::new(AuctionEngine::new(
        Arc::clone(&listings),
        bids,
        Arc::clone(&accounts),
        Arc::clone(&ledger),
        Arc::clone(&locks),
    ));
    let rewards = Arc::new(RewardEngine::new(
        Arc::clone(&accounts),
        quests,
        progress,
        Arc::clone(&ledger),
        locks,
    ));

    // --- Metrics ---
    let engine_metrics = Arc::new(EngineMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: Arc::clone(&engine_metrics),
        accounts,
        listings: Arc::clone(&listings),
        ledger: Arc::clone(&ledger),
        auctions: Arc::clone(&auctions),
        rewards,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&engine_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Expiry sweep ---
    // Fails stale pending transactions and settles listings whose deadline
    // passed without an explicit end call.
    let sweep = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(args.sweep_interval_secs));
        // The first tick fires immediately; skip it so startup is quiet.
        interval.tick().await;
        loop {
            interval.tick().await;
            let now = chrono::Utc::now();

            match ledger.fail_expired(now) {
                Ok(expired) if expired.is_empty() => {}
                Ok(expired) => {
                    engine_metrics
                        .transactions_failed_total
                        .inc_by(expired.len() as u64);
                    tracing::info!(count = expired.len(), "expired stale pending transactions");
                }
                Err(e) => tracing::warn!("transaction expiry sweep failed: {}", e),
            }

            match auctions.sweep_expired(now) {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "swept elapsed listings"),
                Err(e) => tracing::warn!("listing sweep failed: {}", e),
            }

            if let Ok(active) = listings.active() {
                engine_metrics.active_listings.set(active.len() as i64);
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweep.abort();
    tracing::info!("atrium-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("atrium-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
