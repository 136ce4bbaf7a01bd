//! # Prometheus Metrics
//!
//! Operational metrics for the economy node, scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct EngineMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total transactions settled to `Completed`.
    pub transactions_completed_total: IntCounter,
    /// Total transactions that ended `Failed`.
    pub transactions_failed_total: IntCounter,
    /// Total transactions parked for manual review.
    pub transactions_held_total: IntCounter,
    /// Total grains burned as platform fees.
    pub fees_burned_grains_total: IntCounter,
    /// Total accepted auction bids.
    pub bids_placed_total: IntCounter,
    /// Total auctions settled (sold, reserve-not-met, or no-bids).
    pub auctions_settled_total: IntCounter,
    /// Total quest completions paid out.
    pub quests_completed_total: IntCounter,
    /// Listings currently in `Active` status.
    pub active_listings: IntGauge,
    /// Histogram of ledger processing latency in seconds.
    pub transaction_latency_seconds: Histogram,
}

impl EngineMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("atrium".into()), None)
            .expect("failed to create prometheus registry");

        let transactions_completed_total = IntCounter::new(
            "transactions_completed_total",
            "Total transactions settled to completed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_completed_total.clone()))
            .expect("metric registration");

        let transactions_failed_total = IntCounter::new(
            "transactions_failed_total",
            "Total transactions that ended failed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_failed_total.clone()))
            .expect("metric registration");

        let transactions_held_total = IntCounter::new(
            "transactions_held_total",
            "Total transactions parked for manual review",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_held_total.clone()))
            .expect("metric registration");

        let fees_burned_grains_total = IntCounter::new(
            "fees_burned_grains_total",
            "Total grains burned as platform fees",
        )
        .expect("metric creation");
        registry
            .register(Box::new(fees_burned_grains_total.clone()))
            .expect("metric registration");

        let bids_placed_total =
            IntCounter::new("bids_placed_total", "Total accepted auction bids")
                .expect("metric creation");
        registry
            .register(Box::new(bids_placed_total.clone()))
            .expect("metric registration");

        let auctions_settled_total = IntCounter::new(
            "auctions_settled_total",
            "Total auctions settled at their deadline",
        )
        .expect("metric creation");
        registry
            .register(Box::new(auctions_settled_total.clone()))
            .expect("metric registration");

        let quests_completed_total = IntCounter::new(
            "quests_completed_total",
            "Total quest completions paid out",
        )
        .expect("metric creation");
        registry
            .register(Box::new(quests_completed_total.clone()))
            .expect("metric registration");

        let active_listings =
            IntGauge::new("active_listings", "Listings currently in active status")
                .expect("metric creation");
        registry
            .register(Box::new(active_listings.clone()))
            .expect("metric registration");

        let transaction_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "transaction_latency_seconds",
                "Ledger transaction processing latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(transaction_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transactions_completed_total,
            transactions_failed_total,
            transactions_held_total,
            fees_burned_grains_total,
            bids_placed_total,
            auctions_settled_total,
            quests_completed_total,
            active_listings,
            transaction_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<EngineMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
