// exporter/src/main.rs

//! Exporter binary.
//!
//! Wires the bridge together:
//!
//! - RocksDB-backed latency store + background latency worker
//! - ZMQ feed subscriber (when `ZMQ_URL` is set)
//! - node and market collectors
//! - Prometheus exporter on `/metrics`

use std::sync::Arc;

use tokio::signal;

use bridge::{
    AggregateState, BridgeConfig, BridgeMetrics, EventAggregator, Exporter, FeedClient,
    LatencyRecorder, MarketClient, NodeApiClient, RocksDbLatencyStore, run_prometheus_http_server,
    spawn_latency_worker,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "exporter=info,bridge=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = BridgeConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;

    // ---------------------------
    // Metrics registry
    // ---------------------------

    let metrics = BridgeMetrics::new()
        .map_err(|e| format!("failed to initialise metrics registry: {e}"))?;

    // ---------------------------
    // Latency store + worker
    // ---------------------------

    let store = RocksDbLatencyStore::open(&cfg.storage).map_err(|e| {
        format!(
            "failed to open latency store at {}: {e}",
            cfg.storage.path
        )
    })?;
    let recorder = LatencyRecorder::new(
        Arc::new(store),
        metrics.feed.confirmation_seconds.clone(),
    );

    let state = Arc::new(AggregateState::new());
    let (aggregator, latency_rx) = EventAggregator::new(state.clone());
    let _latency_worker = spawn_latency_worker(recorder, latency_rx);

    // ---------------------------
    // ZMQ feed
    // ---------------------------

    match cfg.feed.clone() {
        Some(feed_cfg) => {
            tracing::info!(
                endpoint = %feed_cfg.endpoint,
                reconnect_secs = feed_cfg.reconnect_interval.as_secs(),
                "starting zmq feed"
            );
            tokio::spawn(FeedClient::new(feed_cfg, aggregator).run());
        }
        None => {
            tracing::info!("ZMQ is not configured");
            drop(aggregator);
        }
    }

    // ---------------------------
    // Collectors + exporter
    // ---------------------------

    let node = NodeApiClient::new(&cfg.node)
        .map_err(|e| format!("failed to create node API client: {e}"))?;
    let market = MarketClient::new(&cfg.market)
        .map_err(|e| format!("failed to create market client: {e}"))?;

    let exporter = Arc::new(Exporter::new(
        metrics,
        node,
        market,
        state,
        cfg.metrics.strict_scrape,
    ));

    let addr = cfg.metrics.listen_addr;
    tracing::info!("metrics exporter listening on http://{}/metrics", addr);

    tokio::select! {
        res = run_prometheus_http_server(exporter, addr) => {
            res.map_err(|e| format!("metrics HTTP server error on {addr}: {e}"))?;
        }
        _ = shutdown_signal() => {}
    }

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
