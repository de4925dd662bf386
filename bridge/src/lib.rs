//! Bridge library crate.
//!
//! This crate provides the building blocks of the IOTA metrics bridge:
//!
//! - ZMQ feed parsing and the subscriber connection (`feed`),
//! - event counters and seen/confirmed correlation (`aggregator`),
//! - the persistent latency store (`storage`),
//! - node and market poll collectors (`collectors`),
//! - the Prometheus registry and `/metrics` exporter (`metrics`),
//! - and top-level configuration (`config`).
//!
//! The `exporter` binary composes these pieces into a running service.

pub mod aggregator;
pub mod collectors;
pub mod config;
pub mod feed;
pub mod metrics;
pub mod storage;

// Re-export top-level configuration types.
pub use config::{BridgeConfig, ConfigError, FeedConfig, MarketConfig, MetricsConfig, NodeApiConfig};

pub use aggregator::{
    AggregateSnapshot, AggregateState, EventAggregator, LatencyRecorder, LatencyUpdate,
    spawn_latency_worker,
};
pub use collectors::{CollectorError, MarketClient, NodeApiClient};
pub use feed::{FeedClient, FeedError, FeedEvent, ResourceStats};
pub use metrics::{BridgeMetrics, Exporter, ScrapeError, run_prometheus_http_server};
pub use storage::{
    InMemoryLatencyStore, LatencyRecord, LatencyStore, RocksDbConfig, RocksDbLatencyStore,
    StorageError,
};
