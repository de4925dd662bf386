//! Metrics and the scrape endpoint.
//!
//! This module defines the Prometheus registry for everything the bridge
//! republishes and the HTTP exporter that serves it.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge::metrics::{BridgeMetrics, Exporter, run_prometheus_http_server};
//!
//! let metrics = BridgeMetrics::new()?;
//! let exporter = Arc::new(Exporter::new(metrics, node, market, state, false));
//! run_prometheus_http_server(exporter, "127.0.0.1:9311".parse()?).await?;
//! ```

pub mod exporter;
pub mod prometheus;

pub use exporter::{Exporter, ScrapeError, run_prometheus_http_server, serve};
pub use prometheus::BridgeMetrics;
