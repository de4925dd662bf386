//! Request-scoped poll collectors.
//!
//! Each collector issues outbound HTTP calls on demand and maps the
//! response into a snapshot. Nothing here holds state between scrapes.

pub mod market;
pub mod node;

use thiserror::Error;

pub use market::{MarketClient, MarketQuote, MarketSnapshot};
pub use node::{NeighborSnapshot, NodeApiClient, NodeSnapshot, TangleSnapshot};

/// Errors returned by a collector call.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Connection failure, timeout or client construction error.
    #[error("transport error: {0}")]
    Transport(String),
    /// Upstream answered with a non-success status.
    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    /// Upstream answered with a body we could not interpret.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

fn build_client(timeout: std::time::Duration) -> Result<reqwest::Client, CollectorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollectorError::Transport(format!("failed to build HTTP client: {e}")))
}
