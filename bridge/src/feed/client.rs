//! ZMQ SUB client with a fixed-interval reconnect policy.
//!
//! The client subscribes to every topic on the node's publisher and hands
//! each received frame to the [`EventAggregator`] in arrival order.
//!
//! A SUB socket never reports that its publisher went away: `recv` just
//! stays pending. Liveness is therefore inferred from traffic. A session
//! that is silent for [`FeedConfig::idle_timeout`] is treated as
//! disconnected, and a connect attempt that has not completed within
//! [`FeedConfig::reconnect_interval`] is abandoned. Either way the socket
//! is dropped and a fresh one is built after `reconnect_interval`. The
//! feed never takes the process down.

use std::convert::Infallible;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use zeromq::{Socket, SocketRecv, SubSocket, ZmqError};

use crate::aggregator::EventAggregator;
use crate::config::FeedConfig;

/// Reasons a feed session ends.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: ZmqError,
    },
    #[error("connect to {endpoint} did not complete within {waited:?}")]
    ConnectTimeout { endpoint: String, waited: Duration },
    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] ZmqError),
    #[error("receive failed: {0}")]
    Receive(#[source] ZmqError),
    #[error("no message for {0:?}, assuming the publisher is gone")]
    Idle(Duration),
}

/// Long-lived subscriber for the node's ZMQ feed.
pub struct FeedClient {
    cfg: FeedConfig,
    aggregator: EventAggregator,
}

impl FeedClient {
    pub fn new(cfg: FeedConfig, aggregator: EventAggregator) -> Self {
        Self { cfg, aggregator }
    }

    /// Runs the subscribe/receive/reconnect loop forever.
    ///
    /// Intended to be spawned onto the runtime.
    pub async fn run(self) {
        let endpoint = self.cfg.zmq_endpoint();
        let interval = self.cfg.reconnect_interval;

        loop {
            let Err(e) = self.session(&endpoint).await;
            match e {
                FeedError::Idle(_) | FeedError::Receive(_) => {
                    tracing::warn!(%endpoint, "zmq disconnected: {e}");
                }
                _ => tracing::warn!(%endpoint, "zmq connect failed: {e}"),
            }

            tracing::info!(
                %endpoint,
                "zmq connect retry in {}s",
                interval.as_secs_f64()
            );
            tokio::time::sleep(interval).await;
        }
    }

    /// Connects, subscribes and pumps messages until the connection is
    /// considered lost. Only returns with the reason it ended.
    async fn session(&self, endpoint: &str) -> Result<Infallible, FeedError> {
        let mut socket = SubSocket::new();

        let waited = self.cfg.reconnect_interval;
        match timeout(waited, socket.connect(endpoint)).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(FeedError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(FeedError::ConnectTimeout {
                    endpoint: endpoint.to_string(),
                    waited,
                });
            }
        }
        socket.subscribe("").await.map_err(FeedError::Subscribe)?;
        tracing::info!(%endpoint, "zmq socket connected");

        let idle = self.cfg.idle_timeout;
        loop {
            let msg = timeout(idle, socket.recv())
                .await
                .map_err(|_| FeedError::Idle(idle))?
                .map_err(FeedError::Receive)?;

            for frame in msg.into_vec() {
                match std::str::from_utf8(&frame) {
                    Ok(line) => {
                        self.aggregator.ingest(line);
                    }
                    Err(_) => tracing::debug!("skipping non-utf8 zmq frame"),
                }
            }
        }
    }
}
