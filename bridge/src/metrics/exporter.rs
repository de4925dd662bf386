//! Scrape orchestration and the `/metrics` HTTP server.
//!
//! Every `GET /metrics` runs the node, neighbor, tangle and market
//! collectors concurrently, copies the feed aggregate into the registry
//! and renders the text exposition format. The server itself is a bare
//! `hyper` HTTP/1 loop.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, header::HeaderValue,
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::BridgeMetrics;
use crate::aggregator::AggregateState;
use crate::collectors::{CollectorError, MarketClient, NodeApiClient};

/// A scrape that could not be rendered.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("collectors failed: {}", .0.join("; "))]
    Collectors(Vec<String>),
}

/// Glue between the collectors, the feed aggregate and the registry.
pub struct Exporter {
    metrics: BridgeMetrics,
    node: NodeApiClient,
    market: MarketClient,
    state: Arc<AggregateState>,
    strict: bool,
    // Serializes scrapes so reset/populate passes never interleave.
    scrape_lock: Mutex<()>,
}

impl Exporter {
    pub fn new(
        metrics: BridgeMetrics,
        node: NodeApiClient,
        market: MarketClient,
        state: Arc<AggregateState>,
        strict: bool,
    ) -> Self {
        Self {
            metrics,
            node,
            market,
            state,
            strict,
            scrape_lock: Mutex::new(()),
        }
    }

    /// Runs one full scrape and returns the rendered registry.
    ///
    /// In degraded mode a failed collector only loses its own series:
    /// labelled neighbor and market series are dropped, while the unlabelled
    /// node and tangle gauges keep their last successful value (0 before the
    /// first success). Those stale readings are only distinguishable from
    /// fresh ones through `iota_exporter_collector_up{collector}`, which is
    /// 0 for every collector that failed on this scrape. In strict mode any
    /// failure fails the whole scrape.
    pub async fn scrape(&self) -> Result<String, ScrapeError> {
        let _guard = self.scrape_lock.lock().await;

        let (node, neighbors, tangle, market) = tokio::join!(
            self.node.node_info(),
            self.node.neighbors(),
            self.node.tangle_info(),
            self.market.snapshot(),
        );

        let mut failed = Vec::new();

        match node {
            Ok(node) => {
                self.metrics.set_node(&node);
                self.collector_ok("node");
            }
            // Scalar gauges stay at their last value; collector_up marks them stale.
            Err(e) => self.collector_failed("node", &e, &mut failed),
        }

        match neighbors {
            Ok(neighbors) => {
                self.metrics.set_neighbors(&neighbors);
                self.collector_ok("neighbors");
            }
            Err(e) => {
                self.metrics.reset_neighbors();
                self.collector_failed("neighbors", &e, &mut failed);
            }
        }

        match tangle {
            Ok(tangle) => {
                self.metrics.set_tangle(&tangle);
                self.collector_ok("tangle");
            }
            Err(e) => self.collector_failed("tangle", &e, &mut failed),
        }

        self.metrics.set_market(&market);
        if market.failures.is_empty() {
            self.collector_ok("market");
        } else {
            for (pair, e) in &market.failures {
                tracing::warn!(collector = "market", %pair, "collector failed: {e}");
                failed.push(format!("market {pair}: {e}"));
            }
            self.metrics.set_collector_up("market", false);
        }

        self.metrics.set_feed(&self.state.snapshot());

        if self.strict && !failed.is_empty() {
            return Err(ScrapeError::Collectors(failed));
        }
        Ok(self.metrics.gather_text())
    }

    fn collector_ok(&self, collector: &str) {
        self.metrics.set_collector_up(collector, true);
    }

    fn collector_failed(&self, collector: &str, e: &CollectorError, failed: &mut Vec<String>) {
        tracing::warn!(collector, "collector failed: {e}");
        self.metrics.set_collector_up(collector, false);
        failed.push(format!("{collector}: {e}"));
    }
}

/// Binds `addr` and serves the exporter until the listener fails.
pub async fn run_prometheus_http_server(
    exporter: Arc<Exporter>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve(exporter, listener).await
}

/// Serves `GET /metrics` and `GET /health` on an already bound listener.
/// All other paths return 404.
pub async fn serve(
    exporter: Arc<Exporter>,
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let exporter = exporter.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let exporter = exporter.clone();
                handle_request(req, exporter)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!("metrics HTTP connection error: {err}");
            }
        });
    }
}

fn response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp
}

async fn handle_request(
    req: Request<Incoming>,
    exporter: Arc<Exporter>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    drop(req);

    match (&method, path.as_str()) {
        (&Method::GET, "/metrics") => match exporter.scrape().await {
            Ok(body) => {
                let mut resp = response(StatusCode::OK, body);
                resp.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(prometheus::TEXT_FORMAT),
                );
                Ok(resp)
            }
            Err(e) => {
                tracing::error!("scrape failed: {e}");
                Ok(response(StatusCode::SERVICE_UNAVAILABLE, Bytes::new()))
            }
        },
        (&Method::GET, "/health") => Ok(response(StatusCode::OK, "ok")),
        _ => Ok(response(StatusCode::NOT_FOUND, "not found")),
    }
}
