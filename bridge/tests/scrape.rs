//! End-to-end scrapes against a canned upstream node + ticker API.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use bridge::metrics::serve;
use bridge::{
    AggregateState, BridgeMetrics, EventAggregator, Exporter, MarketClient, MarketConfig,
    NodeApiClient, NodeApiConfig,
};

/// Mutable knobs for the fake upstream.
struct Upstream {
    neighbors: Mutex<Vec<(&'static str, i64)>>,
    market_delay: Mutex<Duration>,
    node_down: Mutex<bool>,
}

impl Upstream {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            neighbors: Mutex::new(vec![("10.0.0.1:14600", 5), ("10.0.0.2:14600", 0)]),
            market_delay: Mutex::new(Duration::ZERO),
            node_down: Mutex::new(false),
        })
    }

    fn set_neighbors(&self, neighbors: Vec<(&'static str, i64)>) {
        *self.neighbors.lock().expect("lock") = neighbors;
    }

    fn set_market_delay(&self, delay: Duration) {
        *self.market_delay.lock().expect("lock") = delay;
    }

    fn set_node_down(&self, down: bool) {
        *self.node_down.lock().expect("lock") = down;
    }
}

fn json_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = status;
    resp
}

async fn handle(
    req: Request<Incoming>,
    upstream: Arc<Upstream>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();

    if req.method() == Method::POST {
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => Bytes::new(),
        };
        let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

        let node_down = *upstream.node_down.lock().expect("lock");
        let reply = match request["command"].as_str() {
            Some("getNodeInfo") if node_down => {
                return Ok(json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "node busy"}),
                ));
            }
            Some("getNodeInfo") => json!({
                "appName": "IRI",
                "transactionsToRequest": 12,
                "tips": 4211,
                "neighbors": 2,
                "latestMilestoneIndex": 590000,
                "latestSolidSubtangleMilestoneIndex": 589999
            }),
            Some("getNeighbors") => {
                let neighbors: Vec<Value> = upstream
                    .neighbors
                    .lock()
                    .expect("lock")
                    .iter()
                    .map(|(address, all)| {
                        json!({
                            "address": address,
                            "numberOfAllTransactions": all,
                            "numberOfNewTransactions": 0,
                            "numberOfInvalidTransactions": 0,
                            "numberOfRandomTransactionRequests": 0
                        })
                    })
                    .collect();
                json!({ "neighbors": neighbors })
            }
            Some("getTangleInfo") => json!({ "totalTx": "1000", "confirmedTx": "900" }),
            _ => return Ok(json_response(StatusCode::BAD_REQUEST, json!({"error": "bad command"}))),
        };
        return Ok(json_response(StatusCode::OK, reply));
    }

    if path.starts_with("/ticker/t") {
        let delay = *upstream.market_delay.lock().expect("lock");
        tokio::time::sleep(delay).await;
        return Ok(json_response(
            StatusCode::OK,
            json!([0.27, 100.0, 0.28, 100.0, 0.0, 0.0, 0.275, 123456.5, 0.3, 0.2]),
        ));
    }

    Ok(json_response(StatusCode::NOT_FOUND, json!({})))
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind upstream");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let upstream = upstream.clone();
            tokio::spawn(async move {
                let svc = service_fn(move |req| handle(req, upstream.clone()));
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });

    addr
}

fn exporter(addr: SocketAddr, state: Arc<AggregateState>, strict: bool) -> Exporter {
    let timeout = Duration::from_millis(300);
    let node = NodeApiClient::new(&NodeApiConfig {
        url: format!("http://{addr}/"),
        timeout,
        ..NodeApiConfig::default()
    })
    .expect("node client");
    let market = MarketClient::new(&MarketConfig {
        base_url: format!("http://{addr}"),
        pairs: vec!["IOTUSD".into(), "BTCUSD".into()],
        timeout,
    })
    .expect("market client");

    Exporter::new(
        BridgeMetrics::new().expect("metrics"),
        node,
        market,
        state,
        strict,
    )
}

#[tokio::test]
async fn full_scrape_renders_every_source() {
    let upstream = Upstream::new();
    let addr = spawn_upstream(upstream).await;

    let state = Arc::new(AggregateState::new());
    let (aggregator, _rx) = EventAggregator::new(state.clone());
    aggregator.ingest_at("tx abc123 0 5 0 0 0 0", 1_000);
    aggregator.ingest_at("rstat 1 2 3 4 5", 1_000);
    aggregator.ingest_at("sn 1 abc123", 4_000);

    let exporter = exporter(addr, state, false);
    let text = exporter.scrape().await.expect("scrape");

    assert!(text.contains("iota_node_info_total_transactions_queued 12"));
    assert!(text.contains("iota_node_info_latest_subtangle_milestone 589999"));
    assert!(text.contains(r#"iota_neighbors_all_transactions{id="10.0.0.1:14600"} 5"#));
    assert!(text.contains("iota_neighbors_active_neighbors 1"));
    assert!(text.contains("iota_tangle_total_txs 1000"));
    assert!(text.contains("iota_tangle_confirmed_txs 900"));
    assert!(text.contains(r#"iota_market_trade_price{pair="IOTUSD"} 0.275"#));
    assert!(text.contains(r#"iota_market_trade_volume{pair="BTCUSD"} 123456.5"#));
    assert!(text.contains("iota_zmq_seen_txs_total 1"));
    assert!(text.contains("iota_zmq_txs_with_value_total 1"));
    assert!(text.contains("iota_zmq_confirmed_txs_total 1"));
    assert!(text.contains("iota_zmq_total_transactions 5"));
    assert!(text.contains(r#"iota_exporter_collector_up{collector="market"} 1"#));
}

#[tokio::test]
async fn vanished_neighbor_is_absent_from_next_scrape() {
    let upstream = Upstream::new();
    let addr = spawn_upstream(upstream.clone()).await;
    let exporter = exporter(addr, Arc::new(AggregateState::new()), false);

    let first = exporter.scrape().await.expect("first scrape");
    assert!(first.contains("10.0.0.1:14600"));

    upstream.set_neighbors(vec![("10.0.0.2:14600", 7)]);
    let second = exporter.scrape().await.expect("second scrape");
    assert!(!second.contains("10.0.0.1:14600"));
    assert!(second.contains(r#"iota_neighbors_all_transactions{id="10.0.0.2:14600"} 7"#));
}

#[tokio::test]
async fn market_timeout_degrades_without_hanging() {
    let upstream = Upstream::new();
    upstream.set_market_delay(Duration::from_secs(3));
    let addr = spawn_upstream(upstream).await;
    let exporter = exporter(addr, Arc::new(AggregateState::new()), false);

    let started = Instant::now();
    let text = exporter.scrape().await.expect("degraded scrape still renders");
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(!text.contains("iota_market_trade_price{"));
    assert!(text.contains(r#"iota_exporter_collector_up{collector="market"} 0"#));
    assert!(text.contains("iota_node_info_total_tips 4211"));
}

#[tokio::test]
async fn failed_node_collector_keeps_last_gauges_and_marks_them_down() {
    let upstream = Upstream::new();
    let addr = spawn_upstream(upstream.clone()).await;
    let exporter = exporter(addr, Arc::new(AggregateState::new()), false);

    let first = exporter.scrape().await.expect("first scrape");
    assert!(first.contains("iota_node_info_total_tips 4211"));
    assert!(first.contains(r#"iota_exporter_collector_up{collector="node"} 1"#));

    upstream.set_node_down(true);
    let second = exporter.scrape().await.expect("degraded scrape still renders");
    assert!(second.contains("iota_node_info_total_tips 4211"));
    assert!(second.contains(r#"iota_exporter_collector_up{collector="node"} 0"#));
    assert!(second.contains(r#"iota_exporter_collector_up{collector="neighbors"} 1"#));
}

#[tokio::test]
async fn strict_mode_fails_whole_scrape_and_returns_503() {
    let upstream = Upstream::new();
    upstream.set_market_delay(Duration::from_secs(3));
    let upstream_addr = spawn_upstream(upstream).await;

    let exporter = Arc::new(exporter(upstream_addr, Arc::new(AggregateState::new()), true));
    assert!(exporter.scrape().await.is_err());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind exporter");
    let exporter_addr = listener.local_addr().expect("local addr");
    tokio::spawn(serve(exporter, listener));

    let client = reqwest::Client::new();
    let metrics = client
        .get(format!("http://{exporter_addr}/metrics"))
        .send()
        .await
        .expect("GET /metrics");
    assert_eq!(metrics.status().as_u16(), 503);
    assert!(metrics.text().await.expect("body").is_empty());

    let health = client
        .get(format!("http://{exporter_addr}/health"))
        .send()
        .await
        .expect("GET /health");
    assert_eq!(health.status().as_u16(), 200);

    let missing = client
        .get(format!("http://{exporter_addr}/nope"))
        .send()
        .await
        .expect("GET /nope");
    assert_eq!(missing.status().as_u16(), 404);
}
