//! Feed client against a local ZMQ publisher.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use zeromq::{PubSocket, Socket, SocketSend, ZmqMessage};

use bridge::{AggregateState, EventAggregator, FeedClient, FeedConfig};

fn fast_config(endpoint: impl Into<String>) -> FeedConfig {
    let mut cfg = FeedConfig::new(endpoint);
    cfg.reconnect_interval = Duration::from_millis(100);
    cfg.idle_timeout = Duration::from_millis(300);
    cfg
}

fn spawn_client(cfg: FeedConfig) -> (Arc<AggregateState>, tokio::task::JoinHandle<()>) {
    let state = Arc::new(AggregateState::new());
    let (aggregator, latency_rx) = EventAggregator::new(state.clone());
    // Nothing drains the latency queue here; dropping the receiver only
    // makes the aggregator log and discard those updates.
    drop(latency_rx);
    let handle = tokio::spawn(FeedClient::new(cfg, aggregator).run());
    (state, handle)
}

/// PUB drops messages until a subscription has propagated, so keep
/// publishing `line` until `state` shows more than `seen_before` txs.
async fn publish_until_seen(
    publisher: &mut PubSocket,
    state: &AggregateState,
    seen_before: u64,
    line: &str,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while state.snapshot().seen <= seen_before {
        assert!(Instant::now() < deadline, "no tx line received");
        publisher
            .send(ZmqMessage::from(line.to_string()))
            .await
            .expect("publish");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn bind_with_retry(endpoint: &str) -> PubSocket {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let mut publisher = PubSocket::new();
        match publisher.bind(endpoint).await {
            Ok(_) => return publisher,
            Err(e) => {
                assert!(Instant::now() < deadline, "rebind {endpoint} failed: {e}");
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

#[tokio::test]
async fn subscriber_ingests_published_lines() {
    let mut publisher = PubSocket::new();
    let endpoint = publisher
        .bind("tcp://127.0.0.1:0")
        .await
        .expect("bind publisher");

    let (state, client) = spawn_client(fast_config(endpoint.to_string()));
    publish_until_seen(&mut publisher, &state, 0, "tx abc 0 5 0 0 0 0").await;

    publisher
        .send(ZmqMessage::from("rstat 9 8 7 6 5".to_string()))
        .await
        .expect("publish rstat");
    publisher
        .send(ZmqMessage::from("unknown topic".to_string()))
        .await
        .expect("publish noise");

    let deadline = Instant::now() + Duration::from_secs(10);
    while state.snapshot().resource_stats.is_none() {
        assert!(Instant::now() < deadline, "no rstat line received");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let stats = state.snapshot().resource_stats.expect("stats");
    assert_eq!(stats.to_process, 9);
    assert_eq!(stats.total_transactions, 5);

    client.abort();
}

#[tokio::test]
async fn resumes_after_publisher_restart() {
    let mut publisher = PubSocket::new();
    let endpoint = publisher
        .bind("tcp://127.0.0.1:0")
        .await
        .expect("bind publisher")
        .to_string();

    let (state, client) = spawn_client(fast_config(endpoint.clone()));
    publish_until_seen(&mut publisher, &state, 0, "tx before 0 1").await;

    drop(publisher);

    let mut restarted = bind_with_retry(&endpoint).await;
    let seen_before = state.snapshot().seen;
    publish_until_seen(&mut restarted, &state, seen_before, "tx after 0 1").await;

    assert!(!client.is_finished());
    client.abort();
}

#[tokio::test]
async fn publisher_bound_later_is_picked_up() {
    // Reserve a free port, then release it so nothing is listening yet.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("reserve port")
        .local_addr()
        .expect("local addr")
        .port();
    let endpoint = format!("tcp://127.0.0.1:{port}");

    let (state, client) = spawn_client(fast_config(format!("127.0.0.1:{port}")));

    // Several connect attempts time out and retry before the publisher exists.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!client.is_finished());
    assert_eq!(state.snapshot().seen, 0);

    let mut publisher = bind_with_retry(&endpoint).await;
    publish_until_seen(&mut publisher, &state, 0, "tx late 0 0").await;
    assert_eq!(state.snapshot().with_value, 0);

    client.abort();
}
