//! Prometheus registry for the bridge.
//!
//! [`BridgeMetrics`] owns every gauge and the confirmation histogram and
//! knows how to copy collector snapshots and aggregate state into them.
//! Labelled series are reset before being repopulated so peers or pairs
//! that vanished do not linger in the output.

use prometheus::{
    self, Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::aggregator::AggregateSnapshot;
use crate::collectors::{MarketSnapshot, NeighborSnapshot, NodeSnapshot, TangleSnapshot};

/// Namespace prefixed to every metric name.
pub const NAMESPACE: &str = "iota";

/// Confirmation latency buckets, in seconds. Milestones are minutes apart,
/// so the interesting range is tens of seconds up to an hour.
const CONFIRMATION_BUCKETS: &[f64] = &[
    10.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0, 900.0, 1200.0, 1800.0, 3600.0,
];

/// Gauges filled from `getNodeInfo`.
#[derive(Clone)]
pub struct NodeMetrics {
    pub transactions_queued: IntGauge,
    pub tips: IntGauge,
    pub neighbors: IntGauge,
    pub latest_milestone: IntGauge,
    pub latest_subtangle_milestone: IntGauge,
}

/// Per-neighbor gauges labelled by `id` (the peer address).
#[derive(Clone)]
pub struct NeighborMetrics {
    pub new_transactions: IntGaugeVec,
    pub random_transactions: IntGaugeVec,
    pub all_transactions: IntGaugeVec,
    pub invalid_transactions: IntGaugeVec,
    pub active_neighbors: IntGauge,
}

/// Whole-tangle totals.
#[derive(Clone)]
pub struct TangleMetrics {
    pub total_txs: IntGauge,
    pub confirmed_txs: IntGauge,
}

/// Ticker gauges labelled by `pair`.
#[derive(Clone)]
pub struct MarketMetrics {
    pub trade_price: GaugeVec,
    pub trade_volume: GaugeVec,
}

/// Feed-derived counters, queue sizes and the confirmation histogram.
#[derive(Clone)]
pub struct FeedMetrics {
    pub seen_txs: IntCounter,
    pub txs_with_value: IntCounter,
    pub confirmed_txs: IntCounter,
    pub to_process: IntGauge,
    pub to_broadcast: IntGauge,
    pub to_request: IntGauge,
    pub to_reply: IntGauge,
    pub total_transactions: IntGauge,
    /// Seconds between a transaction being seen and being confirmed.
    pub confirmation_seconds: Histogram,
}

/// Wrapper around a Prometheus registry and all bridge metrics.
///
/// Cheap to clone; every handle points at the same underlying series.
#[derive(Clone)]
pub struct BridgeMetrics {
    registry: Registry,
    pub node: NodeMetrics,
    pub neighbors: NeighborMetrics,
    pub tangle: TangleMetrics,
    pub market: MarketMetrics,
    pub feed: FeedMetrics,
    /// 1 if the named collector succeeded on the last scrape, else 0.
    pub collector_up: IntGaugeVec,
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn int_counter(
    registry: &Registry,
    name: &str,
    help: &str,
) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn int_gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    label: &str,
) -> Result<IntGaugeVec, prometheus::Error> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), &[label])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    label: &str,
) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[label])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl BridgeMetrics {
    /// Creates a fresh `iota`-prefixed registry and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;
        let r = &registry;

        let node = NodeMetrics {
            transactions_queued: int_gauge(
                r,
                "node_info_total_transactions_queued",
                "Total open txs at the interval",
            )?,
            tips: int_gauge(r, "node_info_total_tips", "Total tips at the interval")?,
            neighbors: int_gauge(
                r,
                "node_info_total_neighbors",
                "Total neighbors at the interval",
            )?,
            latest_milestone: int_gauge(
                r,
                "node_info_latest_milestone",
                "Tangle milestone at the interval",
            )?,
            latest_subtangle_milestone: int_gauge(
                r,
                "node_info_latest_subtangle_milestone",
                "Subtangle milestone at the interval",
            )?,
        };

        let neighbors = NeighborMetrics {
            new_transactions: int_gauge_vec(
                r,
                "neighbors_new_transactions",
                "New transactions by neighbor",
                "id",
            )?,
            random_transactions: int_gauge_vec(
                r,
                "neighbors_random_transactions",
                "Random transactions by neighbor",
                "id",
            )?,
            all_transactions: int_gauge_vec(
                r,
                "neighbors_all_transactions",
                "All transactions by neighbor",
                "id",
            )?,
            invalid_transactions: int_gauge_vec(
                r,
                "neighbors_invalid_transactions",
                "Invalid transactions by neighbor",
                "id",
            )?,
            active_neighbors: int_gauge(
                r,
                "neighbors_active_neighbors",
                "Number of neighbors who are active",
            )?,
        };

        let tangle = TangleMetrics {
            total_txs: int_gauge(
                r,
                "tangle_total_txs",
                "Number of total transactions from the whole tangle",
            )?,
            confirmed_txs: int_gauge(
                r,
                "tangle_confirmed_txs",
                "Number of confirmed transactions from the whole tangle",
            )?,
        };

        let market = MarketMetrics {
            trade_price: gauge_vec(r, "market_trade_price", "Latest trade price", "pair")?,
            trade_volume: gauge_vec(r, "market_trade_volume", "Latest trade volume", "pair")?,
        };

        let confirmation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "zmq_tx_confirm_seconds",
                "Seconds between a transaction being seen on the feed and being confirmed",
            )
            .buckets(CONFIRMATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(confirmation_seconds.clone()))?;

        let feed = FeedMetrics {
            seen_txs: int_counter(r, "zmq_seen_txs_total", "Transactions seen on the feed")?,
            txs_with_value: int_counter(
                r,
                "zmq_txs_with_value_total",
                "Transactions seen on the feed carrying a nonzero value",
            )?,
            confirmed_txs: int_counter(
                r,
                "zmq_confirmed_txs_total",
                "Transactions confirmed on the feed",
            )?,
            to_process: int_gauge(r, "zmq_to_process", "Transactions waiting to be processed")?,
            to_broadcast: int_gauge(
                r,
                "zmq_to_broadcast",
                "Transactions waiting to be broadcast",
            )?,
            to_request: int_gauge(r, "zmq_to_request", "Transactions waiting to be requested")?,
            to_reply: int_gauge(r, "zmq_to_reply", "Requests waiting for a reply")?,
            total_transactions: int_gauge(
                r,
                "zmq_total_transactions",
                "Total transactions reported by the node's queue stats",
            )?,
            confirmation_seconds,
        };

        let collector_up = int_gauge_vec(
            r,
            "exporter_collector_up",
            "Whether the collector succeeded on the last scrape",
            "collector",
        )?;

        Ok(Self {
            registry,
            node,
            neighbors,
            tangle,
            market,
            feed,
            collector_up,
        })
    }

    pub fn set_node(&self, node: &NodeSnapshot) {
        self.node.transactions_queued.set(node.pending_transactions);
        self.node.tips.set(node.tips);
        self.node.neighbors.set(node.neighbor_count);
        self.node.latest_milestone.set(node.latest_milestone_index);
        self.node
            .latest_subtangle_milestone
            .set(node.latest_solid_subtangle_milestone_index);
    }

    /// Drops every per-neighbor series.
    pub fn reset_neighbors(&self) {
        self.neighbors.new_transactions.reset();
        self.neighbors.random_transactions.reset();
        self.neighbors.all_transactions.reset();
        self.neighbors.invalid_transactions.reset();
    }

    /// Replaces the per-neighbor series with `neighbors`.
    pub fn set_neighbors(&self, neighbors: &[NeighborSnapshot]) {
        self.reset_neighbors();

        let mut active = 0;
        for n in neighbors {
            let id = [n.address.as_str()];
            self.neighbors
                .new_transactions
                .with_label_values(&id)
                .set(n.new_transactions);
            self.neighbors
                .invalid_transactions
                .with_label_values(&id)
                .set(n.invalid_transactions);
            self.neighbors
                .all_transactions
                .with_label_values(&id)
                .set(n.all_transactions);
            self.neighbors
                .random_transactions
                .with_label_values(&id)
                .set(n.random_transaction_requests);
            if n.is_active() {
                active += 1;
            }
        }
        self.neighbors.active_neighbors.set(active);
    }

    /// Sets whichever tangle totals parsed; unparsable fields keep their value.
    pub fn set_tangle(&self, tangle: &TangleSnapshot) {
        if let Some(total) = tangle.total_transactions {
            self.tangle.total_txs.set(total);
        }
        if let Some(confirmed) = tangle.confirmed_transactions {
            self.tangle.confirmed_txs.set(confirmed);
        }
    }

    pub fn reset_market(&self) {
        self.market.trade_price.reset();
        self.market.trade_volume.reset();
    }

    /// Replaces the ticker series with the quotes in `market`.
    pub fn set_market(&self, market: &MarketSnapshot) {
        self.reset_market();
        for quote in &market.quotes {
            let pair = [quote.pair.as_str()];
            self.market.trade_price.with_label_values(&pair).set(quote.price);
            self.market
                .trade_volume
                .with_label_values(&pair)
                .set(quote.volume);
        }
    }

    /// Advances the feed counters to `snapshot` and copies the latest queue
    /// snapshot.
    ///
    /// Aggregate totals only grow, so each counter is bumped by the
    /// difference from its current value.
    pub fn set_feed(&self, snapshot: &AggregateSnapshot) {
        advance(&self.feed.seen_txs, snapshot.seen);
        advance(&self.feed.txs_with_value, snapshot.with_value);
        advance(&self.feed.confirmed_txs, snapshot.confirmed);

        if let Some(stats) = snapshot.resource_stats {
            self.feed.to_process.set(clamp(stats.to_process));
            self.feed.to_broadcast.set(clamp(stats.to_broadcast));
            self.feed.to_request.set(clamp(stats.to_request));
            self.feed.to_reply.set(clamp(stats.to_reply));
            self.feed.total_transactions.set(clamp(stats.total_transactions));
        }
    }

    pub fn set_collector_up(&self, collector: &str, up: bool) {
        self.collector_up
            .with_label_values(&[collector])
            .set(i64::from(up));
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let delta = total.saturating_sub(counter.get());
    if delta > 0 {
        counter.inc_by(delta);
    }
}

fn clamp(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
