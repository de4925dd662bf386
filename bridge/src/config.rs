//! Top-level configuration for the metrics bridge.
//!
//! This module aggregates configuration for:
//!
//! - the IRI node API client (URL, API version header, tangle command),
//! - the market ticker client (base URL + currency pairs),
//! - the ZMQ event feed (optional endpoint + reconnect interval),
//! - the latency store (RocksDB path),
//! - the metrics exporter (listen address + scrape mode).
//!
//! Every sub-config has a `Default`; [`BridgeConfig::from_env`] layers
//! environment overrides on top of those defaults.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::storage::RocksDbConfig;

/// Errors raised while reading configuration overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the IRI node API client.
#[derive(Clone, Debug)]
pub struct NodeApiConfig {
    /// Root URL of the node API, e.g. `"http://127.0.0.1:14265"`.
    pub url: String,
    /// Value sent in the `X-IOTA-API-Version` header.
    pub api_version: String,
    /// Command used to fetch whole-tangle transaction totals.
    pub tangle_command: String,
    /// Request timeout for node API calls.
    pub timeout: Duration,
}

impl Default for NodeApiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:14265".to_string(),
            api_version: "1".to_string(),
            tangle_command: "getTangleInfo".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for the market ticker client.
#[derive(Clone, Debug)]
pub struct MarketConfig {
    /// Base URL of the ticker API (without a trailing slash).
    pub base_url: String,
    /// Currency pairs to fetch on every scrape, e.g. `"IOTUSD"`.
    pub pairs: Vec<String>,
    /// Request timeout for ticker calls.
    pub timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitfinex.com/v2".to_string(),
            pairs: ["IOTUSD", "IOTEUR", "IOTBTC", "IOTETH", "BTCUSD", "BTCEUR", "ETHUSD"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for the ZMQ transaction feed.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// `host:port` of the node's ZMQ publisher.
    pub endpoint: String,
    /// Delay between reconnect attempts. Also bounds a single connect attempt.
    pub reconnect_interval: Duration,
    /// Silence after which the connection is considered dead.
    pub idle_timeout: Duration,
}

impl FeedConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reconnect_interval: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// ZMQ endpoint string, `tcp://` prefixed when no scheme is given.
    pub fn zmq_endpoint(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("tcp://{}", self.endpoint)
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
    /// When set, any collector failure fails the whole scrape.
    pub strict_scrape: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9311)),
            strict_scrape: false,
        }
    }
}

/// Top-level configuration for the bridge.
#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    pub node: NodeApiConfig,
    pub market: MarketConfig,
    /// `None` disables the event feed entirely.
    pub feed: Option<FeedConfig>,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
}

impl BridgeConfig {
    /// Builds a configuration from defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults plus overrides returned by `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(ip) = get("BIND_ADDRESS") {
            cfg.metrics.listen_addr.set_ip(parse::<IpAddr>("BIND_ADDRESS", &ip)?);
        }
        if let Some(port) = get("BIND_PORT") {
            cfg.metrics.listen_addr.set_port(parse::<u16>("BIND_PORT", &port)?);
        }
        if let Some(strict) = get("STRICT_SCRAPE") {
            cfg.metrics.strict_scrape = parse::<bool>("STRICT_SCRAPE", &strict)?;
        }

        if let Some(url) = get("IRI_API_URL") {
            cfg.node.url = url;
        }
        if let Some(version) = get("IRI_API_VERSION") {
            cfg.node.api_version = version;
        }
        if let Some(command) = get("TANGLE_INFO_COMMAND") {
            cfg.node.tangle_command = command;
        }

        if let Some(url) = get("MARKET_API_URL") {
            cfg.market.base_url = url;
        }
        if let Some(pairs) = get("MARKET_PAIRS") {
            cfg.market.pairs = pairs
                .split(',')
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect();
        }

        if let Some(secs) = get("HTTP_TIMEOUT_SECS") {
            let timeout = Duration::from_secs(parse::<u64>("HTTP_TIMEOUT_SECS", &secs)?);
            cfg.node.timeout = timeout;
            cfg.market.timeout = timeout;
        }

        if let Some(endpoint) = get("ZMQ_URL") {
            let mut feed = FeedConfig::new(endpoint);
            if let Some(secs) = get("ZMQ_RECONNECT_SECS") {
                feed.reconnect_interval =
                    Duration::from_secs(parse::<u64>("ZMQ_RECONNECT_SECS", &secs)?);
            }
            if let Some(secs) = get("ZMQ_IDLE_SECS") {
                feed.idle_timeout = Duration::from_secs(parse::<u64>("ZMQ_IDLE_SECS", &secs)?);
            }
            cfg.feed = Some(feed);
        }

        if let Some(path) = get("LATENCY_DB_PATH") {
            cfg.storage.path = path;
        }

        Ok(cfg)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
