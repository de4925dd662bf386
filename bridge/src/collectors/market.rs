//! Market ticker collector.
//!
//! Each pair is fetched from `GET {base}/ticker/t{PAIR}`, which answers
//! with a flat array:
//!
//! ```text
//! [BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_PERC,
//!  LAST_PRICE, VOLUME, HIGH, LOW]
//! ```

use futures::future::join_all;
use serde_json::Value;

use super::{CollectorError, build_client};
use crate::config::MarketConfig;

const LAST_PRICE_INDEX: usize = 6;
const VOLUME_INDEX: usize = 7;

/// Latest trade figures for one pair.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketQuote {
    pub pair: String,
    pub price: f64,
    pub volume: f64,
}

/// Result of one market fan-out.
#[derive(Debug, Default)]
pub struct MarketSnapshot {
    /// Quotes for the pairs that succeeded, in configured order.
    pub quotes: Vec<MarketQuote>,
    /// Pairs that failed, with the reason.
    pub failures: Vec<(String, CollectorError)>,
}

/// Client for the ticker API.
#[derive(Clone)]
pub struct MarketClient {
    base_url: String,
    pairs: Vec<String>,
    client: reqwest::Client,
}

impl MarketClient {
    pub fn new(cfg: &MarketConfig) -> Result<Self, CollectorError> {
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            pairs: cfg.pairs.clone(),
            client: build_client(cfg.timeout)?,
        })
    }

    /// Fetches every configured pair concurrently.
    pub async fn snapshot(&self) -> MarketSnapshot {
        let results = join_all(self.pairs.iter().map(|pair| self.ticker(pair))).await;

        let mut snapshot = MarketSnapshot::default();
        for (pair, result) in self.pairs.iter().zip(results) {
            match result {
                Ok(quote) => snapshot.quotes.push(quote),
                Err(e) => snapshot.failures.push((pair.clone(), e)),
            }
        }
        snapshot
    }

    /// Fetches a single pair.
    pub async fn ticker(&self, pair: &str) -> Result<MarketQuote, CollectorError> {
        let url = format!("{}/ticker/t{}", self.base_url, pair);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CollectorError::Transport(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CollectorError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = resp
            .json::<Vec<Value>>()
            .await
            .map_err(|e| CollectorError::Protocol(format!("ticker {pair}: {e}")))?;

        parse_ticker(pair, &body)
    }
}

fn parse_ticker(pair: &str, fields: &[Value]) -> Result<MarketQuote, CollectorError> {
    let field = |index: usize, name: &str| {
        fields
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| CollectorError::Protocol(format!("ticker {pair}: missing {name}")))
    };

    Ok(MarketQuote {
        pair: pair.to_string(),
        price: field(LAST_PRICE_INDEX, "last price")?,
        volume: field(VOLUME_INDEX, "volume")?,
    })
}
