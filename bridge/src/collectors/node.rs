//! IRI node API collectors.
//!
//! The node exposes a single JSON endpoint that dispatches on a
//! `command` field:
//!
//! ```json
//! POST /
//! X-IOTA-API-Version: 1
//! { "command": "getNodeInfo" }
//! ```

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{CollectorError, build_client};
use crate::config::NodeApiConfig;

/// Subset of `getNodeInfo` the bridge exports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeSnapshot {
    pub pending_transactions: i64,
    pub tips: i64,
    pub neighbor_count: i64,
    pub latest_milestone_index: i64,
    pub latest_solid_subtangle_milestone_index: i64,
}

/// Per-peer counters from `getNeighbors`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborSnapshot {
    pub address: String,
    pub new_transactions: i64,
    pub invalid_transactions: i64,
    pub all_transactions: i64,
    pub random_transaction_requests: i64,
}

impl NeighborSnapshot {
    /// A neighbor is active when its four counters sum to nonzero.
    ///
    /// Summed as `i128` so arbitrary upstream values cannot overflow.
    pub fn is_active(&self) -> bool {
        [
            self.new_transactions,
            self.invalid_transactions,
            self.all_transactions,
            self.random_transaction_requests,
        ]
        .iter()
        .map(|&c| i128::from(c))
        .sum::<i128>()
            != 0
    }
}

/// Whole-tangle totals. A field that is not numeric upstream is `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TangleSnapshot {
    pub total_transactions: Option<i64>,
    pub confirmed_transactions: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInfoResponse {
    transactions_to_request: i64,
    tips: i64,
    neighbors: i64,
    latest_milestone_index: i64,
    latest_solid_subtangle_milestone_index: i64,
}

#[derive(Debug, Deserialize)]
struct NeighborsResponse {
    neighbors: Vec<NeighborEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborEntry {
    address: String,
    #[serde(default)]
    number_of_new_transactions: i64,
    #[serde(default)]
    number_of_invalid_transactions: i64,
    #[serde(default)]
    number_of_all_transactions: i64,
    #[serde(default)]
    number_of_random_transaction_requests: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TangleInfoResponse {
    total_tx: Option<Value>,
    confirmed_tx: Option<Value>,
}

/// Client for the node's command API.
#[derive(Clone)]
pub struct NodeApiClient {
    url: String,
    api_version: String,
    tangle_command: String,
    client: reqwest::Client,
}

impl NodeApiClient {
    pub fn new(cfg: &NodeApiConfig) -> Result<Self, CollectorError> {
        Ok(Self {
            url: cfg.url.clone(),
            api_version: cfg.api_version.clone(),
            tangle_command: cfg.tangle_command.clone(),
            client: build_client(cfg.timeout)?,
        })
    }

    async fn command<T: DeserializeOwned>(&self, command: &str) -> Result<T, CollectorError> {
        let resp = self
            .client
            .post(&self.url)
            .header("X-IOTA-API-Version", &self.api_version)
            .json(&json!({ "command": command }))
            .send()
            .await
            .map_err(|e| CollectorError::Transport(format!("{command} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CollectorError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| CollectorError::Protocol(format!("{command}: {e}")))
    }

    pub async fn node_info(&self) -> Result<NodeSnapshot, CollectorError> {
        let info: NodeInfoResponse = self.command("getNodeInfo").await?;
        Ok(NodeSnapshot {
            pending_transactions: info.transactions_to_request,
            tips: info.tips,
            neighbor_count: info.neighbors,
            latest_milestone_index: info.latest_milestone_index,
            latest_solid_subtangle_milestone_index: info.latest_solid_subtangle_milestone_index,
        })
    }

    pub async fn neighbors(&self) -> Result<Vec<NeighborSnapshot>, CollectorError> {
        let resp: NeighborsResponse = self.command("getNeighbors").await?;
        Ok(resp
            .neighbors
            .into_iter()
            .map(|n| NeighborSnapshot {
                address: n.address,
                new_transactions: n.number_of_new_transactions,
                invalid_transactions: n.number_of_invalid_transactions,
                all_transactions: n.number_of_all_transactions,
                random_transaction_requests: n.number_of_random_transaction_requests,
            })
            .collect())
    }

    pub async fn tangle_info(&self) -> Result<TangleSnapshot, CollectorError> {
        let resp: TangleInfoResponse = self.command(&self.tangle_command).await?;
        Ok(TangleSnapshot {
            total_transactions: resp.total_tx.as_ref().and_then(numeric),
            confirmed_transactions: resp.confirmed_tx.as_ref().and_then(numeric),
        })
    }
}

/// Accepts JSON numbers and numeric strings.
fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
