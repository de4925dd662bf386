//! Durable storage for per-transaction latency records.
//!
//! The aggregator persists the time a transaction was first seen on the
//! feed so that a confirmation arriving later, possibly after a restart,
//! can still produce a latency sample. This module provides:
//!
//! - the [`LatencyStore`] abstraction,
//! - an in-memory store ([`mem::InMemoryLatencyStore`]) for tests,
//! - a RocksDB-backed store ([`rocksdb::RocksDbLatencyStore`]) for
//!   long-running deployments.

pub mod mem;
pub mod rocksdb;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mem::InMemoryLatencyStore;
pub use self::rocksdb::{RocksDbConfig, RocksDbLatencyStore};

/// Timestamps observed for one transaction, in milliseconds since epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_date: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_date: Option<u64>,
}

impl LatencyRecord {
    pub fn seen(at_ms: u64) -> Self {
        Self {
            seen_date: Some(at_ms),
            confirmed_date: None,
        }
    }

    pub fn confirmed(at_ms: u64) -> Self {
        Self {
            seen_date: None,
            confirmed_date: Some(at_ms),
        }
    }

    /// `true` once both halves have been recorded.
    pub fn is_complete(&self) -> bool {
        self.seen_date.is_some() && self.confirmed_date.is_some()
    }
}

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("rocksdb: {0}")]
    RocksDb(#[from] ::rocksdb::Error),
    #[error("missing column family {0:?}")]
    MissingColumnFamily(&'static str),
    #[error("corrupt record for {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Key/value store mapping transaction ids to [`LatencyRecord`]s.
///
/// `put` replaces the whole value; callers merge fields before writing.
/// A missing key is `Ok(None)`, not an error.
pub trait LatencyStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<LatencyRecord>, StorageError>;

    fn put(&self, id: &str, record: &LatencyRecord) -> Result<(), StorageError>;
}
