//! In-memory latency store.
//!
//! Useful for unit tests and for running the bridge without a data
//! directory. Records are lost on restart.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{LatencyRecord, LatencyStore, StorageError};

/// In-memory implementation of [`LatencyStore`].
#[derive(Default)]
pub struct InMemoryLatencyStore {
    records: RwLock<HashMap<String, LatencyRecord>>,
}

impl InMemoryLatencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LatencyStore for InMemoryLatencyStore {
    fn get(&self, id: &str) -> Result<Option<LatencyRecord>, StorageError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(id).copied())
    }

    fn put(&self, id: &str, record: &LatencyRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(id.to_string(), *record);
        Ok(())
    }
}
