//! Seen/confirmed correlation against the latency store.
//!
//! Updates are applied strictly in feed order by one worker, each as a
//! read-modify-write of the whole [`LatencyRecord`]. Because there is a
//! single writer, two events for the same id can never lose each other's
//! fields.

use std::sync::Arc;

use prometheus::Histogram;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::storage::{LatencyRecord, LatencyStore, StorageError};

/// One pending write to the latency store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LatencyUpdate {
    Seen { id: String, at_ms: u64 },
    Confirmed { id: String, at_ms: u64 },
}

impl LatencyUpdate {
    pub fn id(&self) -> &str {
        match self {
            LatencyUpdate::Seen { id, .. } | LatencyUpdate::Confirmed { id, .. } => id,
        }
    }
}

/// Applies [`LatencyUpdate`]s and feeds the confirmation histogram.
#[derive(Clone)]
pub struct LatencyRecorder {
    store: Arc<dyn LatencyStore>,
    histogram: Histogram,
}

impl LatencyRecorder {
    pub fn new(store: Arc<dyn LatencyStore>, histogram: Histogram) -> Self {
        Self { store, histogram }
    }

    /// Applies one update, returning the latency observed in seconds, if any.
    pub fn apply(&self, update: &LatencyUpdate) -> Result<Option<f64>, StorageError> {
        match update {
            LatencyUpdate::Seen { id, at_ms } => {
                let merged = match self.store.get(id)? {
                    None => LatencyRecord::seen(*at_ms),
                    Some(rec) if rec.seen_date.is_none() => LatencyRecord {
                        seen_date: Some(*at_ms),
                        ..rec
                    },
                    // Replayed tx: the first sighting wins.
                    Some(_) => return Ok(None),
                };
                self.store.put(id, &merged)?;
                Ok(None)
            }
            LatencyUpdate::Confirmed { id, at_ms } => {
                let (merged, latency) = match self.store.get(id)? {
                    None => (LatencyRecord::confirmed(*at_ms), None),
                    Some(rec) if rec.confirmed_date.is_some() => return Ok(None),
                    Some(rec) => {
                        let latency = rec
                            .seen_date
                            .map(|seen| at_ms.saturating_sub(seen) as f64 / 1_000.0);
                        let merged = LatencyRecord {
                            confirmed_date: Some(*at_ms),
                            ..rec
                        };
                        (merged, latency)
                    }
                };
                self.store.put(id, &merged)?;
                if let Some(secs) = latency {
                    self.histogram.observe(secs);
                }
                Ok(latency)
            }
        }
    }
}

/// Spawns the worker that drains `updates` in order until every sender is
/// dropped.
///
/// Store calls are synchronous, so the loop runs on the blocking pool.
/// Failures are logged per update and never stop the loop.
pub fn spawn_latency_worker(
    recorder: LatencyRecorder,
    mut updates: UnboundedReceiver<LatencyUpdate>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(update) = updates.blocking_recv() {
            match recorder.apply(&update) {
                Ok(Some(secs)) => {
                    tracing::debug!(id = update.id(), latency_secs = secs, "confirmation latency");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = update.id(), "failed to persist latency record: {e}");
                }
            }
        }
        tracing::debug!("latency worker stopped");
    })
}
