//! Event aggregation for the ZMQ feed.
//!
//! [`EventAggregator`] is the single ingestion entry point: it classifies
//! each raw line, bumps the shared counters synchronously and queues the
//! latency bookkeeping for the background worker in [`latency`].

pub mod latency;
pub mod state;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::feed::FeedEvent;

pub use latency::{LatencyRecorder, LatencyUpdate, spawn_latency_worker};
pub use state::{AggregateSnapshot, AggregateState};

/// Turns feed lines into counter updates and queued latency writes.
#[derive(Clone)]
pub struct EventAggregator {
    state: Arc<AggregateState>,
    latency_tx: UnboundedSender<LatencyUpdate>,
}

impl EventAggregator {
    /// Creates an aggregator and the receiving end of its latency queue.
    ///
    /// Hand the receiver to [`spawn_latency_worker`].
    pub fn new(state: Arc<AggregateState>) -> (Self, UnboundedReceiver<LatencyUpdate>) {
        let (latency_tx, latency_rx) = mpsc::unbounded_channel();
        (Self { state, latency_tx }, latency_rx)
    }

    pub fn state(&self) -> &Arc<AggregateState> {
        &self.state
    }

    /// Ingests one line stamped with the current wall-clock time.
    pub fn ingest(&self, line: &str) -> Option<FeedEvent> {
        self.ingest_at(line, current_unix_millis())
    }

    /// Ingests one line observed at `now_ms`.
    ///
    /// Returns the classified event, or `None` if the line was ignored.
    pub fn ingest_at(&self, line: &str, now_ms: u64) -> Option<FeedEvent> {
        let event = FeedEvent::parse(line)?;

        match &event {
            FeedEvent::NewTransaction { id, has_value } => {
                self.state.record_seen(*has_value);
                self.enqueue(LatencyUpdate::Seen {
                    id: id.clone(),
                    at_ms: now_ms,
                });
            }
            FeedEvent::ResourceStats(stats) => {
                self.state.replace_resource_stats(*stats);
            }
            FeedEvent::Confirmed { id } => {
                self.state.record_confirmed();
                self.enqueue(LatencyUpdate::Confirmed {
                    id: id.clone(),
                    at_ms: now_ms,
                });
            }
        }

        Some(event)
    }

    fn enqueue(&self, update: LatencyUpdate) {
        if let Err(e) = self.latency_tx.send(update) {
            tracing::warn!(id = e.0.id(), "latency worker is gone, dropping update");
        }
    }
}

/// Returns the current wall-clock time as milliseconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn current_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}
