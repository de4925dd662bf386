//! Process-wide event counters shared between the feed and the exporter.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::feed::ResourceStats;

/// Running totals derived from the event feed.
///
/// Only the aggregator writes; the exporter reads through [`snapshot`].
/// Counters start at zero and are never reset.
///
/// [`snapshot`]: AggregateState::snapshot
#[derive(Debug, Default)]
pub struct AggregateState {
    seen: AtomicU64,
    with_value: AtomicU64,
    confirmed: AtomicU64,
    resource_stats: RwLock<Option<ResourceStats>>,
}

/// Point-in-time copy of [`AggregateState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub seen: u64,
    pub with_value: u64,
    pub confirmed: u64,
    /// `None` until the first `rstat` line arrives.
    pub resource_stats: Option<ResourceStats>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_seen(&self, has_value: bool) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        if has_value {
            self.with_value.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// Replaces the queue snapshot wholesale.
    pub fn replace_resource_stats(&self, stats: ResourceStats) {
        let mut guard = self
            .resource_stats
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(stats);
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let resource_stats = *self
            .resource_stats
            .read()
            .unwrap_or_else(|e| e.into_inner());
        AggregateSnapshot {
            seen: self.seen.load(Ordering::Relaxed),
            with_value: self.with_value.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            resource_stats,
        }
    }
}
