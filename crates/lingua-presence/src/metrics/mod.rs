//! Presence metrics counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by a controller and the channels it opens.
#[derive(Debug, Default)]
pub struct PresenceMetrics {
    /// Channel instances opened
    pub channels_opened: AtomicU64,
    /// Channel instances closed
    pub channels_closed: AtomicU64,
    /// Successful track calls
    pub tracks_published: AtomicU64,
    /// Failed track calls
    pub tracks_failed: AtomicU64,
    /// Sync events reduced
    pub syncs_received: AtomicU64,
    /// Join notifications seen
    pub joins_received: AtomicU64,
    /// Leave notifications seen
    pub leaves_received: AtomicU64,
}

impl PresenceMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            channels_opened: self.channels_opened.load(Ordering::Relaxed),
            channels_closed: self.channels_closed.load(Ordering::Relaxed),
            tracks_published: self.tracks_published.load(Ordering::Relaxed),
            tracks_failed: self.tracks_failed.load(Ordering::Relaxed),
            syncs_received: self.syncs_received.load(Ordering::Relaxed),
            joins_received: self.joins_received.load(Ordering::Relaxed),
            leaves_received: self.leaves_received.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Channel instances opened
    pub channels_opened: u64,
    /// Channel instances closed
    pub channels_closed: u64,
    /// Successful track calls
    pub tracks_published: u64,
    /// Failed track calls
    pub tracks_failed: u64,
    /// Sync events reduced
    pub syncs_received: u64,
    /// Join notifications seen
    pub joins_received: u64,
    /// Leave notifications seen
    pub leaves_received: u64,
}
