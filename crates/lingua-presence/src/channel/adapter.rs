//! Presence channel adapter owning one channel instance per session.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};

use lingua_core::AppResult;

use super::types::{ChannelEvents, PresenceSnapshot};
use super::{RealtimeChannel, RealtimeClient};
use crate::metrics::PresenceMetrics;
use crate::presence::record::{Identity, PresencePayload};

/// Wraps a single [`RealtimeChannel`] and publishes this client's presence.
///
/// `online_at` strictly increases across every track made through one
/// adapter, even when the wall clock stalls or steps back.
#[derive(Debug)]
pub struct PresenceChannel {
    channel: Arc<dyn RealtimeChannel>,
    metrics: Arc<PresenceMetrics>,
    last_online_at: Option<DateTime<Utc>>,
    closed: bool,
}

impl PresenceChannel {
    /// Opens a fresh channel instance for `topic`.
    pub fn open(client: &dyn RealtimeClient, topic: &str, metrics: Arc<PresenceMetrics>) -> Self {
        let channel = client.channel(topic);
        PresenceMetrics::inc(&metrics.channels_opened);
        tracing::debug!(topic, "Opened presence channel");
        Self {
            channel,
            metrics,
            last_online_at: None,
            closed: false,
        }
    }

    /// Topic of the underlying channel.
    pub fn topic(&self) -> &str {
        self.channel.topic()
    }

    /// Subscribes and returns the channel's event stream.
    pub fn subscribe(&self) -> AppResult<ChannelEvents> {
        self.channel.subscribe()
    }

    /// Publishes `identity` with `activity`, stamped with a fresh `online_at`.
    pub async fn track(&mut self, identity: &Identity, activity: &str) -> AppResult<PresencePayload> {
        let online_at = self.next_online_at(Utc::now());
        let payload = PresencePayload::new(
            identity,
            activity,
            online_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        match self.channel.track(serde_json::to_value(&payload)?).await {
            Ok(()) => {
                PresenceMetrics::inc(&self.metrics.tracks_published);
                tracing::debug!(
                    topic = self.topic(),
                    user_id = %payload.user_id,
                    activity = %payload.activity,
                    "Tracked presence"
                );
                Ok(payload)
            }
            Err(e) => {
                PresenceMetrics::inc(&self.metrics.tracks_failed);
                Err(e)
            }
        }
    }

    /// Current presence state of the channel.
    pub fn snapshot(&self) -> PresenceSnapshot {
        self.channel.presence_state()
    }

    /// Unsubscribes. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.channel.unsubscribe().await;
        PresenceMetrics::inc(&self.metrics.channels_closed);
        tracing::debug!(topic = self.topic(), "Closed presence channel");
    }

    fn next_online_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(3);
        let next = match self.last_online_at {
            Some(prev) if now <= prev => prev + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_online_at = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::types::{ChannelEvent, ChannelStatus};
    use crate::transport::memory::MemoryPresenceHub;

    fn open(hub: &MemoryPresenceHub) -> (PresenceChannel, Arc<PresenceMetrics>) {
        let metrics = Arc::new(PresenceMetrics::new());
        (PresenceChannel::open(hub, "online-users", metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn test_online_at_is_monotonic_when_clock_stalls() {
        let hub = MemoryPresenceHub::new();
        let (mut channel, _) = open(&hub);

        let t = Utc::now();
        let a = channel.next_online_at(t);
        let b = channel.next_online_at(t);
        let c = channel.next_online_at(t - TimeDelta::seconds(5));
        assert!(a < b);
        assert!(b < c);
        assert_eq!(c - b, TimeDelta::milliseconds(1));
    }

    #[tokio::test]
    async fn test_track_requires_subscription() {
        let hub = MemoryPresenceHub::new();
        let (mut channel, metrics) = open(&hub);
        let identity = Identity::new("u1", "u1@example.com");

        assert!(channel.track(&identity, "browsing").await.is_err());
        assert_eq!(metrics.snapshot().tracks_failed, 1);
    }

    #[tokio::test]
    async fn test_retrack_replaces_payload() {
        let hub = MemoryPresenceHub::new();
        let (mut channel, metrics) = open(&hub);
        let identity = Identity::new("u1", "u1@example.com");

        let mut events = channel.subscribe().expect("subscribe");
        assert_eq!(
            events.recv().await,
            Some(ChannelEvent::Status(ChannelStatus::Subscribed))
        );

        let first = channel.track(&identity, "browsing").await.expect("track");
        let second = channel.track(&identity, "translating").await.expect("track");
        assert!(second.online_at > first.online_at);

        let snapshot = channel.snapshot();
        assert_eq!(snapshot.len(), 1);
        let blobs = snapshot.values().next().expect("one key");
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0]["activity"], "translating");
        assert_eq!(metrics.snapshot().tracks_published, 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let hub = MemoryPresenceHub::new();
        let (mut channel, metrics) = open(&hub);
        let _events = channel.subscribe().expect("subscribe");

        channel.close().await;
        channel.close().await;
        assert!(channel.closed);
        assert_eq!(metrics.snapshot().channels_closed, 1);
        assert_eq!(hub.subscriber_count("online-users"), 0);
    }
}
