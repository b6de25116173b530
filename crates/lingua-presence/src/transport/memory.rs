//! In-memory presence transport for single-process deployments and tests.
//!
//! [`MemoryPresenceHub`] plays the hosted realtime service: it keeps the
//! per-topic presence state, assigns connection keys and fans out status,
//! `sync`, `join` and `leave` events to every subscribed channel instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use lingua_core::types::ConnectionKey;
use lingua_core::{AppError, AppResult};

use crate::channel::types::{ChannelEvent, ChannelEvents, ChannelStatus, PresenceSnapshot};
use crate::channel::{RealtimeChannel, RealtimeClient};

/// Presence state of one topic.
#[derive(Debug, Default)]
struct TopicState {
    /// Connection key → event sender of every joined instance.
    subscribers: HashMap<String, mpsc::UnboundedSender<ChannelEvent>>,
    /// Connection key → payloads tracked under that key.
    presences: BTreeMap<String, Vec<Value>>,
}

impl TopicState {
    /// Sends `event` to every subscriber, dropping the ones that went away.
    fn broadcast(&mut self, event: ChannelEvent) {
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Debug)]
struct HubInner {
    /// Topic name → state.
    topics: DashMap<String, TopicState>,
    /// Channel instances ever created.
    channels_created: AtomicU64,
    /// Status handed to the next subscribers.
    subscribe_outcome: AtomicU8,
    /// Whether `track` currently fails.
    track_failure: AtomicBool,
}

/// In-memory realtime service. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryPresenceHub {
    inner: Arc<HubInner>,
}

impl MemoryPresenceHub {
    /// Creates an empty hub that accepts every subscription.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                topics: DashMap::new(),
                channels_created: AtomicU64::new(0),
                subscribe_outcome: AtomicU8::new(ChannelStatus::Subscribed.as_code()),
                track_failure: AtomicBool::new(false),
            }),
        }
    }

    /// Number of channel instances created so far.
    pub fn channels_created(&self) -> u64 {
        self.inner.channels_created.load(Ordering::SeqCst)
    }

    /// Sets the status later subscriptions receive.
    pub fn set_subscribe_outcome(&self, status: ChannelStatus) {
        self.inner
            .subscribe_outcome
            .store(status.as_code(), Ordering::SeqCst);
    }

    /// Makes every `track` fail while `fail` is true.
    pub fn set_track_failure(&self, fail: bool) {
        self.inner.track_failure.store(fail, Ordering::SeqCst);
    }

    /// Current presence state of a topic.
    pub fn presence_state_of(&self, topic: &str) -> PresenceSnapshot {
        self.inner.presence_state_of(topic)
    }

    /// Number of joined instances on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(topic)
            .map(|t| t.subscribers.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryPresenceHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubInner {
    fn presence_state_of(&self, topic: &str) -> PresenceSnapshot {
        self.topics
            .get(topic)
            .map(|t| t.presences.clone())
            .unwrap_or_default()
    }

    fn join(&self, topic: &str, key: &str, tx: mpsc::UnboundedSender<ChannelEvent>) {
        let mut state = self.topics.entry(topic.to_string()).or_default();
        state.subscribers.insert(key.to_string(), tx.clone());
        // A new subscriber gets the current state straight away.
        let _ = tx.send(ChannelEvent::Sync);
    }

    fn track(&self, topic: &str, key: &str, payload: Value) -> AppResult<()> {
        let mut state = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| AppError::session(format!("Topic '{topic}' has no subscribers")))?;

        let first = state
            .presences
            .insert(key.to_string(), vec![payload])
            .is_none();
        if first {
            state.broadcast(ChannelEvent::Join {
                key: key.to_string(),
            });
        }
        state.broadcast(ChannelEvent::Sync);
        Ok(())
    }

    fn leave(&self, topic: &str, key: &str) {
        let Some(mut state) = self.topics.get_mut(topic) else {
            return;
        };
        state.subscribers.remove(key);
        if state.presences.remove(key).is_some() {
            state.broadcast(ChannelEvent::Leave {
                key: key.to_string(),
            });
            state.broadcast(ChannelEvent::Sync);
        }
        let empty = state.subscribers.is_empty() && state.presences.is_empty();
        drop(state);
        if empty {
            self.topics
                .remove_if(topic, |_, t| t.subscribers.is_empty() && t.presences.is_empty());
        }
    }
}

impl RealtimeClient for MemoryPresenceHub {
    fn channel(&self, topic: &str) -> Arc<dyn RealtimeChannel> {
        self.inner.channels_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(MemoryChannel {
            topic: topic.to_string(),
            key: ConnectionKey::new().to_string(),
            hub: self.inner.clone(),
            subscribed: AtomicBool::new(false),
            joined: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }
}

/// One channel instance handed out by [`MemoryPresenceHub`].
#[derive(Debug)]
pub struct MemoryChannel {
    topic: String,
    key: String,
    hub: Arc<HubInner>,
    /// `subscribe` has been called.
    subscribed: AtomicBool,
    /// The instance is a member of its topic.
    joined: AtomicBool,
    /// `unsubscribe` has been called.
    closed: AtomicBool,
}

#[async_trait]
impl RealtimeChannel for MemoryChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscribe(&self) -> AppResult<ChannelEvents> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::session("Channel is closed"));
        }
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(AppError::session("Channel is already subscribed"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let outcome = ChannelStatus::from_code(self.hub.subscribe_outcome.load(Ordering::SeqCst));
        let _ = tx.send(ChannelEvent::Status(outcome));

        if outcome == ChannelStatus::Subscribed {
            self.joined.store(true, Ordering::SeqCst);
            self.hub.join(&self.topic, &self.key, tx);
        }
        Ok(rx)
    }

    async fn track(&self, payload: Value) -> AppResult<()> {
        if self.hub.track_failure.load(Ordering::SeqCst) {
            return Err(AppError::external_service("Presence publish rejected"));
        }
        if !self.joined.load(Ordering::SeqCst) {
            return Err(AppError::session("Channel is not subscribed"));
        }
        self.hub.track(&self.topic, &self.key, payload)
    }

    async fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.joined.swap(false, Ordering::SeqCst) {
            self.hub.leave(&self.topic, &self.key);
        }
    }

    fn presence_state(&self) -> PresenceSnapshot {
        self.hub.presence_state_of(&self.topic)
    }
}
