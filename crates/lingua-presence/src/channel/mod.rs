//! Realtime channel contract and the presence adapter built on it.
//!
//! The core depends only on [`RealtimeClient`] and [`RealtimeChannel`]; any
//! transport that can deliver ordered status/sync/join/leave events and a
//! synchronous state snapshot can back it.

pub mod adapter;
pub mod types;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use lingua_core::AppResult;

use self::types::{ChannelEvents, PresenceSnapshot};

/// One publish/subscribe channel instance bound to a topic.
#[async_trait]
pub trait RealtimeChannel: Send + Sync + fmt::Debug {
    /// Topic this instance was created for.
    fn topic(&self) -> &str;

    /// Starts the subscription and hands back this instance's event stream.
    ///
    /// The subscribe outcome arrives on the stream as
    /// [`ChannelEvent::Status`](types::ChannelEvent::Status). Calling this a
    /// second time on the same instance is an error.
    fn subscribe(&self) -> AppResult<ChannelEvents>;

    /// Publishes this connection's presence payload.
    async fn track(&self, payload: serde_json::Value) -> AppResult<()>;

    /// Leaves the topic. Idempotent; cancels a subscribe still in flight.
    async fn unsubscribe(&self);

    /// Current presence state as seen by this subscriber.
    fn presence_state(&self) -> PresenceSnapshot;
}

/// Factory for channel instances.
pub trait RealtimeClient: Send + Sync {
    /// Creates a brand-new channel instance. Instances are never shared.
    fn channel(&self, topic: &str) -> Arc<dyn RealtimeChannel>;
}
