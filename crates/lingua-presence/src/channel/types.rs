//! Channel event and status definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Connection key → payload blobs published under that key.
///
/// Keys are opaque to consumers. Ordered so that a single snapshot always
/// reduces to the same record order.
pub type PresenceSnapshot = BTreeMap<String, Vec<serde_json::Value>>;

/// Ordered event stream of one channel instance.
pub type ChannelEvents = mpsc::UnboundedReceiver<ChannelEvent>;

/// Subscribe outcome reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    /// The channel joined its topic; tracking may begin.
    Subscribed,
    /// The join did not complete in time.
    TimedOut,
    /// The channel was closed by the transport.
    Closed,
    /// The transport rejected the join.
    ChannelError,
}

impl ChannelStatus {
    /// Converts to the transport's wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscribed => "SUBSCRIBED",
            Self::TimedOut => "TIMED_OUT",
            Self::Closed => "CLOSED",
            Self::ChannelError => "CHANNEL_ERROR",
        }
    }

    pub(crate) fn as_code(self) -> u8 {
        match self {
            Self::Subscribed => 0,
            Self::TimedOut => 1,
            Self::Closed => 2,
            Self::ChannelError => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Subscribed,
            1 => Self::TimedOut,
            2 => Self::Closed,
            _ => Self::ChannelError,
        }
    }
}

/// Event delivered by a channel instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Subscribe status changed.
    Status(ChannelStatus),
    /// The full presence state is available or changed; read it with
    /// [`RealtimeChannel::presence_state`](super::RealtimeChannel::presence_state).
    Sync,
    /// A connection key appeared.
    Join {
        /// Key that joined.
        key: String,
    },
    /// A connection key disappeared.
    Leave {
        /// Key that left.
        key: String,
    },
}
