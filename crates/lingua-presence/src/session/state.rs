//! Presence session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of a presence controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No identity, no channel.
    #[default]
    Idle,
    /// A channel was opened and is waiting for its subscribe confirmation.
    Subscribing,
    /// Subscribed; this client's record is being published.
    Tracking,
    /// The last channel was torn down.
    Closed,
}

impl SessionState {
    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Tracking => "tracking",
            Self::Closed => "closed",
        }
    }

    /// Whether a channel instance is open in this state.
    pub fn has_channel(&self) -> bool {
        matches!(self, Self::Subscribing | Self::Tracking)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
