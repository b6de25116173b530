//! Presence channel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Realtime topic every client joins.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Activity published on subscribe and assumed for payloads without one.
    #[serde(default = "default_activity")]
    pub default_activity: String,
    /// Interval for re-publishing the current activity (0 disables).
    #[serde(default)]
    pub refresh_interval_seconds: u64,
    /// Collapse the online list to one record per user.
    #[serde(default)]
    pub dedup_by_user: bool,
    /// How long the simulation waits for every user to show up.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,
}

impl PresenceConfig {
    /// Liveness refresh interval, `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_seconds > 0)
            .then(|| Duration::from_secs(self.refresh_interval_seconds))
    }

    /// Settle timeout as a [`Duration`].
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            default_activity: default_activity(),
            refresh_interval_seconds: 0,
            dedup_by_user: false,
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

fn default_topic() -> String {
    "online-users".to_string()
}

fn default_activity() -> String {
    "browsing".to_string()
}

fn default_settle_timeout() -> u64 {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_disabled_by_default() {
        assert_eq!(PresenceConfig::default().refresh_interval(), None);
    }

    #[test]
    fn test_refresh_interval() {
        let config = PresenceConfig {
            refresh_interval_seconds: 30,
            ..PresenceConfig::default()
        };
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(30)));
    }
}
