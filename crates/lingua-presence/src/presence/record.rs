//! Presence payload and record definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The signed-in user a controller publishes presence for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identity, shared by all of the user's devices.
    pub user_id: String,
    /// Contact email.
    pub email: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

impl Identity {
    /// Creates an identity without a display name.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            display_name: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Wire payload published by `track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    /// User ID
    pub user_id: String,
    /// Email
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// RFC 3339 publish time
    pub online_at: String,
    /// Current activity label
    pub activity: String,
}

impl PresencePayload {
    /// Builds the payload for an identity.
    pub fn new(identity: &Identity, activity: &str, online_at: String) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            online_at,
            activity: activity.to_string(),
        }
    }
}

/// One online client instance as shown to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// User ID
    pub user_id: String,
    /// Display name, `None` when the client did not publish one
    pub display_name: Option<String>,
    /// Email
    pub email: String,
    /// When the record was last published
    pub online_at: String,
    /// Current activity label
    pub activity: String,
}

impl PresenceRecord {
    /// Reads a record out of a raw payload blob.
    ///
    /// Never fails: missing or mistyped string fields become empty strings,
    /// a missing activity becomes `default_activity` and a missing display
    /// name stays `None`. Both snake_case and camelCase keys are accepted.
    pub fn from_blob(blob: &Value, default_activity: &str) -> Self {
        Self {
            user_id: string_field(blob, &["user_id", "userId"]).unwrap_or_default(),
            display_name: string_field(blob, &["display_name", "displayName"]),
            email: string_field(blob, &["email"]).unwrap_or_default(),
            online_at: string_field(blob, &["online_at", "onlineAt"]).unwrap_or_default(),
            activity: string_field(blob, &["activity"])
                .unwrap_or_else(|| default_activity.to_string()),
        }
    }
}

fn string_field(blob: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| blob.get(*name).and_then(Value::as_str))
        .map(str::to_owned)
}
