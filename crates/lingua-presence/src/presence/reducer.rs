//! Snapshot reducer — rebuilds the online-user list from a full presence state.
//!
//! The list is only ever replaced wholesale from the latest snapshot. Join
//! and leave notifications never patch it.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::DateTime;

use lingua_core::config::PresenceConfig;

use super::record::PresenceRecord;
use crate::channel::types::PresenceSnapshot;

/// How blobs are turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducerMode {
    /// One record per payload blob, across every connection key.
    #[default]
    PerConnection,
    /// One record per user, keeping the most recently published one.
    DedupByUser,
}

/// Holds the online-user list derived from the most recent snapshot.
#[derive(Debug, Clone)]
pub struct PresenceReducer {
    mode: ReducerMode,
    default_activity: String,
    online: Vec<PresenceRecord>,
}

impl PresenceReducer {
    /// Creates an empty reducer.
    pub fn new(mode: ReducerMode, default_activity: impl Into<String>) -> Self {
        Self {
            mode,
            default_activity: default_activity.into(),
            online: Vec::new(),
        }
    }

    /// Creates a reducer from presence settings.
    pub fn from_config(config: &PresenceConfig) -> Self {
        let mode = if config.dedup_by_user {
            ReducerMode::DedupByUser
        } else {
            ReducerMode::PerConnection
        };
        Self::new(mode, config.default_activity.clone())
    }

    /// Replaces the online list with the reduction of `snapshot`.
    pub fn apply_sync(&mut self, snapshot: &PresenceSnapshot) -> &[PresenceRecord] {
        let records = reduce(snapshot, &self.default_activity);
        self.online = match self.mode {
            ReducerMode::PerConnection => records,
            ReducerMode::DedupByUser => dedup_by_user(records),
        };
        &self.online
    }

    /// Current online list.
    pub fn online_users(&self) -> &[PresenceRecord] {
        &self.online
    }

    /// Discards the accumulated list.
    pub fn clear(&mut self) {
        self.online.clear();
    }

    /// Reduction mode in use.
    #[cfg(test)]
    pub(crate) fn mode(&self) -> ReducerMode {
        self.mode
    }
}

/// Flattens every blob of every key into a record, in key order.
pub fn reduce(snapshot: &PresenceSnapshot, default_activity: &str) -> Vec<PresenceRecord> {
    snapshot
        .values()
        .flatten()
        .map(|blob| PresenceRecord::from_blob(blob, default_activity))
        .collect()
}

/// Collapses records by user ID, keeping the latest `online_at` per user.
///
/// Output keeps the position at which each user first appeared. On a tie
/// the earlier record wins.
pub fn dedup_by_user(records: Vec<PresenceRecord>) -> Vec<PresenceRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<PresenceRecord> = Vec::new();

    for record in records {
        match index.get(&record.user_id) {
            Some(&pos) => {
                if compare_online_at(&record.online_at, &out[pos].online_at) == Ordering::Greater {
                    out[pos] = record;
                }
            }
            None => {
                index.insert(record.user_id.clone(), out.len());
                out.push(record);
            }
        }
    }

    out
}

fn compare_online_at(a: &str, b: &str) -> Ordering {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
