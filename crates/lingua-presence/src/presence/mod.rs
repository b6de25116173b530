//! Presence records and the snapshot reducer.

pub mod record;
pub mod reducer;

pub use record::{Identity, PresencePayload, PresenceRecord};
pub use reducer::{PresenceReducer, ReducerMode};
