//! # lingua-presence
//!
//! Presence tracking core for the Lingua translation client. Provides:
//!
//! - A minimal realtime channel contract ([`RealtimeClient`], [`RealtimeChannel`])
//! - The presence channel adapter that publishes this client's record
//! - A snapshot reducer that rebuilds the online-user list from each `sync`
//! - The session controller tying the channel lifecycle to the signed-in identity
//! - An in-memory transport for single-process use and tests

pub mod channel;
pub mod metrics;
pub mod presence;
pub mod session;
pub mod transport;

pub use channel::adapter::PresenceChannel;
pub use channel::types::{ChannelEvent, ChannelEvents, ChannelStatus, PresenceSnapshot};
pub use channel::{RealtimeChannel, RealtimeClient};
pub use metrics::{MetricsSnapshot, PresenceMetrics};
pub use presence::record::{Identity, PresencePayload, PresenceRecord};
pub use presence::reducer::{PresenceReducer, ReducerMode};
pub use session::controller::{PresenceController, PresenceView};
pub use session::state::SessionState;
pub use transport::memory::MemoryPresenceHub;
