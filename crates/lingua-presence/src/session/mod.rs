//! Presence session lifecycle.

pub mod controller;
pub mod refresh;
pub mod state;

pub use controller::{PresenceController, PresenceView};
pub use state::SessionState;
