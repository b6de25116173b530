//! Realtime transport implementations.

pub mod memory;

pub use memory::{MemoryChannel, MemoryPresenceHub};
