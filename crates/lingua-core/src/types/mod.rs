//! Core type definitions used across the Lingua workspace.

pub mod id;

pub use id::*;
