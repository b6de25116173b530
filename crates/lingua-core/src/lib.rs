//! # lingua-core
//!
//! Core crate for the Lingua presence tracking core. Contains configuration
//! schemas, typed identifiers and the unified error system.
//!
//! This crate has **no** internal dependencies on other Lingua crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
