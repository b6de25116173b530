//! Convenience result type alias for Lingua.

use crate::error::AppError;

/// A specialized `Result` type for Lingua operations.
pub type AppResult<T> = Result<T, AppError>;
