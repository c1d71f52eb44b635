//! Convenience result type alias for corekit.

use crate::error::AppError;

/// A specialized `Result` type for corekit operations.
pub type AppResult<T> = Result<T, AppError>;
