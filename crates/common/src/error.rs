//! Error types for plaza.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Cache failures never appear here: they are absorbed at the cache boundary
/// (see [`crate::cache::CacheError`]). A `Database` error means the ground
/// truth could not be read or written and always reaches the caller.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Bad request: {0}")]
    BadRequest(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::ConcurrentModification(_)
                | Self::Config(_)
                | Self::Internal(_)
        )
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_race_errors_are_server_errors() {
        assert!(AppError::Database("connection reset".to_string()).is_server_error());
        assert!(AppError::ConcurrentModification("toggle".to_string()).is_server_error());
    }

    #[test]
    fn test_caller_errors_are_not_server_errors() {
        let err = AppError::BadRequest("Cannot follow yourself".to_string());
        assert!(!err.is_server_error());
        assert_eq!(err.error_code(), "BAD_REQUEST");
        assert_eq!(err.to_string(), "Bad request: Cannot follow yourself");
    }
}
