//! Error types module
//!
//! All pipeline errors are unified under the `AppError` enum, which covers
//! the database index, filesystem storage, media processing, and transition
//! conflicts. `Conflict` is the benign variant: it reports that a state
//! transition's precondition no longer holds (typically a double-submitted
//! promotion) and is always safe to treat as "nothing to do".
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the
//! `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like missing resources
    Debug,
    /// Warning level - for recoverable or client-correctable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unsupported or corrupt media: {0}")]
    UnsupportedMedia(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage move failed: {0}")]
    StorageMove(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata per variant: (error_code, retryable, log_level).
/// The retryable flag means "the same call may succeed later without the
/// caller changing anything"; `Conflict` is retryable in the idempotent
/// sense that repeating the call converges on the same outcome.
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => ("DATABASE_ERROR", true, LogLevel::Error),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::Conflict(_) => ("CONFLICT", true, LogLevel::Debug),
        AppError::UnsupportedMedia(_) => ("UNSUPPORTED_MEDIA", false, LogLevel::Warn),
        AppError::StorageWrite(_) => ("STORAGE_WRITE_FAILED", true, LogLevel::Error),
        AppError::StorageMove(_) => ("STORAGE_MOVE_FAILED", true, LogLevel::Error),
        AppError::PayloadTooLarge(_) => ("PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::Unauthorized(_) => ("UNAUTHORIZED", false, LogLevel::Debug),
        AppError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Machine-readable error code (e.g. "STORAGE_MOVE_FAILED")
    pub fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    /// Whether retrying the same call can succeed without caller changes
    pub fn is_retryable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    /// Log level this error should be reported at
    pub fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }

    /// True for the benign "transition already happened" outcome
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_conflict() {
        let err = AppError::Conflict("asset already promoted".to_string());
        assert_eq!(err.error_code(), "CONFLICT");
        assert!(err.is_retryable());
        assert!(err.is_conflict());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_unsupported_media() {
        let err = AppError::UnsupportedMedia("not an image".to_string());
        assert_eq!(err.error_code(), "UNSUPPORTED_MEDIA");
        assert!(!err.is_retryable());
        assert!(!err.is_conflict());
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_storage_failures() {
        let write = AppError::StorageWrite("disk full".to_string());
        assert_eq!(write.error_code(), "STORAGE_WRITE_FAILED");
        assert!(write.is_retryable());
        assert_eq!(write.log_level(), LogLevel::Error);

        let mv = AppError::StorageMove("rename failed".to_string());
        assert_eq!(mv.error_code(), "STORAGE_MOVE_FAILED");
        assert!(mv.is_retryable());
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("media asset".to_string());
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_retryable());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_error_metadata_database() {
        let err = AppError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_retryable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_detailed_message_plain() {
        let err = AppError::InvalidInput("bad extension".to_string());
        assert!(err.detailed_message().contains("bad extension"));
    }
}
