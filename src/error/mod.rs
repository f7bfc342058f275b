//! Error types and handling for the StudyHub monitoring core
//!
//! Errors carry a category so callers at the edge (HTTP handlers, the CLI)
//! can map them onto a response class without matching every variant.

use thiserror::Error;

/// Result type alias for monitoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories used for logging and response mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or missing caller input
    Input,
    /// Caller is not allowed to perform the action
    Authorization,
    /// Referenced entity does not exist
    NotFound,
    /// A collaborator (storage, notification transport) is unavailable
    Dependency,
    /// Configuration and setup errors
    Configuration,
    /// Internal system errors
    Internal,
}

impl ErrorCategory {
    /// HTTP-equivalent status code for this category
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input => 400,
            Self::Authorization => 403,
            Self::NotFound => 404,
            Self::Dependency => 503,
            Self::Configuration | Self::Internal => 500,
        }
    }
}

/// Monitoring core error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing key: {0}")]
    MissingKey(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Table not migrated: {0}")]
    TableMissing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Category used for logging and response mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) | Self::MissingKey(_) | Self::RateLimitExceeded(_) => {
                ErrorCategory::Input
            }
            Self::Forbidden(_) => ErrorCategory::Authorization,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::TableMissing(_)
            | Self::Database(_)
            | Self::Notification(_)
            | Self::Timeout(_) => ErrorCategory::Dependency,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Io(_) | Self::Serialization(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether this error means the backing table has not been created yet
    pub fn is_table_missing(&self) -> bool {
        matches!(self, Self::TableMissing(_))
    }

    /// Short machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::MissingKey(_) => "missing_key",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::TableMissing(_) => "table_missing",
            Self::Database(_) => "database_error",
            Self::Notification(_) => "notification_error",
            Self::Timeout(_) => "timeout",
            Self::RateLimitExceeded(_) => "rate_limited",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Notification(format!("HTTP request error: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(_, Some(msg)) = &err {
            if let Some(table) = msg.strip_prefix("no such table: ") {
                return Error::TableMissing(table.to_string());
            }
        }
        Error::Database(err.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<tokio_rusqlite::Error> for Error {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(inner) => inner.into(),
            other => Error::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::MissingKey("fingerprint".into()).category(),
            ErrorCategory::Input
        );
        assert_eq!(Error::Forbidden("x".into()).category().status_code(), 403);
        assert_eq!(Error::NotFound("fp_1".into()).category().status_code(), 404);
        assert_eq!(
            Error::TableMissing("cron_executions".into()).category(),
            ErrorCategory::Dependency
        );
    }

    #[test]
    fn test_table_missing_detection() {
        assert!(Error::TableMissing("admin_audit_logs".into()).is_table_missing());
        assert!(!Error::Database("locked".into()).is_table_missing());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "serialization_error");
    }
}
