//! Cache error types.

use admit_core::AdmitError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the cache tiers.
///
/// None of these leave [`crate::TieredCache`]: remote errors are logged and
/// absorbed, serialization errors turn into misses.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote tier could not be reached.
    #[error("Remote cache unavailable: {0}")]
    RemoteUnavailable(String),

    /// A remote command failed after a connection was established.
    #[error("Remote cache operation '{operation}' failed: {message}")]
    RemoteOperation {
        operation: &'static str,
        message: String,
    },

    /// A remote command exceeded the configured bound.
    #[error("Remote cache operation '{0}' timed out")]
    Timeout(&'static str),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid connection settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Wraps a Redis error for the given command.
    pub(crate) fn remote(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::RemoteOperation {
            operation,
            message: err.to_string(),
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable(_) => "unavailable",
            Self::RemoteOperation { .. } => "operation",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}

impl From<CacheError> for AdmitError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Timeout(op) => AdmitError::Timeout(format!("cache {}", op)),
            CacheError::Configuration(msg) => AdmitError::Configuration(msg),
            other => AdmitError::Cache(other.to_string()),
        }
    }
}
