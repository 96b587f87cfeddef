//! Realtime error types.

use admit_core::AdmitError;
use thiserror::Error;

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Errors raised by the event router and its transport.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The handshake origin is not on the allow-list.
    #[error("Origin not allowed: {0}")]
    ConnectionRejected(String),

    /// The handshake used a method outside the allow-list.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Missing or invalid handshake credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The connection's identity may not join the requested room.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A client frame could not be understood.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The connection is not registered (already disconnected).
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),
}

impl RealtimeError {
    /// HTTP status used when the error happens during the handshake.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::ConnectionRejected(_) | Self::Forbidden(_) => 403,
            Self::MethodNotAllowed(_) => 405,
            Self::Unauthorized(_) => 401,
            Self::InvalidMessage(_) => 400,
            Self::UnknownConnection(_) => 410,
        }
    }
}

impl From<RealtimeError> for AdmitError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::ConnectionRejected(origin) => AdmitError::ConnectionRejected(origin),
            RealtimeError::Unauthorized(msg) => AdmitError::Unauthorized(msg),
            RealtimeError::Forbidden(msg) => AdmitError::Forbidden(msg),
            RealtimeError::InvalidMessage(msg) => AdmitError::Validation(msg),
            other => AdmitError::Realtime(other.to_string()),
        }
    }
}
