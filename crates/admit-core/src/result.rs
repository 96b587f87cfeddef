//! Result type aliases for Admit.

use crate::AdmitError;

/// A specialized `Result` type for Admit operations.
pub type AdmitResult<T> = Result<T, AdmitError>;
