//! Error types for the locator layer.

use std::path::PathBuf;

/// Errors raised while validating or encoding locators.
///
/// Everything here is a caller or configuration bug. None of these are
/// recoverable by retrying, so higher layers pass them through untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("expected {expected} locators, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("invalid locator for field '{field}': {message}")]
    InvalidLocator { field: String, message: String },

    #[error("codec produced an invalid path {path:?}: {message}")]
    PathInvariantViolation { path: PathBuf, message: String },

    #[error("failed to encode locator record: {message}")]
    RecordEncode { message: String },

    #[error("failed to decode locator record: {message}")]
    RecordDecode { message: String },
}

impl Error {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Error::InvalidLocator {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// True for the arity and per-field validation failures.
    pub fn is_invalid_locator(&self) -> bool {
        matches!(
            self,
            Error::ArityMismatch { .. } | Error::InvalidLocator { .. }
        )
    }
}
