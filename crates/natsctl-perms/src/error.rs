//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while building permissions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermsError {
    /// A subject pattern is not well formed.
    #[error("invalid subject {subject:?}: {reason}")]
    InvalidSubject {
        subject: String,
        reason: &'static str,
    },
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
