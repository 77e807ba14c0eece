//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No claim document exists for the entity.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A claim document exists but does not decode or verify.
    #[error("{kind} {name} is corrupt: {source}")]
    Corrupt {
        kind: &'static str,
        name: String,
        #[source]
        source: natsctl_core::CoreError,
    },

    /// Signing or naming failure while writing.
    #[error("core error: {0}")]
    Core(#[from] natsctl_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
