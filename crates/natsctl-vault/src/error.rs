//! Error types for the key vault.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while sealing or unsealing key material.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No secret source produced a master secret.
    #[error("master secret unavailable: {0}")]
    SecretUnavailable(String),

    /// Sealing failed, usually because the master secret does not parse.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// No identity in the master secret opens the file, or the file is damaged.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("no sealed key for {public_key} at {}", path.display())]
    KeyNotFound { public_key: String, path: PathBuf },

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] natsctl_core::CoreError),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
