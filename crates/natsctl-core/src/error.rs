//! Error types for natsctl core.

use thiserror::Error;

use crate::claims::ClaimType;
use crate::nkey::KeyKind;

/// Errors that can occur while handling keys and claims.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("unexpected key kind: expected {expected:?}, got {got:?}")]
    UnexpectedKeyKind { expected: KeyKind, got: KeyKind },

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("claim type mismatch: expected {expected:?}, got {got}")]
    ClaimTypeMismatch { expected: ClaimType, got: String },

    #[error("signer {signer} is not authorized: {reason}")]
    UnauthorizedSigner { signer: String, reason: String },

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
