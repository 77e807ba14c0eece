//! Error types for natsctl workflows.

use std::path::PathBuf;

use natsctl_core::{AccountName, CoreError, OperatorName, RoleName};
use natsctl_perms::PermsError;
use natsctl_store::StoreError;
use natsctl_vault::VaultError;
use thiserror::Error;

/// Errors that can occur during a natsctl operation.
///
/// Component errors are folded into this taxonomy by the `From` impls below,
/// so callers can match on what went wrong rather than where.
#[derive(Debug, Error)]
pub enum CtlError {
    /// Missing or malformed local configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No master secret could be obtained, or it does not parse.
    #[error("master secret unavailable: {0}")]
    SecretUnavailable(String),

    /// The master secret does not open a sealed key.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The master secret yields no usable recipient.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("no sealed key for {public_key} at {}", path.display())]
    KeyNotFound { public_key: String, path: PathBuf },

    #[error("{kind} not found: {name}")]
    ClaimNotFound { kind: &'static str, name: String },

    #[error("{kind} {name} is corrupt: {source}")]
    ClaimCorrupt {
        kind: &'static str,
        name: String,
        #[source]
        source: CoreError,
    },

    #[error("account {account} does not exist in operator {operator}")]
    AccountNotFound {
        operator: OperatorName,
        account: AccountName,
    },

    #[error("account {account} has no role {role}")]
    RoleNotFound { account: AccountName, role: RoleName },

    #[error("operator {0} already exists")]
    OperatorExists(OperatorName),

    /// The account has no unscoped signing key to issue admin users with.
    #[error("account {0} has no unscoped signing key")]
    UnscopedKeyMissing(AccountName),

    #[error("unauthorized signer: {0}")]
    UnauthorizedSigner(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Key or token handling failed.
    #[error("core error: {0}")]
    Core(#[source] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for CtlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnauthorizedSigner { .. } => CtlError::UnauthorizedSigner(err.to_string()),
            CoreError::InvalidName { .. } => CtlError::InvalidInput(err.to_string()),
            other => CtlError::Core(other),
        }
    }
}

impl From<VaultError> for CtlError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::SecretUnavailable(msg) => CtlError::SecretUnavailable(msg),
            VaultError::InvalidIdentity(msg) => CtlError::SecretUnavailable(msg),
            VaultError::EncryptionFailed(msg) => CtlError::EncryptionFailed(msg),
            VaultError::DecryptionFailed(msg) => CtlError::DecryptionFailed(msg),
            VaultError::KeyNotFound { public_key, path } => {
                CtlError::KeyNotFound { public_key, path }
            }
            VaultError::Io(e) => CtlError::Io(e),
            VaultError::Core(e) => e.into(),
        }
    }
}

impl From<StoreError> for CtlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, name } => CtlError::ClaimNotFound { kind, name },
            StoreError::Corrupt { kind, name, source } => {
                CtlError::ClaimCorrupt { kind, name, source }
            }
            StoreError::Core(e) => e.into(),
            StoreError::Io(e) => CtlError::Io(e),
        }
    }
}

impl From<PermsError> for CtlError {
    fn from(err: PermsError) -> Self {
        CtlError::InvalidInput(err.to_string())
    }
}

/// Result type for natsctl operations.
pub type Result<T> = std::result::Result<T, CtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_errors_map_to_taxonomy() {
        let err: CtlError = VaultError::InvalidIdentity("garbage".into()).into();
        assert!(matches!(err, CtlError::SecretUnavailable(_)));

        let err: CtlError = VaultError::DecryptionFailed("wrong key".into()).into();
        assert!(matches!(err, CtlError::DecryptionFailed(_)));
    }

    #[test]
    fn store_not_found_is_claim_not_found() {
        let err: CtlError = StoreError::NotFound {
            kind: "operator",
            name: "OP".into(),
        }
        .into();
        assert!(matches!(err, CtlError::ClaimNotFound { kind: "operator", .. }));
    }

    #[test]
    fn bad_names_are_invalid_input() {
        let err: CtlError = AccountName::new("a/b").unwrap_err().into();
        assert!(matches!(err, CtlError::InvalidInput(_)));
    }
}
