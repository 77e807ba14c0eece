//! # natsctl core
//!
//! Pure primitives for natsctl: nkey key pairs, signed claims and the trust
//! chain rules that bind an Operator, its Accounts, their Roles and Users.
//!
//! This crate contains no I/O. Everything here is computation over key
//! material and claim documents.
//!
//! ## Key Types
//!
//! - [`KeyPair`] / [`PublicKey`] - Ed25519 keys in NATS nkey encoding
//! - [`OperatorClaims`], [`AccountClaims`], [`UserClaims`] - claim documents
//! - [`SigningKeys`] - an account's unscoped and scoped (role) signing keys
//! - [`Permissions`] / [`Template`] - publish/subscribe/response policy
//!
//! ## Tokens
//!
//! Claims are encoded as signed JWT-style tokens, see [`jwt`]. A token can be
//! verified against its issuer's public identifier alone.
//!
//! ## Trust Chain
//!
//! The invariants of the hierarchy (strict operator signing keys, default-deny
//! accounts, one scoped key per role, the reserved system account) live in
//! [`chain`].

pub mod chain;
pub mod claims;
pub mod creds;
pub mod error;
pub mod jwt;
pub mod nkey;
pub mod types;

pub use chain::{
    apply_default_deny, check_account_signer, ensure_unscoped_signing_key, operator_claims,
    operator_signing_key, system_account_claims,
    DENY_ALL, SYSTEM_ACCOUNT_NAME,
};
pub use claims::{
    Account, AccountClaims, AccountLimits, ClaimBody, ClaimType, Claims, Export, ExportType,
    Operator, OperatorClaims, Permission, Permissions, ResponsePermission, ResponseType,
    ScopeChange, SigningKey, SigningKeys, Template, User, UserClaims, UserScope,
};
pub use creds::{format_user_config, parse_user_config, UserConfig};
pub use error::{CoreError, Result};
pub use nkey::{KeyKind, KeyPair, PublicKey, Signature};
pub use types::{AccountName, OperatorName, RoleName, UserName};
