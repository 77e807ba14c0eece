//! # natsctl vault
//!
//! At-rest encryption of nkey seeds under a single master secret.
//!
//! ## Overview
//!
//! Every private key natsctl generates is sealed immediately and written as an
//! armored age file under `keys/<c1>/<c2-3>/<public key>.nk.age`. Opening a sealed key requires the
//! master secret, which is fetched once per run through a [`SecretSource`] and
//! passed around as a [`MasterSecretHandle`].
//!
//! Plaintext seeds are only written for external tools that need them, and
//! only behind an [`UnencryptedKey`] guard that deletes the file on drop.
//!
//! ## Key Types
//!
//! - [`KeyVault`] - seal, unseal, and manage plaintext key files
//! - [`Unlocker`] - caches the master secret for the run
//! - [`SecretChain`] - first non-empty secret from an ordered list of sources
//! - [`MasterIdentity`] / [`Recipient`] - the age X25519 identities in the secret
//!
//! ## Usage
//!
//! ```ignore
//! let mut unlocker = Unlocker::new(Box::new(StaticSecret::new(secret_text)));
//! let handle = unlocker.unlock().await?;
//! let vault = KeyVault::new("nsc/nkeys");
//! let key = vault.generate(KeyKind::Account, &handle)?;
//! let again = vault.unseal(&key.public_key(), &handle)?;
//! ```

pub mod envelope;
pub mod error;
pub mod identity;
pub mod secret;
pub mod vault;

pub use envelope::{open_armored, seal_armored};
pub use error::{Result, VaultError};
pub use identity::{parse_identities, MasterIdentity, Recipient};
pub use secret::{MasterSecretHandle, SecretChain, SecretSource, StaticSecret, Unlocker};
pub use vault::{KeyVault, UnencryptedKey};
