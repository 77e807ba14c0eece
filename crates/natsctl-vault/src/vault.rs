//! The key vault: sealed nkey seeds on disk.
//!
//! Layout under the vault root:
//!
//! ```text
//! keys/<c1>/<c2-3>/<public key>.nk.age   armored age file holding the seed
//! keys/<c1>/<c2-3>/<public key>.nk       plaintext seed, short-lived
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use natsctl_core::{KeyKind, KeyPair, PublicKey};

use crate::envelope::{open_armored, seal_armored};
use crate::error::{Result, VaultError};
use crate::secret::MasterSecretHandle;

const SEALED_EXTENSION: &str = "nk.age";
const PLAIN_EXTENSION: &str = "nk";

/// Sealed key storage rooted at a directory (usually `<root>/nkeys`).
#[derive(Debug, Clone)]
pub struct KeyVault {
    root: PathBuf,
}

impl KeyVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the sealed file for `public_key`. Pure function of the identifier.
    pub fn key_path(&self, public_key: &PublicKey) -> PathBuf {
        self.key_dir(public_key)
            .join(format!("{public_key}.{SEALED_EXTENSION}"))
    }

    /// Path of the plaintext file for `public_key`.
    pub fn unencrypted_path(&self, public_key: &PublicKey) -> PathBuf {
        self.key_dir(public_key)
            .join(format!("{public_key}.{PLAIN_EXTENSION}"))
    }

    fn key_dir(&self, public_key: &PublicKey) -> PathBuf {
        let encoded = public_key.encode();
        self.root
            .join("keys")
            .join(&encoded[..1])
            .join(&encoded[1..3])
    }

    pub fn contains(&self, public_key: &PublicKey) -> bool {
        self.key_path(public_key).is_file()
    }

    /// Encrypt the key pair's seed to every recipient of `handle` and write it.
    pub fn seal(&self, keypair: &KeyPair, handle: &MasterSecretHandle) -> Result<PathBuf> {
        let recipients = handle
            .recipients()
            .map_err(|e| VaultError::EncryptionFailed(format!("unusable master secret: {e}")))?;
        let seed = keypair.seed();
        let armored = seal_armored(seed.as_bytes(), &recipients)?;

        let path = self.key_path(&keypair.public_key());
        write_private(&path, armored.as_bytes())?;
        tracing::debug!(path = %path.display(), "sealed key written");
        Ok(path)
    }

    /// Generate a key pair of `kind`, seal it and return it.
    pub fn generate(&self, kind: KeyKind, handle: &MasterSecretHandle) -> Result<KeyPair> {
        let keypair = KeyPair::generate(kind);
        self.seal(&keypair, handle)?;
        Ok(keypair)
    }

    /// Read and decrypt the sealed key for `public_key`.
    pub fn unseal(&self, public_key: &PublicKey, handle: &MasterSecretHandle) -> Result<KeyPair> {
        let path = self.key_path(public_key);
        let armored = match fs::read_to_string(&path) {
            Ok(text) => zeroize::Zeroizing::new(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::KeyNotFound {
                    public_key: public_key.encode(),
                    path,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let identities = handle
            .identities()
            .map_err(|e| VaultError::DecryptionFailed(format!("unusable master secret: {e}")))?;
        let plaintext = open_armored(&armored, &identities)?;
        let seed = std::str::from_utf8(&plaintext)
            .map_err(|_| VaultError::DecryptionFailed("seed is not text".to_string()))?;
        let keypair = KeyPair::from_seed(seed)
            .map_err(|e| VaultError::DecryptionFailed(format!("bad seed: {e}")))?;

        if keypair.public_key() != *public_key {
            return Err(VaultError::DecryptionFailed(format!(
                "{} contains the seed of {}",
                path.display(),
                keypair.public_key()
            )));
        }
        Ok(keypair)
    }

    /// Write the plaintext seed next to the sealed file.
    ///
    /// The returned guard removes the file when dropped.
    pub fn write_unencrypted(&self, keypair: &KeyPair) -> Result<UnencryptedKey> {
        let path = self.unencrypted_path(&keypair.public_key());
        write_private(&path, keypair.seed().as_bytes())?;
        tracing::debug!(path = %path.display(), "unencrypted key written");
        Ok(UnencryptedKey { path })
    }

    /// Delete the sealed file for `public_key`. Returns whether one existed.
    pub fn remove(&self, public_key: &PublicKey) -> Result<bool> {
        let removed = remove_if_exists(&self.key_path(public_key))?;
        if removed {
            tracing::debug!(key = %public_key, "sealed key removed");
        }
        Ok(removed)
    }

    /// Remove the plaintext seed file for `public_key`, if any.
    pub fn remove_unencrypted(&self, public_key: &PublicKey) -> Result<()> {
        remove_if_exists(&self.unencrypted_path(public_key))?;
        Ok(())
    }

    /// Remove every plaintext `*.nk` file under the vault root.
    ///
    /// Returns how many files were removed. Failures to remove individual
    /// files are logged and skipped.
    pub fn sweep_unencrypted(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == PLAIN_EXTENSION) {
                    match fs::remove_file(&path) {
                        Ok(()) => removed += 1,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "failed to remove unencrypted key");
                        }
                    }
                }
            }
        }
        Ok(removed)
    }
}

/// A plaintext seed file that exists only as long as this guard.
#[derive(Debug)]
pub struct UnencryptedKey {
    path: PathBuf,
}

impl UnencryptedKey {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnencryptedKey {
    fn drop(&mut self) {
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove unencrypted key");
        }
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Atomically write an owner-only file, creating owner-only parent directories.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent"))?;
    create_private_dir_all(parent)?;

    // NamedTempFile is created with mode 0600.
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VaultError::Io(e.error))?;
    Ok(())
}

fn create_private_dir_all(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}
