//! Master identities and their recipients.
//!
//! A master secret is a text blob of age X25519 identities, one per line:
//!
//! ```text
//! # created 2024-05-01
//! AGE-SECRET-KEY-1...
//! ```
//!
//! Blank lines and `#` comments are ignored. Every identity can open files
//! sealed to its recipient (`age1...`), so existing secrets and key files
//! stay usable with the `age` tool.

use std::fmt;
use std::str::FromStr;

use age::secrecy::ExposeSecret;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

pub const IDENTITY_PREFIX: &str = "AGE-SECRET-KEY-1";
pub const RECIPIENT_PREFIX: &str = "age1";

/// One vault identity (an age X25519 identity).
pub struct MasterIdentity(pub(crate) age::x25519::Identity);

impl MasterIdentity {
    /// Generate a new identity for bootstrapping a configuration.
    pub fn generate() -> Self {
        Self(age::x25519::Identity::generate())
    }

    /// Parse a single `AGE-SECRET-KEY-1...` line.
    pub fn parse(line: &str) -> Result<Self> {
        age::x25519::Identity::from_str(line.trim())
            .map(Self)
            .map_err(|e| VaultError::InvalidIdentity(e.to_string()))
    }

    /// Render as an `AGE-SECRET-KEY-1...` line.
    pub fn to_secret_string(&self) -> Zeroizing<String> {
        Zeroizing::new(self.0.to_string().expose_secret().clone())
    }

    pub fn recipient(&self) -> Recipient {
        Recipient(self.0.to_public())
    }
}

impl fmt::Debug for MasterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterIdentity({})", self.recipient())
    }
}

/// Parse every identity in a master secret blob.
pub fn parse_identities(text: &str) -> Result<Vec<MasterIdentity>> {
    let identities = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(MasterIdentity::parse)
        .collect::<Result<Vec<_>>>()?;
    if identities.is_empty() {
        return Err(VaultError::InvalidIdentity(
            "master secret contains no identities".to_string(),
        ));
    }
    Ok(identities)
}

/// The public half of an identity; files are sealed to recipients.
#[derive(Clone)]
pub struct Recipient(pub(crate) age::x25519::Recipient);

impl Recipient {
    pub fn parse(encoded: &str) -> Result<Self> {
        age::x25519::Recipient::from_str(encoded.trim())
            .map(Self)
            .map_err(|e| VaultError::InvalidIdentity(e.to_string()))
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Recipient {}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recipient({self})")
    }
}
