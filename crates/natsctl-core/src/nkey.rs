//! NATS nkey key pairs.
//!
//! Ed25519 keys with a one-byte kind prefix and a CRC-16 checksum, rendered as
//! uppercase base32 without padding. Public identifiers start with the kind
//! letter (`O`, `A`, `U`), seeds with `S` followed by the kind letter.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CoreError, Result};

const PREFIX_BYTE_SEED: u8 = 18 << 3;

const PUBLIC_KEY_LEN: usize = 1 + 32 + 2;
const SEED_LEN: usize = 2 + 32 + 2;

/// The role a key plays in the trust chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Operator,
    Account,
    User,
}

impl KeyKind {
    /// The nkey prefix byte for this kind.
    pub const fn prefix_byte(self) -> u8 {
        match self {
            KeyKind::Operator => 14 << 3,
            KeyKind::Account => 0,
            KeyKind::User => 20 << 3,
        }
    }

    pub fn from_prefix_byte(byte: u8) -> Option<Self> {
        match byte {
            b if b == KeyKind::Operator.prefix_byte() => Some(KeyKind::Operator),
            b if b == KeyKind::Account.prefix_byte() => Some(KeyKind::Account),
            b if b == KeyKind::User.prefix_byte() => Some(KeyKind::User),
            _ => None,
        }
    }

    /// First character of an encoded public identifier of this kind.
    pub const fn letter(self) -> char {
        match self {
            KeyKind::Operator => 'O',
            KeyKind::Account => 'A',
            KeyKind::User => 'U',
        }
    }
}

/// A public identifier: an Ed25519 verifying key tagged with its kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    kind: KeyKind,
    bytes: [u8; 32],
}

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(kind: KeyKind, bytes: [u8; 32]) -> Self {
        Self { kind, bytes }
    }

    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Encode as a 56 character nkey string.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(PUBLIC_KEY_LEN);
        raw.push(self.kind.prefix_byte());
        raw.extend_from_slice(&self.bytes);
        let crc = crc16(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        base32_encode(&raw)
    }

    /// Decode an nkey public identifier, checking its checksum and kind prefix.
    pub fn decode(encoded: &str) -> Result<Self> {
        let raw = base32_decode(encoded)
            .ok_or_else(|| CoreError::InvalidPublicKey(format!("not base32: {encoded}")))?;
        if raw.len() != PUBLIC_KEY_LEN {
            return Err(CoreError::InvalidPublicKey(format!(
                "expected {PUBLIC_KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let (body, checksum) = raw.split_at(PUBLIC_KEY_LEN - 2);
        if crc16(body).to_le_bytes() != checksum {
            return Err(CoreError::InvalidPublicKey(format!(
                "checksum mismatch: {encoded}"
            )));
        }

        let kind = KeyKind::from_prefix_byte(body[0]).ok_or_else(|| {
            CoreError::InvalidPublicKey(format!("unknown prefix byte {:#04x}", body[0]))
        })?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&body[1..]);
        Ok(Self { kind, bytes })
    }

    /// Decode and require a specific kind.
    pub fn decode_kind(encoded: &str, expected: KeyKind) -> Result<Self> {
        let key = Self::decode(encoded)?;
        key.expect_kind(expected)?;
        Ok(key)
    }

    pub fn expect_kind(&self, expected: KeyKind) -> Result<()> {
        if self.kind != expected {
            return Err(CoreError::UnexpectedKeyKind {
                expected,
                got: self.kind,
            });
        }
        Ok(())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(&self.bytes)
            .map_err(|_| CoreError::InvalidPublicKey(self.encode()))?;
        let sig = DalekSignature::from_bytes(&signature.0);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.encode()[..12])
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// An nkey key pair.
///
/// Wraps ed25519-dalek's `SigningKey`. The seed is only ever exposed through
/// [`KeyPair::seed`], which returns a zeroizing buffer.
#[derive(Clone)]
pub struct KeyPair {
    kind: KeyKind,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair of the given kind.
    pub fn generate(kind: KeyKind) -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { kind, signing_key }
    }

    /// Create from a raw 32-byte Ed25519 seed.
    pub fn from_raw_seed(kind: KeyKind, seed: &[u8; 32]) -> Self {
        Self {
            kind,
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse an encoded nkey seed (`SO...`, `SA...`, `SU...`).
    pub fn from_seed(encoded: &str) -> Result<Self> {
        let raw = Zeroizing::new(
            base32_decode(encoded.trim())
                .ok_or_else(|| CoreError::InvalidSeed("not base32".to_string()))?,
        );
        if raw.len() != SEED_LEN {
            return Err(CoreError::InvalidSeed(format!(
                "expected {SEED_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let (body, checksum) = raw.split_at(SEED_LEN - 2);
        if crc16(body).to_le_bytes() != checksum {
            return Err(CoreError::InvalidSeed("checksum mismatch".to_string()));
        }

        if body[0] & 0xf8 != PREFIX_BYTE_SEED {
            return Err(CoreError::InvalidSeed("missing seed prefix".to_string()));
        }
        let prefix = ((body[0] & 0x07) << 5) | ((body[1] & 0xf8) >> 3);
        let kind = KeyKind::from_prefix_byte(prefix)
            .ok_or_else(|| CoreError::InvalidSeed(format!("unknown prefix byte {prefix:#04x}")))?;

        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&body[2..]);
        Ok(Self::from_raw_seed(kind, &seed))
    }

    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Get the public identifier.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.kind, self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// The encoded seed (secret key material).
    pub fn seed(&self) -> Zeroizing<String> {
        let prefix = self.kind.prefix_byte();
        let mut raw = Zeroizing::new(Vec::with_capacity(SEED_LEN));
        raw.push(PREFIX_BYTE_SEED | (prefix >> 5));
        raw.push((prefix & 0x1f) << 3);
        let mut secret = self.signing_key.to_bytes();
        raw.extend_from_slice(&secret);
        secret.zeroize();
        let crc = crc16(&raw);
        raw.extend_from_slice(&crc.to_le_bytes());
        Zeroizing::new(base32_encode(&raw))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding helpers
// ─────────────────────────────────────────────────────────────────────────────

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// RFC 4648 base32, uppercase, no padding.
pub fn base32_encode(data: &[u8]) -> String {
    let mut result = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits_in_buffer = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits_in_buffer += 8;

        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let index = ((buffer >> bits_in_buffer) & 0x1f) as usize;
            result.push(BASE32_ALPHABET[index] as char);
        }
        buffer &= (1 << bits_in_buffer) - 1;
    }

    if bits_in_buffer > 0 {
        let index = ((buffer << (5 - bits_in_buffer)) & 0x1f) as usize;
        result.push(BASE32_ALPHABET[index] as char);
    }

    result
}

/// Inverse of [`base32_encode`]. Returns `None` on characters outside the alphabet.
pub fn base32_decode(encoded: &str) -> Option<Vec<u8>> {
    let mut result = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits_in_buffer = 0;

    for c in encoded.bytes() {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'2'..=b'7' => c - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u32::from(value);
        bits_in_buffer += 5;

        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result.push((buffer >> bits_in_buffer) as u8);
            buffer &= (1 << bits_in_buffer) - 1;
        }
    }

    Some(result)
}

/// CRC-16/XMODEM.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_xmodem_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31c3);
    }

    #[test]
    fn base32_matches_rfc4648_vectors() {
        assert_eq!(base32_encode(b"f"), "MY");
        assert_eq!(base32_encode(b"fo"), "MZXQ");
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(base32_decode("MZXW6YTBOI").unwrap(), b"foobar");
        assert!(base32_decode("mzxw").is_none());
    }

    #[test]
    fn public_key_prefix_letters() {
        for kind in [KeyKind::Operator, KeyKind::Account, KeyKind::User] {
            let kp = KeyPair::generate(kind);
            let encoded = kp.public_key().encode();
            assert_eq!(encoded.len(), 56);
            assert!(encoded.starts_with(kind.letter()));

            let seed = kp.seed();
            assert_eq!(seed.len(), 58);
            assert!(seed.starts_with('S'));
            assert_eq!(seed.chars().nth(1), Some(kind.letter()));
        }
    }

    #[test]
    fn seed_roundtrip_preserves_identity() {
        let kp = KeyPair::generate(KeyKind::Account);
        let restored = KeyPair::from_seed(&kp.seed()).unwrap();
        assert_eq!(restored.kind(), KeyKind::Account);
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let encoded = KeyPair::generate(KeyKind::User).public_key().encode();
        let mut chars: Vec<char> = encoded.chars().collect();
        chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
        let corrupted: String = chars.into_iter().collect();
        assert!(PublicKey::decode(&corrupted).is_err());
    }

    #[test]
    fn decode_kind_rejects_wrong_kind() {
        let encoded = KeyPair::generate(KeyKind::User).public_key().encode();
        let err = PublicKey::decode_kind(&encoded, KeyKind::Account).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedKeyKind { .. }));
    }

    #[test]
    fn public_key_is_not_a_seed() {
        let encoded = KeyPair::generate(KeyKind::Operator).public_key().encode();
        assert!(KeyPair::from_seed(&encoded).is_err());
    }

    #[test]
    fn sign_verify() {
        let kp = KeyPair::generate(KeyKind::Operator);
        let sig = kp.sign(b"hello");
        assert!(kp.public_key().verify(b"hello", &sig).is_ok());
        assert!(kp.public_key().verify(b"world", &sig).is_err());
    }

    #[test]
    fn debug_does_not_leak_seed() {
        let kp = KeyPair::generate(KeyKind::User);
        let debug = format!("{kp:?}");
        assert!(!debug.contains(kp.seed().as_str()));
        assert!(debug.starts_with("KeyPair(PublicKey(U"));
    }
}
