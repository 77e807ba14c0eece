//! Sealed file envelope: ASCII-armored age encryption.
//!
//! Sealed files are plain age files and open with `age -d -i <secret>`.

use std::io::{Read, Write};

use age::armor::{ArmoredReader, ArmoredWriter, Format};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::identity::{MasterIdentity, Recipient};

pub const ARMOR_BEGIN: &str = "-----BEGIN AGE ENCRYPTED FILE-----";

/// Encrypt `plaintext` so that any of `recipients` can open it.
pub fn seal_armored(plaintext: &[u8], recipients: &[Recipient]) -> Result<String> {
    let recipients: Vec<Box<dyn age::Recipient + Send>> = recipients
        .iter()
        .map(|recipient| Box::new(recipient.0.clone()) as Box<dyn age::Recipient + Send>)
        .collect();
    let encryptor = age::Encryptor::with_recipients(recipients)
        .ok_or_else(|| VaultError::EncryptionFailed("no recipients".to_string()))?;

    let mut armored = Vec::new();
    let output = ArmoredWriter::wrap_output(&mut armored, Format::AsciiArmor).map_err(encryption)?;
    let mut writer = encryptor.wrap_output(output).map_err(encryption)?;
    writer.write_all(plaintext).map_err(encryption)?;
    writer
        .finish()
        .and_then(|output| output.finish())
        .map_err(encryption)?;

    String::from_utf8(armored)
        .map_err(|_| VaultError::EncryptionFailed("armor is not text".to_string()))
}

/// Decrypt an armored age file with the first identity that matches.
pub fn open_armored(armored: &str, identities: &[MasterIdentity]) -> Result<Zeroizing<Vec<u8>>> {
    let decryptor = match age::Decryptor::new(ArmoredReader::new(armored.as_bytes()))
        .map_err(decryption)?
    {
        age::Decryptor::Recipients(decryptor) => decryptor,
        _ => {
            return Err(VaultError::DecryptionFailed(
                "passphrase encrypted files are not supported".to_string(),
            ))
        }
    };

    let mut reader = decryptor
        .decrypt(identities.iter().map(|identity| &identity.0 as &dyn age::Identity))
        .map_err(decryption)?;
    let mut plaintext = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut *plaintext)
        .map_err(decryption)?;
    Ok(plaintext)
}

fn encryption(e: impl std::fmt::Display) -> VaultError {
    VaultError::EncryptionFailed(e.to_string())
}

fn decryption(e: impl std::fmt::Display) -> VaultError {
    VaultError::DecryptionFailed(e.to_string())
}
