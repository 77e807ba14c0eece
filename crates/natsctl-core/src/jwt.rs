//! Signed claim tokens.
//!
//! Format: `b64url(header).b64url(payload).b64url(signature)` where the
//! signature is Ed25519 over `header.payload` by the issuer's nkey. The
//! payload's `nats` object carries the claim `type` and `version` next to
//! the kind-specific body.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::claims::{ClaimBody, Claims, CLAIMS_VERSION};
use crate::error::{CoreError, Result};
use crate::nkey::{base32_encode, KeyPair, PublicKey, Signature};

pub const TOKEN_TYPE: &str = "JWT";
pub const TOKEN_ALGORITHM: &str = "ed25519-nkey";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    typ: String,
    alg: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            typ: TOKEN_TYPE.to_string(),
            alg: TOKEN_ALGORITHM.to_string(),
        }
    }
}

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl<T: ClaimBody> Claims<T> {
    /// Sign and encode. Sets `iss`, `iat` and `jti`.
    pub fn encode(&mut self, signer: &KeyPair) -> Result<String> {
        self.encode_at(signer, now_secs())
    }

    /// Like [`Claims::encode`] with an explicit issue time.
    pub fn encode_at(&mut self, signer: &KeyPair, issued_at: i64) -> Result<String> {
        signer.public_key().expect_kind(T::ISSUER_KIND)?;
        PublicKey::decode_kind(&self.sub, T::SUBJECT_KIND)?;

        self.iss = signer.public_key().encode();
        self.iat = issued_at;
        self.jti = String::new();
        self.jti = base32_encode(blake3::hash(&self.payload()?).as_bytes());

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Header::default())?);
        let payload = URL_SAFE_NO_PAD.encode(self.payload()?);
        let signing_input = format!("{header}.{payload}");
        let signature = signer.sign(signing_input.as_bytes());

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.as_bytes())
        ))
    }

    /// Decode a token, verifying its type, issuer kind and signature.
    pub fn decode(token: &str) -> Result<Self> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::MalformedToken(
                "expected three segments".to_string(),
            ));
        };

        let header_bytes = decode_segment(header)?;
        let parsed: Header = serde_json::from_slice(&header_bytes)?;
        if parsed.alg != TOKEN_ALGORITHM {
            return Err(CoreError::MalformedToken(format!(
                "unsupported algorithm {}",
                parsed.alg
            )));
        }

        let value: Value = serde_json::from_slice(&decode_segment(payload)?)?;
        let claim_type = value
            .get("nats")
            .and_then(|nats| nats.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if claim_type != T::CLAIM_TYPE.as_str() {
            return Err(CoreError::ClaimTypeMismatch {
                expected: T::CLAIM_TYPE,
                got: claim_type.to_string(),
            });
        }
        let claims: Self = serde_json::from_value(value)?;

        let issuer = PublicKey::decode_kind(&claims.iss, T::ISSUER_KIND)?;
        let signature_bytes: [u8; 64] = decode_segment(signature)?
            .try_into()
            .map_err(|_| CoreError::MalformedToken("signature length".to_string()))?;
        issuer.verify(
            format!("{header}.{payload}").as_bytes(),
            &Signature::from_bytes(signature_bytes),
        )?;

        Ok(claims)
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        if let Some(nats) = value.get_mut("nats").and_then(Value::as_object_mut) {
            nats.insert("type".into(), Value::from(T::CLAIM_TYPE.as_str()));
            nats.insert("version".into(), Value::from(CLAIMS_VERSION));
        }
        Ok(serde_json::to_vec(&value)?)
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CoreError::MalformedToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Account, Operator, User, UserClaims};
    use crate::nkey::KeyKind;

    #[test]
    fn encode_decode_account() {
        let operator = KeyPair::generate(KeyKind::Operator);
        let account = KeyPair::generate(KeyKind::Account);
        let mut claims = Claims::<Account>::new(&account.public_key(), "APP");
        claims.nats.description = Some("test".into());

        let token = claims.encode(&operator).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = Claims::<Account>::decode(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.iss, operator.public_key().encode());
        assert!(!decoded.jti.is_empty());
    }

    #[test]
    fn payload_carries_type_and_version() {
        let operator = KeyPair::generate(KeyKind::Operator);
        let mut claims = Claims::<Operator>::new(&operator.public_key(), "OP");
        let token = claims.encode(&operator).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let value: Value = serde_json::from_slice(&decode_segment(payload).unwrap()).unwrap();
        assert_eq!(value["nats"]["type"], "operator");
        assert_eq!(value["nats"]["version"], 2);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let operator = KeyPair::generate(KeyKind::Operator);
        let account = KeyPair::generate(KeyKind::Account);
        let mut claims = Claims::<Account>::new(&account.public_key(), "APP");
        let token = claims.encode(&operator).unwrap();

        claims.name = "EVIL".into();
        let forged_payload = URL_SAFE_NO_PAD.encode(claims.payload().unwrap());
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            Claims::<Account>::decode(&forged),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_claim_type_is_rejected() {
        let operator = KeyPair::generate(KeyKind::Operator);
        let account = KeyPair::generate(KeyKind::Account);
        let token = Claims::<Account>::new(&account.public_key(), "APP")
            .encode(&operator)
            .unwrap();
        assert!(matches!(
            UserClaims::decode(&token),
            Err(CoreError::ClaimTypeMismatch { .. })
        ));
    }

    #[test]
    fn issuer_kind_is_enforced_on_encode() {
        let account = KeyPair::generate(KeyKind::Account);
        let other = KeyPair::generate(KeyKind::Account);
        let mut claims = Claims::<Account>::new(&other.public_key(), "APP");
        assert!(matches!(
            claims.encode(&account),
            Err(CoreError::UnexpectedKeyKind { .. })
        ));

        let user = KeyPair::generate(KeyKind::User);
        let mut user_claims = Claims::<User>::new(&user.public_key(), "u");
        assert!(user_claims.encode(&account).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Claims::<Account>::decode("not-a-token"),
            Err(CoreError::MalformedToken(_))
        ));
    }
}
