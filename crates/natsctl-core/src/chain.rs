//! Trust chain rules.
//!
//! Operator → Account → scoped signing key (role) → User. The operator signs
//! accounts only through its listed signing keys; every account denies
//! everything by default; users are signed by a role's scoped key and inherit
//! its template.

use crate::claims::{
    Account, AccountClaims, Export, ExportType, OperatorClaims, Permission, ResponseType,
};
use crate::error::{CoreError, Result};
use crate::nkey::{KeyKind, PublicKey};

/// Reserved name of the system account.
pub const SYSTEM_ACCOUNT_NAME: &str = "SYS";

/// Full wildcard; denying it denies everything.
pub const DENY_ALL: &str = ">";

const SYS_ACCOUNTS_INFO_URL: &str = "https://docs.nats.io/nats-server/configuration/sys_accounts";

/// Build operator claims with strict signing key usage.
///
/// `root` is the operator identity, `signing_key` the key that signs all
/// accounts from now on.
pub fn operator_claims(
    name: &str,
    root: &PublicKey,
    signing_key: &PublicKey,
    system_account: &PublicKey,
    service_urls: Vec<String>,
    account_server_url: Option<String>,
) -> Result<OperatorClaims> {
    root.expect_kind(KeyKind::Operator)?;
    signing_key.expect_kind(KeyKind::Operator)?;
    system_account.expect_kind(KeyKind::Account)?;

    let mut claims = OperatorClaims::new(root, name);
    claims.nats.signing_keys = vec![signing_key.encode()];
    claims.nats.system_account = Some(system_account.encode());
    claims.nats.operator_service_urls = service_urls;
    claims.nats.account_server_url = account_server_url;
    claims.nats.strict_signing_key_usage = true;
    Ok(claims)
}

/// Check that `signer` may sign account claims under `operator`.
pub fn check_account_signer(operator: &OperatorClaims, signer: &PublicKey) -> Result<()> {
    let encoded = signer.encode();
    let unauthorized = |reason: &str| CoreError::UnauthorizedSigner {
        signer: encoded.clone(),
        reason: reason.to_string(),
    };

    if signer.kind() != KeyKind::Operator {
        return Err(unauthorized("not an operator key"));
    }
    if operator.nats.strict_signing_key_usage && encoded == operator.sub {
        return Err(unauthorized("operator identity may not sign accounts"));
    }
    if encoded != operator.sub && !operator.nats.signing_keys.contains(&encoded) {
        return Err(unauthorized("not a signing key of the operator"));
    }
    Ok(())
}

/// The operator signing key used for new signatures.
pub fn operator_signing_key(operator: &OperatorClaims) -> Result<PublicKey> {
    let key = operator.nats.signing_keys.first().ok_or_else(|| {
        CoreError::UnauthorizedSigner {
            signer: operator.sub.clone(),
            reason: "operator has no signing keys".to_string(),
        }
    })?;
    PublicKey::decode_kind(key, KeyKind::Operator)
}

/// Claims for the reserved system account with its monitoring exports.
pub fn system_account_claims(account: &PublicKey, signing_key: &PublicKey) -> Result<AccountClaims> {
    account.expect_kind(KeyKind::Account)?;
    signing_key.expect_kind(KeyKind::Account)?;

    let mut claims = AccountClaims::new(account, SYSTEM_ACCOUNT_NAME);
    claims.nats.signing_keys.add_unscoped(signing_key);
    claims.nats.exports = vec![
        Export {
            name: "account-monitoring-services".to_string(),
            subject: "$SYS.REQ.ACCOUNT.*.*".to_string(),
            export_type: ExportType::Service,
            response_type: Some(ResponseType::Stream),
            account_token_position: Some(4),
            description: Some(
                "Request account specific monitoring services for: SUBSZ, CONNZ, LEAFZ, JSZ and INFO"
                    .to_string(),
            ),
            info_url: Some(SYS_ACCOUNTS_INFO_URL.to_string()),
        },
        Export {
            name: "account-monitoring-streams".to_string(),
            subject: "$SYS.ACCOUNT.*.>".to_string(),
            export_type: ExportType::Stream,
            response_type: None,
            account_token_position: Some(3),
            description: Some("Account specific monitoring stream".to_string()),
            info_url: Some(SYS_ACCOUNTS_INFO_URL.to_string()),
        },
    ];
    apply_default_deny(&mut claims.nats);
    Ok(claims)
}

/// Deny everything for publish and subscribe unless a user says otherwise.
pub fn apply_default_deny(account: &mut Account) {
    account.default_permissions.publish = Permission {
        allow: Vec::new(),
        deny: vec![DENY_ALL.to_string()],
    };
    account.default_permissions.subscribe = Permission {
        allow: Vec::new(),
        deny: vec![DENY_ALL.to_string()],
    };
}

impl AccountClaims {
    pub fn apply_default_deny(&mut self) {
        apply_default_deny(&mut self.nats);
    }
}

/// Make sure the account has an unscoped signing key.
///
/// `generate` is only called when none is present and must return the new
/// key's public identifier (after sealing its seed). Returns the added key.
pub fn ensure_unscoped_signing_key<E>(
    account: &mut Account,
    generate: impl FnOnce() -> std::result::Result<PublicKey, E>,
) -> std::result::Result<Option<PublicKey>, E> {
    if account.signing_keys.find_unscoped().is_some() {
        return Ok(None);
    }
    let key = generate()?;
    account.signing_keys.add_unscoped(&key);
    Ok(Some(key))
}
