//! Claim documents for operators, accounts and users.
//!
//! A claim is a generic envelope ([`Claims`]) around a kind-specific body. The
//! body type decides which key kinds may issue and hold it (see [`ClaimBody`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use crate::nkey::{KeyKind, PublicKey};

/// Version written into every claim body.
pub const CLAIMS_VERSION: u8 = 2;

/// Marker for "no limit" in account limits.
pub const NO_LIMIT: i64 = -1;

/// The three claim kinds of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Operator,
    Account,
    User,
}

impl ClaimType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ClaimType::Operator => "operator",
            ClaimType::Account => "account",
            ClaimType::User => "user",
        }
    }
}

/// A kind-specific claim body.
pub trait ClaimBody: Serialize + DeserializeOwned {
    const CLAIM_TYPE: ClaimType;
    /// Kind of key that signs claims with this body.
    const ISSUER_KIND: KeyKind;
    /// Kind of key the claim is about.
    const SUBJECT_KIND: KeyKind;
}

/// The common claim envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims<T> {
    #[serde(default)]
    pub jti: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub name: String,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub nats: T,
}

impl<T: ClaimBody + Default> Claims<T> {
    /// Fresh, unsigned claims about `subject`.
    pub fn new(subject: &PublicKey, name: impl Into<String>) -> Self {
        Self {
            jti: String::new(),
            iat: 0,
            iss: String::new(),
            name: name.into(),
            sub: subject.encode(),
            exp: None,
            nats: T::default(),
        }
    }
}

impl<T> Claims<T> {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now_secs)
    }
}

pub type OperatorClaims = Claims<Operator>;
pub type AccountClaims = Claims<Account>;
pub type UserClaims = Claims<User>;

// ─────────────────────────────────────────────────────────────────────────────
// Operator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signing_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_service_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_account: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strict_signing_key_usage: bool,
}

impl ClaimBody for Operator {
    const CLAIM_TYPE: ClaimType = ClaimType::Operator;
    const ISSUER_KIND: KeyKind = KeyKind::Operator;
    const SUBJECT_KIND: KeyKind = KeyKind::Operator;
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// Allow/deny subject lists for one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
}

impl Permission {
    pub fn allow(subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allow: subjects.into_iter().map(Into::into).collect(),
            deny: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

/// Limits on responses to received requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePermission {
    #[serde(rename = "max")]
    pub max_msgs: i64,
    #[serde(rename = "ttl", with = "duration_nanos")]
    pub expires: Duration,
}

/// Publish, subscribe and response policy.
///
/// Used both as a user's effective permissions and as a role's template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(rename = "pub", default, skip_serializing_if = "Permission::is_empty")]
    pub publish: Permission,
    #[serde(rename = "sub", default, skip_serializing_if = "Permission::is_empty")]
    pub subscribe: Permission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp: Option<ResponsePermission>,
}

impl Permissions {
    pub fn is_empty(&self) -> bool {
        self.publish.is_empty() && self.subscribe.is_empty() && self.resp.is_none()
    }
}

/// A role's permission template.
pub type Template = Permissions;

mod duration_nanos {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = i64::try_from(value.as_nanos()).unwrap_or(i64::MAX);
        serializer.serialize_i64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = i64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos.max(0) as u64))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    UserScope,
}

/// A scoped signing key: users signed with it get `template` as permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScope {
    pub kind: ScopeKind,
    pub key: String,
    pub role: String,
    #[serde(default)]
    pub template: Template,
}

impl UserScope {
    pub fn new(key: &PublicKey, role: impl Into<String>, template: Template) -> Self {
        Self {
            kind: ScopeKind::UserScope,
            key: key.encode(),
            role: role.into(),
            template,
        }
    }
}

/// One entry of an account's signing keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SigningKey {
    Unscoped(String),
    Scoped(UserScope),
}

impl SigningKey {
    pub fn key(&self) -> &str {
        match self {
            SigningKey::Unscoped(key) => key,
            SigningKey::Scoped(scope) => &scope.key,
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            SigningKey::Unscoped(_) => None,
            SigningKey::Scoped(scope) => Some(&scope.role),
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, SigningKey::Scoped(_))
    }
}

/// What [`SigningKeys::upsert_scope`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeChange {
    Added,
    /// The role existed; its template was replaced and its key kept.
    Modified { key: String },
}

/// An account's signing keys, in claim order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningKeys(Vec<SigningKey>);

impl SigningKeys {
    pub fn iter(&self) -> impl Iterator<Item = &SigningKey> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k.key() == key)
    }

    /// Add an unscoped key unless it is already listed.
    pub fn add_unscoped(&mut self, key: &PublicKey) {
        let encoded = key.encode();
        if !self.contains(&encoded) {
            self.0.push(SigningKey::Unscoped(encoded));
        }
    }

    /// The unscoped key with the smallest public identifier.
    pub fn find_unscoped(&self) -> Option<&str> {
        self.0
            .iter()
            .filter_map(|k| match k {
                SigningKey::Unscoped(key) => Some(key.as_str()),
                SigningKey::Scoped(_) => None,
            })
            .min()
    }

    pub fn find_by_role(&self, role: &str) -> Option<&UserScope> {
        self.0.iter().find_map(|k| match k {
            SigningKey::Scoped(scope) if scope.role == role => Some(scope),
            _ => None,
        })
    }

    /// Insert a scoped key, or replace the template of the role's existing key.
    pub fn upsert_scope(&mut self, scope: UserScope) -> ScopeChange {
        let existing = self.0.iter_mut().find_map(|k| match k {
            SigningKey::Scoped(existing) if existing.role == scope.role => Some(existing),
            _ => None,
        });
        match existing {
            Some(existing) => {
                existing.template = scope.template;
                ScopeChange::Modified {
                    key: existing.key.clone(),
                }
            }
            None => {
                self.0.push(SigningKey::Scoped(scope));
                ScopeChange::Added
            }
        }
    }

    /// Role names in claim order.
    pub fn role_names(&self) -> Vec<&str> {
        self.0.iter().filter_map(SigningKey::role).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Stream,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    Singleton,
    Stream,
    Chunked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub subject: String,
    #[serde(rename = "type")]
    pub export_type: ExportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_token_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
}

/// Account resource limits. `-1` means unlimited; JetStream storage `0` means
/// JetStream is disabled for the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLimits {
    pub subs: i64,
    pub data: i64,
    pub payload: i64,
    pub imports: i64,
    pub exports: i64,
    pub wildcards: bool,
    pub conn: i64,
    pub leaf: i64,
    pub mem_storage: i64,
    pub disk_storage: i64,
}

impl Default for AccountLimits {
    fn default() -> Self {
        Self {
            subs: NO_LIMIT,
            data: NO_LIMIT,
            payload: NO_LIMIT,
            imports: NO_LIMIT,
            exports: NO_LIMIT,
            wildcards: true,
            conn: NO_LIMIT,
            leaf: NO_LIMIT,
            mem_storage: 0,
            disk_storage: 0,
        }
    }
}

impl AccountLimits {
    /// Enable JetStream with unlimited memory and disk storage.
    pub fn with_unlimited_jetstream(mut self) -> Self {
        self.mem_storage = NO_LIMIT;
        self.disk_storage = NO_LIMIT;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "SigningKeys::is_empty")]
    pub signing_keys: SigningKeys,
    #[serde(default, skip_serializing_if = "Permissions::is_empty")]
    pub default_permissions: Permissions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,
    #[serde(default)]
    pub limits: AccountLimits,
}

impl ClaimBody for Account {
    const CLAIM_TYPE: ClaimType = ClaimType::Account;
    const ISSUER_KIND: KeyKind = KeyKind::Operator;
    const SUBJECT_KIND: KeyKind = KeyKind::Account;
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_account: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scoped: bool,
}

impl ClaimBody for User {
    const CLAIM_TYPE: ClaimType = ClaimType::User;
    const ISSUER_KIND: KeyKind = KeyKind::Account;
    const SUBJECT_KIND: KeyKind = KeyKind::User;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nkey::KeyPair;

    fn account_key() -> PublicKey {
        KeyPair::generate(KeyKind::Account).public_key()
    }

    #[test]
    fn signing_keys_serialize_as_tagged_variants() {
        let unscoped = account_key();
        let scoped = account_key();
        let mut keys = SigningKeys::default();
        keys.add_unscoped(&unscoped);
        keys.upsert_scope(UserScope::new(&scoped, "worker", Template::default()));

        let value = serde_json::to_value(&keys).unwrap();
        assert_eq!(value[0], serde_json::json!(unscoped.encode()));
        assert_eq!(value[1]["kind"], "user_scope");
        assert_eq!(value[1]["role"], "worker");

        let back: SigningKeys = serde_json::from_value(value).unwrap();
        assert_eq!(back, keys);
    }

    #[test]
    fn upsert_scope_edits_in_place() {
        let first = account_key();
        let second = account_key();
        let mut keys = SigningKeys::default();
        assert_eq!(
            keys.upsert_scope(UserScope::new(&first, "worker", Template::default())),
            ScopeChange::Added
        );

        let mut template = Template::default();
        template.publish = Permission::allow(["a.>"]);
        let change = keys.upsert_scope(UserScope::new(&second, "worker", template.clone()));

        assert_eq!(
            change,
            ScopeChange::Modified {
                key: first.encode()
            }
        );
        assert_eq!(keys.len(), 1);
        let scope = keys.find_by_role("worker").unwrap();
        assert_eq!(scope.key, first.encode());
        assert_eq!(scope.template, template);
    }

    #[test]
    fn find_unscoped_picks_smallest_identifier() {
        let mut pks = vec![account_key(), account_key(), account_key()];
        let mut keys = SigningKeys::default();
        for pk in &pks {
            keys.add_unscoped(pk);
        }
        keys.upsert_scope(UserScope::new(&account_key(), "r", Template::default()));
        pks.sort_by_key(PublicKey::encode);
        assert_eq!(keys.find_unscoped(), Some(pks[0].encode().as_str()));
    }

    #[test]
    fn role_names_skip_unscoped() {
        let mut keys = SigningKeys::default();
        keys.add_unscoped(&account_key());
        keys.upsert_scope(UserScope::new(&account_key(), "a", Template::default()));
        keys.upsert_scope(UserScope::new(&account_key(), "b", Template::default()));
        assert_eq!(keys.role_names(), vec!["a", "b"]);
        assert!(keys.find_by_role("c").is_none());
    }

    #[test]
    fn response_ttl_is_nanoseconds() {
        let perms = Permissions {
            resp: Some(ResponsePermission {
                max_msgs: 1,
                expires: Duration::from_secs(600),
            }),
            ..Permissions::default()
        };
        let value = serde_json::to_value(&perms).unwrap();
        assert_eq!(value["resp"]["max"], 1);
        assert_eq!(value["resp"]["ttl"], 600_000_000_000i64);
        assert!(value.get("pub").is_none());
    }

    #[test]
    fn user_permissions_are_flattened() {
        let user = User {
            permissions: Permissions {
                publish: Permission::allow([">"]),
                ..Permissions::default()
            },
            issuer_account: Some("A".into()),
            scoped: true,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["pub"]["allow"][0], ">");
        assert_eq!(value["scoped"], true);
        let back: User = serde_json::from_value(value).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn new_accounts_have_jetstream_disabled_until_enabled() {
        let limits = AccountLimits::default();
        assert_eq!(limits.mem_storage, 0);
        let limits = limits.with_unlimited_jetstream();
        assert_eq!(limits.mem_storage, NO_LIMIT);
        assert_eq!(limits.disk_storage, NO_LIMIT);
    }
}
