//! The issuance workflows: operators, accounts, roles and users.
//!
//! Every workflow reads claims from the store, unlocks the vault for the keys
//! it signs with, mutates the claims under the trust chain rules and writes
//! them back re-signed. New key material is sealed as soon as it exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use natsctl_core::jwt::now_secs;
use natsctl_core::{
    check_account_signer, ensure_unscoped_signing_key, operator_claims, operator_signing_key,
    system_account_claims, AccountClaims, AccountLimits, AccountName, KeyKind, KeyPair,
    OperatorClaims, OperatorName, Permission, PublicKey, RoleName, ScopeChange, UserClaims, UserName,
    UserScope, SYSTEM_ACCOUNT_NAME,
};
use natsctl_perms::{derive_template, inbox_prefix, TemplateInput};
use natsctl_store::{ClaimStore, ClaimStoreExt, CredsStore, FsClaimStore};
use natsctl_vault::{KeyVault, MasterSecretHandle, Unlocker};
use zeroize::Zeroizing;

use crate::config::{Config, Layout};
use crate::context::{context_name, default_context_dir, select_context, NatsContext};
use crate::error::{CtlError, Result};
use crate::resolver::{AccountResolver, NscResolver, SyncDirection, SyncReport};
use crate::secret::secret_source;
use crate::server_config::ServerConfig;

/// Fixed name of the temporary admin user.
pub const ADMIN_USER_NAME: &str = "admin";

const URL_SCHEMES: [&str; 2] = ["tls://", "nats://"];

/// Configuration for [`Ctl`].
#[derive(Debug, Clone)]
pub struct CtlConfig {
    /// How long admin user credentials stay valid.
    pub admin_user_validity: Duration,
    /// `nats` CLI context directory; no contexts are written when `None`.
    pub nats_context_dir: Option<PathBuf>,
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            admin_user_validity: Duration::from_secs(24 * 60 * 60),
            nats_context_dir: default_context_dir(),
        }
    }
}

/// Result of bootstrapping an operator.
pub struct OperatorBootstrap {
    pub operator: OperatorName,
    /// Public identifier of the operator root key.
    pub root_public_key: String,
    /// The root seed. It is not stored anywhere; show it once.
    pub root_seed: Zeroizing<String>,
    pub signing_key: String,
    pub system_account: String,
    pub server_config: PathBuf,
}

impl std::fmt::Debug for OperatorBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorBootstrap")
            .field("operator", &self.operator)
            .field("root_public_key", &self.root_public_key)
            .field("signing_key", &self.signing_key)
            .field("system_account", &self.system_account)
            .field("server_config", &self.server_config)
            .finish_non_exhaustive()
    }
}

/// Result of creating or updating an account.
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub account: String,
    pub created: bool,
    /// The unscoped signing key generated by this call, if one was missing.
    pub added_unscoped_key: Option<String>,
}

/// Result of creating or editing a role.
#[derive(Debug, Clone)]
pub struct RoleReport {
    pub signing_key: String,
    pub change: ScopeChange,
}

/// Result of issuing user credentials.
#[derive(Debug, Clone)]
pub struct IssuedUser {
    pub public_key: String,
    pub creds_path: PathBuf,
    /// The inbox prefix the client must use; `None` for admin users.
    pub inbox_prefix: Option<String>,
    pub expires_at: Option<i64>,
    /// The `nats` CLI context written for these credentials.
    pub context: Option<PathBuf>,
}

/// Runs the issuance workflows against one working root.
pub struct Ctl<S: ClaimStore> {
    store: Arc<S>,
    vault: KeyVault,
    creds: CredsStore,
    unlocker: Unlocker,
    resolver: Box<dyn AccountResolver>,
    layout: Layout,
    config: CtlConfig,
}

impl<S: ClaimStore> Ctl<S> {
    pub fn new(
        layout: Layout,
        store: S,
        unlocker: Unlocker,
        resolver: Box<dyn AccountResolver>,
        config: CtlConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            vault: KeyVault::new(layout.nkeys_dir()),
            creds: CredsStore::new(layout.nkeys_dir()),
            unlocker,
            resolver,
            layout,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn creds(&self) -> &CredsStore {
        &self.creds
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    async fn unlock(&mut self) -> Result<MasterSecretHandle> {
        Ok(self.unlocker.unlock().await?)
    }

    /// Delete keys sealed by a workflow whose claims were never written.
    fn discard(&self, keys: &[PublicKey]) {
        for key in keys {
            match self.vault.remove(key) {
                Ok(_) => tracing::debug!(%key, "discarded unused sealed key"),
                Err(e) => tracing::warn!(%key, error = %e, "failed to remove unused sealed key"),
            }
        }
    }

    /// Unseal the operator signing key allowed to sign accounts.
    fn operator_signer(
        &self,
        operator: &OperatorClaims,
        handle: &MasterSecretHandle,
    ) -> Result<KeyPair> {
        let public_key = operator_signing_key(operator)?;
        check_account_signer(operator, &public_key)?;
        Ok(self.vault.unseal(&public_key, handle)?)
    }

    async fn existing_account(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<AccountClaims> {
        if !self.store.account_exists(operator, account).await? {
            return Err(CtlError::AccountNotFound {
                operator: operator.clone(),
                account: account.clone(),
            });
        }
        Ok(self.store.read_account(operator, account).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operators
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an operator with a signing key and its system account.
    ///
    /// `server_urls` is a comma separated list of `tls://` or `nats://` URLs.
    /// Without `account_server_url`, it is derived from the server URLs with
    /// `tls://` replaced by `nats://`.
    pub async fn init_operator(
        &mut self,
        operator: &OperatorName,
        server_urls: &str,
        account_server_url: Option<String>,
    ) -> Result<OperatorBootstrap> {
        if self.store.read_operator_token(operator).await?.is_some() {
            return Err(CtlError::OperatorExists(operator.clone()));
        }
        let urls = parse_server_urls(server_urls)?;
        let account_server_url =
            account_server_url.unwrap_or_else(|| urls.join(",").replace("tls://", "nats://"));

        let handle = self.unlock().await?;
        tracing::info!(%operator, "creating operator");

        let root = KeyPair::generate(KeyKind::Operator);
        let signing = self.vault.generate(KeyKind::Operator, &handle)?;
        let system = self.vault.generate(KeyKind::Account, &handle)?;
        let system_signing = self.vault.generate(KeyKind::Account, &handle)?;

        let mut claims = operator_claims(
            operator.as_str(),
            &root.public_key(),
            &signing.public_key(),
            &system.public_key(),
            urls,
            Some(account_server_url),
        )?;
        let operator_jwt = self
            .store
            .write_operator(operator, &mut claims, &signing)
            .await?;

        let mut system_claims =
            system_account_claims(&system.public_key(), &system_signing.public_key())?;
        check_account_signer(&claims, &signing.public_key())?;
        let system_jwt = self
            .store
            .write_account(operator, &mut system_claims, &signing)
            .await?;
        tracing::info!(%operator, account = SYSTEM_ACCOUNT_NAME, "system account created");

        let server_config = self.layout.server_config_path(operator);
        ServerConfig {
            operator_name: operator.as_str(),
            operator_jwt: &operator_jwt,
            system_account: &system_claims.sub,
            system_account_jwt: &system_jwt,
        }
        .write(&server_config)?;

        Ok(OperatorBootstrap {
            operator: operator.clone(),
            root_public_key: root.public_key().encode(),
            root_seed: root.seed(),
            signing_key: signing.public_key().encode(),
            system_account: system_claims.sub,
            server_config,
        })
    }

    /// The operator to work on: `requested`, or the only one that exists.
    pub async fn choose_operator(&self, requested: Option<OperatorName>) -> Result<OperatorName> {
        if let Some(operator) = requested {
            if self.store.read_operator_token(&operator).await?.is_none() {
                return Err(CtlError::ClaimNotFound {
                    kind: "operator",
                    name: operator.to_string(),
                });
            }
            return Ok(operator);
        }

        let mut operators = self.store.list_operators().await?;
        operators.sort();
        match operators.len() {
            0 => Err(CtlError::InvalidInput(
                "no operator exists; run init-operator first".to_string(),
            )),
            1 => Ok(operators.remove(0)),
            _ => Err(CtlError::InvalidInput(format!(
                "several operators exist ({}); choose one with OPERATOR_NAME",
                operators
                    .iter()
                    .map(OperatorName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts and roles
    // ─────────────────────────────────────────────────────────────────────────

    /// Create or update an account.
    ///
    /// New accounts get unlimited JetStream storage. Every account leaves this
    /// call with deny-all default permissions and an unscoped signing key.
    pub async fn upsert_account(
        &mut self,
        operator: &OperatorName,
        account: &AccountName,
        description: Option<String>,
    ) -> Result<AccountReport> {
        let operator_claims = self.store.read_operator(operator).await?;
        let handle = self.unlock().await?;
        let signer = self.operator_signer(&operator_claims, &handle)?;

        let mut fresh = Vec::new();
        let (mut claims, created) = if self.store.account_exists(operator, account).await? {
            tracing::info!(%operator, %account, "updating account");
            (self.store.read_account(operator, account).await?, false)
        } else {
            tracing::info!(%operator, %account, "creating account");
            let key = self.vault.generate(KeyKind::Account, &handle)?.public_key();
            fresh.push(key);
            let mut claims = AccountClaims::new(&key, account.as_str());
            claims.nats.limits = AccountLimits::default().with_unlimited_jetstream();
            (claims, true)
        };

        claims.nats.description = description;
        claims.apply_default_deny();

        let vault = &self.vault;
        let added = ensure_unscoped_signing_key(&mut claims.nats, || {
            vault
                .generate(KeyKind::Account, &handle)
                .map(|key| key.public_key())
        })
        .map_err(|e| {
            self.discard(&fresh);
            e
        })?;
        if let Some(key) = &added {
            tracing::warn!(%account, %key, "created unscoped account signing key");
            fresh.push(*key);
        }

        if let Err(e) = self.store.write_account(operator, &mut claims, &signer).await {
            self.discard(&fresh);
            return Err(e.into());
        }

        Ok(AccountReport {
            account: claims.sub,
            created,
            added_unscoped_key: added.map(|key| key.encode()),
        })
    }

    /// Create a role, or replace the template of an existing one.
    ///
    /// A role is a scoped signing key; its key is kept across edits.
    pub async fn upsert_role(
        &mut self,
        operator: &OperatorName,
        account: &AccountName,
        role: &RoleName,
        input: TemplateInput,
    ) -> Result<RoleReport> {
        let operator_claims = self.store.read_operator(operator).await?;
        let mut claims = self.existing_account(operator, account).await?;
        let handle = self.unlock().await?;
        let signer = self.operator_signer(&operator_claims, &handle)?;

        let template = derive_template(input);
        let mut fresh = Vec::new();
        let key = match claims.nats.signing_keys.find_by_role(role.as_str()) {
            Some(scope) => PublicKey::decode_kind(&scope.key, KeyKind::Account)?,
            None => {
                let key = self.vault.generate(KeyKind::Account, &handle)?.public_key();
                fresh.push(key);
                key
            }
        };
        let change = claims
            .nats
            .signing_keys
            .upsert_scope(UserScope::new(&key, role.as_str(), template));
        match &change {
            ScopeChange::Added => tracing::info!(%account, %role, %key, "role added"),
            ScopeChange::Modified { .. } => tracing::info!(%account, %role, %key, "role modified"),
        }

        claims.apply_default_deny();
        let vault = &self.vault;
        let added = ensure_unscoped_signing_key(&mut claims.nats, || {
            vault
                .generate(KeyKind::Account, &handle)
                .map(|key| key.public_key())
        })
        .map_err(|e| {
            self.discard(&fresh);
            e
        })?;
        fresh.extend(added);

        if let Err(e) = self.store.write_account(operator, &mut claims, &signer).await {
            self.discard(&fresh);
            return Err(e.into());
        }

        Ok(RoleReport {
            signing_key: key.encode(),
            change,
        })
    }

    /// Role names of an account, in claim order.
    pub async fn roles(&self, operator: &OperatorName, account: &AccountName) -> Result<Vec<String>> {
        let claims = self.existing_account(operator, account).await?;
        Ok(claims
            .nats
            .signing_keys
            .role_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue credentials for a user of `role`.
    ///
    /// The account and role are checked before the vault is unlocked or
    /// anything is written.
    pub async fn issue_user(
        &mut self,
        operator: &OperatorName,
        account: &AccountName,
        role: &RoleName,
        user: &UserName,
    ) -> Result<IssuedUser> {
        let account_claims = self.existing_account(operator, account).await?;
        let scope = account_claims
            .nats
            .signing_keys
            .find_by_role(role.as_str())
            .cloned()
            .ok_or_else(|| CtlError::RoleNotFound {
                account: account.clone(),
                role: role.clone(),
            })?;
        let scoped_key = PublicKey::decode_kind(&scope.key, KeyKind::Account)?;
        let operator_claims = self.store.read_operator(operator).await?;

        let handle = self.unlock().await?;
        let signer = self.vault.unseal(&scoped_key, &handle)?;
        tracing::info!(%account, %role, key = %scoped_key, "using scoped signing key");

        let user_key = KeyPair::generate(KeyKind::User);
        let mut claims = UserClaims::new(&user_key.public_key(), user.as_str());
        claims.nats.permissions = scope.template;
        claims.nats.issuer_account = Some(account_claims.sub.clone());
        claims.nats.scoped = true;

        let mut issued = self.write_user(operator, account, user, claims, &user_key, &signer)?;
        issued.inbox_prefix = Some(inbox_prefix(&user_key.public_key()));
        issued.context = self.write_context(operator, account, user, &operator_claims, &issued)?;
        Ok(issued)
    }

    /// Issue a temporary `admin` user allowed on every subject.
    ///
    /// Signed with the account's unscoped signing key and valid for
    /// [`CtlConfig::admin_user_validity`].
    pub async fn issue_admin_user(
        &mut self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<IssuedUser> {
        let account_claims = self.existing_account(operator, account).await?;
        let unscoped = account_claims
            .nats
            .signing_keys
            .find_unscoped()
            .ok_or_else(|| CtlError::UnscopedKeyMissing(account.clone()))?;
        let unscoped = PublicKey::decode_kind(unscoped, KeyKind::Account)?;
        let operator_claims = self.store.read_operator(operator).await?;

        let handle = self.unlock().await?;
        let signer = self.vault.unseal(&unscoped, &handle)?;

        let user = UserName::new(ADMIN_USER_NAME)?;
        let user_key = KeyPair::generate(KeyKind::User);
        let mut claims = UserClaims::new(&user_key.public_key(), user.as_str());
        claims.nats.permissions.publish = Permission::allow([">"]);
        claims.nats.permissions.subscribe = Permission::allow([">"]);
        claims.nats.issuer_account = Some(account_claims.sub.clone());
        claims.nats.scoped = false;
        claims.exp = Some(now_secs() + self.config.admin_user_validity.as_secs() as i64);

        let mut issued = self.write_user(operator, account, &user, claims, &user_key, &signer)?;
        issued.context = self.write_context(operator, account, &user, &operator_claims, &issued)?;
        if let Some(dir) = &self.config.nats_context_dir {
            select_context(dir, &context_name(operator, account, &user))?;
        }
        Ok(issued)
    }

    fn write_user(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        user: &UserName,
        mut claims: UserClaims,
        user_key: &KeyPair,
        signer: &KeyPair,
    ) -> Result<IssuedUser> {
        let jwt = claims.encode(signer)?;
        let creds_path = self
            .creds
            .write(operator, account, user, &jwt, &user_key.seed())?;
        tracing::info!(%operator, %account, %user, "user credentials issued");
        Ok(IssuedUser {
            public_key: claims.sub,
            creds_path,
            inbox_prefix: None,
            expires_at: claims.exp,
            context: None,
        })
    }

    /// Write a `nats` CLI context connecting with `issued`'s creds file.
    fn write_context(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        user: &UserName,
        operator_claims: &OperatorClaims,
        issued: &IssuedUser,
    ) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.config.nats_context_dir else {
            return Ok(None);
        };
        let context = NatsContext {
            description: format!("{user} in {operator}/{account}"),
            url: operator_claims.nats.operator_service_urls.join(","),
            creds: fs::canonicalize(&issued.creds_path)?,
            inbox_prefix: issued.inbox_prefix.clone(),
        };
        let path = context.write(dir, &context_name(operator, account, user))?;
        Ok(Some(path))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cluster sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Push all account claims of `operator` to its cluster.
    pub async fn push(&mut self, operator: &OperatorName) -> Result<SyncReport> {
        self.sync(operator, SyncDirection::Push).await
    }

    /// Pull all account claims of `operator` from its cluster.
    pub async fn pull(&mut self, operator: &OperatorName) -> Result<SyncReport> {
        self.sync(operator, SyncDirection::Pull).await
    }

    /// Run the resolver with the system account signing key unsealed.
    ///
    /// Local problems (missing claims, wrong master secret) are errors; a
    /// failing resolver is only reported.
    async fn sync(&mut self, operator: &OperatorName, direction: SyncDirection) -> Result<SyncReport> {
        let system = AccountName::new(SYSTEM_ACCOUNT_NAME)?;
        let system_claims = self.existing_account(operator, &system).await?;
        let key = system_claims
            .nats
            .signing_keys
            .find_unscoped()
            .ok_or_else(|| CtlError::UnscopedKeyMissing(system.clone()))?;
        let key = PublicKey::decode_kind(key, KeyKind::Account)?;

        let handle = self.unlock().await?;
        let keypair = self.vault.unseal(&key, &handle)?;
        let guard = self.vault.write_unencrypted(&keypair)?;

        let result = match direction {
            SyncDirection::Push => self.resolver.push(operator).await,
            SyncDirection::Pull => self.resolver.pull(operator).await,
        };
        drop(guard);

        let error = match result {
            Ok(()) => {
                tracing::info!(%operator, %direction, "account claims synchronized");
                None
            }
            Err(e) => {
                tracing::warn!(%operator, %direction, error = %e, "continuing with local claims");
                Some(e)
            }
        };
        Ok(SyncReport {
            operator: operator.clone(),
            direction,
            error,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Unseal one key by its public identifier, for manual recovery.
    pub async fn reveal_key(&mut self, public_key: &str) -> Result<KeyPair> {
        let public_key = PublicKey::decode(public_key.trim())
            .map_err(|e| CtlError::InvalidInput(e.to_string()))?;
        let handle = self.unlock().await?;
        Ok(self.vault.unseal(&public_key, &handle)?)
    }

    /// Remove every operator, account, key and credential under the root.
    pub fn nuke(&self) -> Result<()> {
        let root = self.layout.root();
        match fs::remove_dir_all(root) {
            Ok(()) => {
                tracing::warn!(root = %root.display(), "all local state removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Ctl<FsClaimStore> {
    /// Open the working root described by `config`, relative to `dir`.
    ///
    /// Uses the filesystem store, the configured master secret source and
    /// `nsc` as the account resolver.
    pub fn open(dir: &Path, config: &Config) -> Self {
        let layout = config.layout(dir);
        let store = FsClaimStore::new(layout.store_dir());
        let unlocker = Unlocker::new(secret_source(&config.master_password));
        let resolver = Box::new(NscResolver::new(&layout));
        Self::new(layout, store, unlocker, resolver, CtlConfig::default())
    }
}

fn parse_server_urls(server_urls: &str) -> Result<Vec<String>> {
    let urls: Vec<String> = server_urls
        .split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return Err(CtlError::InvalidInput("no server URL given".to_string()));
    }
    if let Some(bad) = urls
        .iter()
        .find(|url| !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)))
    {
        return Err(CtlError::InvalidInput(format!(
            "server URL {bad:?} must start with tls:// or nats://"
        )));
    }
    Ok(urls)
}
