//! # natsctl
//!
//! Administration of a NATS decentralized-auth hierarchy with every private
//! key sealed under one master secret.
//!
//! ## Overview
//!
//! natsctl manages the trust chain of a NATS deployment:
//!
//! - **Operator**: the root of trust. Its root key is shown once and never
//!   stored; a signing key signs everything else.
//! - **Account**: a tenant. It denies everything by default and always keeps
//!   one unscoped signing key for admin users.
//! - **Role**: a scoped signing key of an account carrying a permission
//!   template.
//! - **User**: credentials signed by a role's key, inheriting its template.
//!
//! Claims live in a `nsc` compatible store, sealed keys in the key vault and
//! user credentials in `.creds` bundles, each with a matching `nats` CLI
//! context.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use natsctl::{Config, Ctl};
//! use natsctl::core::{AccountName, OperatorName, RoleName, UserName};
//! use natsctl::perms::TemplateInput;
//!
//! async fn example() -> natsctl::Result<()> {
//!     let dir = std::env::current_dir()?;
//!     let config = Config::load(&dir)?;
//!     let mut ctl = Ctl::open(&dir, &config);
//!
//!     let operator = OperatorName::new("ROOT_local")?;
//!     let account = AccountName::new("APP")?;
//!     let role = RoleName::new("worker")?;
//!
//!     ctl.init_operator(&operator, "tls://localhost:4222", None).await?;
//!     ctl.upsert_account(&operator, &account, None).await?;
//!     let input = TemplateInput::new(vec!["jobs.>".into()], vec![], false)?;
//!     ctl.upsert_role(&operator, &account, &role, input).await?;
//!     let user = ctl
//!         .issue_user(&operator, &account, &role, &UserName::new("worker-1")?)
//!         .await?;
//!     println!("{}", user.creds_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `natsctl::core` - nkeys, claims, tokens and the trust chain rules
//! - `natsctl::vault` - master secret and sealed key storage
//! - `natsctl::store` - claim and credential storage
//! - `natsctl::perms` - role template derivation

pub mod config;
pub mod context;
pub mod ctl;
pub mod error;
pub mod resolver;
pub mod secret;
pub mod server_config;

// Re-export component crates
pub use natsctl_core as core;
pub use natsctl_perms as perms;
pub use natsctl_store as store;
pub use natsctl_vault as vault;

pub use config::{Config, Layout, MasterPasswordConfig, CONFIG_FILE, MASTER_KEY_ENV};
pub use context::{context_name, default_context_dir, NatsContext};
pub use ctl::{
    AccountReport, Ctl, CtlConfig, IssuedUser, OperatorBootstrap, RoleReport, ADMIN_USER_NAME,
};
pub use error::{CtlError, Result};
pub use resolver::{AccountResolver, NscResolver, ResolverError, SyncDirection, SyncReport};
pub use secret::{secret_source, BitwardenSecret, EnvSecret};
pub use server_config::ServerConfig;
