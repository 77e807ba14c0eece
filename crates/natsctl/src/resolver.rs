//! Synchronizing claims with a running cluster's account resolver.
//!
//! The actual transfer is delegated to the `nsc` tool. Failures here are never
//! fatal for the caller: the local store stays authoritative.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use natsctl_core::OperatorName;
use thiserror::Error;
use tokio::process::Command;

use crate::config::Layout;

/// Errors from the resolver collaborator.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// Which way claims travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Push,
    Pull,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SyncDirection::Push => "push",
            SyncDirection::Pull => "pull",
        })
    }
}

/// Outcome of a push or pull.
#[derive(Debug)]
pub struct SyncReport {
    pub operator: OperatorName,
    pub direction: SyncDirection,
    /// Why the transfer failed, if it did.
    pub error: Option<ResolverError>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Transfers account claims between the local store and a cluster.
///
/// The operator's system account signing key is available unencrypted below
/// the vault root for the duration of each call.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn push(&self, operator: &OperatorName) -> Result<(), ResolverError>;

    async fn pull(&self, operator: &OperatorName) -> Result<(), ResolverError>;
}

/// Runs `nsc` against the working root.
pub struct NscResolver {
    program: String,
    store_dir: PathBuf,
    nkeys_dir: PathBuf,
    home_dir: PathBuf,
}

impl NscResolver {
    pub fn new(layout: &Layout) -> Self {
        Self {
            program: "nsc".to_string(),
            store_dir: layout.store_dir(),
            nkeys_dir: layout.nkeys_dir(),
            home_dir: layout.nsc_home(),
        }
    }

    /// Use a different `nsc` binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<(), ResolverError> {
        let command = format!("{} {}", self.program, args.join(" "));
        tracing::debug!(%command, "running");
        let status = Command::new(&self.program)
            .args(args)
            .env("NKEYS_PATH", &self.nkeys_dir)
            .env("NSC_HOME", &self.home_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ResolverError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(ResolverError::Failed {
                command,
                status: status.to_string(),
            })
        }
    }

    /// Point `nsc` at our store and select the operator.
    async fn select(&self, operator: &OperatorName) -> Result<(), ResolverError> {
        let store = self.store_dir.to_string_lossy();
        self.run(&["env", "-s", &store]).await?;
        self.run(&["env", "-o", operator.as_str()]).await
    }
}

#[async_trait]
impl AccountResolver for NscResolver {
    async fn push(&self, operator: &OperatorName) -> Result<(), ResolverError> {
        self.select(operator).await?;
        self.run(&["push", "-A", "--diff"]).await
    }

    async fn pull(&self, operator: &OperatorName) -> Result<(), ResolverError> {
        self.select(operator).await?;
        self.run(&["pull", "-A"]).await
    }
}
