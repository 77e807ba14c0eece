//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use natsctl::{AccountResolver, Ctl, CtlConfig, Layout, ResolverError, SyncDirection};
use natsctl_core::{AccountName, OperatorName, RoleName, UserName};
use natsctl_store::FsClaimStore;
use natsctl_vault::{MasterIdentity, StaticSecret, Unlocker};

pub const OPERATOR: &str = "ROOT_TEST";
pub const ACCOUNT: &str = "APP";
pub const ROLE: &str = "worker";
pub const USER: &str = "worker-1";

pub fn operator() -> OperatorName {
    OperatorName::new(OPERATOR).unwrap()
}

pub fn account() -> AccountName {
    AccountName::new(ACCOUNT).unwrap()
}

pub fn role() -> RoleName {
    RoleName::new(ROLE).unwrap()
}

pub fn user() -> UserName {
    UserName::new(USER).unwrap()
}

/// A freshly generated master secret.
pub fn master_secret() -> StaticSecret {
    StaticSecret::new(MasterIdentity::generate().to_secret_string().as_str())
}

/// One call the [`FakeResolver`] received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverCall {
    pub operator: OperatorName,
    pub direction: SyncDirection,
    /// Plaintext `.nk` files present below the vault while the call ran.
    pub plaintext_keys: usize,
}

/// Resolver that records calls instead of running `nsc`.
pub struct FakeResolver {
    nkeys_dir: PathBuf,
    fail: bool,
    calls: Arc<Mutex<Vec<ResolverCall>>>,
}

impl FakeResolver {
    pub fn new(layout: &Layout, fail: bool) -> (Self, Arc<Mutex<Vec<ResolverCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let resolver = Self {
            nkeys_dir: layout.nkeys_dir(),
            fail,
            calls: calls.clone(),
        };
        (resolver, calls)
    }

    fn record(&self, operator: &OperatorName, direction: SyncDirection) -> Result<(), ResolverError> {
        self.calls.lock().unwrap().push(ResolverCall {
            operator: operator.clone(),
            direction,
            plaintext_keys: count_plaintext_keys(&self.nkeys_dir),
        });
        if self.fail {
            return Err(ResolverError::Failed {
                command: format!("nsc {direction}"),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AccountResolver for FakeResolver {
    async fn push(&self, operator: &OperatorName) -> Result<(), ResolverError> {
        self.record(operator, SyncDirection::Push)
    }

    async fn pull(&self, operator: &OperatorName) -> Result<(), ResolverError> {
        self.record(operator, SyncDirection::Pull)
    }
}

/// A working root in a temporary directory with a filesystem claim store.
pub struct TestFixture {
    dir: tempfile::TempDir,
    pub ctl: Ctl<FsClaimStore>,
    pub resolver_calls: Arc<Mutex<Vec<ResolverCall>>>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// A fixture whose resolver fails every call.
    pub fn with_failing_resolver() -> Self {
        Self::build(true)
    }

    fn build(fail: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().join("nsc"));
        let (resolver, resolver_calls) = FakeResolver::new(&layout, fail);
        let ctl = Ctl::new(
            layout.clone(),
            FsClaimStore::new(layout.store_dir()),
            Unlocker::new(Box::new(master_secret())),
            Box::new(resolver),
            CtlConfig {
                nats_context_dir: Some(dir.path().join("nats/context")),
                ..CtlConfig::default()
            },
        );
        Self {
            dir,
            ctl,
            resolver_calls,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where `nats` CLI contexts are written.
    pub fn contexts(&self) -> PathBuf {
        self.dir.path().join("nats/context")
    }

    /// Every file below the fixture directory, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(self.dir.path(), &mut files);
        files.sort();
        files
    }

    pub fn plaintext_keys(&self) -> usize {
        count_plaintext_keys(&self.ctl.layout().nkeys_dir())
    }

    /// Bootstrap the operator and account of the standard scenario.
    pub async fn with_account(mut self) -> Self {
        self.ctl
            .init_operator(&operator(), "tls://nats.example.com:4222", None)
            .await
            .unwrap();
        self.ctl
            .upsert_account(&operator(), &account(), Some("application".to_string()))
            .await
            .unwrap();
        self
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files);
        } else {
            files.push(path);
        }
    }
}

/// Number of plaintext `.nk` files below `dir`.
pub fn count_plaintext_keys(dir: &Path) -> usize {
    let mut files = Vec::new();
    collect_files(dir, &mut files);
    files
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "nk"))
        .count()
}
