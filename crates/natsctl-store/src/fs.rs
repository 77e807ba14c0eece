//! Filesystem claim store in the canonical `nsc` layout.
//!
//! ```text
//! <root>/<operator>/<operator>.jwt
//! <root>/<operator>/accounts/<account>/<account>.jwt
//! ```

use async_trait::async_trait;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use natsctl_core::{AccountName, OperatorName};

use crate::error::Result;
use crate::traits::ClaimStore;

/// Claim store rooted at a directory (usually `<working root>/store`).
#[derive(Debug, Clone)]
pub struct FsClaimStore {
    root: PathBuf,
}

impl FsClaimStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn operator_path(&self, operator: &OperatorName) -> PathBuf {
        self.root
            .join(operator)
            .join(format!("{operator}.jwt"))
    }

    pub fn account_path(&self, operator: &OperatorName, account: &AccountName) -> PathBuf {
        self.root
            .join(operator)
            .join("accounts")
            .join(account)
            .join(format!("{account}.jwt"))
    }
}

#[async_trait]
impl ClaimStore for FsClaimStore {
    async fn read_operator_token(&self, operator: &OperatorName) -> Result<Option<String>> {
        read_optional(&self.operator_path(operator))
    }

    async fn write_operator_token(&self, operator: &OperatorName, token: &str) -> Result<()> {
        write_token(&self.operator_path(operator), token)
    }

    async fn read_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<Option<String>> {
        read_optional(&self.account_path(operator, account))
    }

    async fn write_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        token: &str,
    ) -> Result<()> {
        write_token(&self.account_path(operator, account), token)
    }

    async fn account_exists(&self, operator: &OperatorName, account: &AccountName) -> Result<bool> {
        Ok(self.account_path(operator, account).is_file())
    }

    async fn list_operators(&self) -> Result<Vec<OperatorName>> {
        list_dirs(&self.root, |name| Ok(self.operator_path(&OperatorName::new(name)?)))
    }

    async fn list_accounts(&self, operator: &OperatorName) -> Result<Vec<AccountName>> {
        let dir = self.root.join(operator).join("accounts");
        list_dirs(&dir, |name| Ok(self.account_path(operator, &AccountName::new(name)?)))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(token) => Ok(Some(token)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` atomically so readers never see a partial token.
fn write_token(path: &Path, token: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(token.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Names of subdirectories of `dir` whose claim file (per `claim_path`) exists.
fn list_dirs<N>(dir: &Path, claim_path: impl Fn(&str) -> Result<PathBuf>) -> Result<Vec<N>>
where
    N: std::str::FromStr,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        match claim_path(&name) {
            Ok(path) if path.is_file() => {
                if let Ok(parsed) = name.parse() {
                    names.push(parsed);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(dir = %dir.display(), %name, error = %e, "skipping entry"),
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ClaimStoreExt;
    use crate::StoreError;
    use natsctl_core::{AccountClaims, KeyKind, KeyPair, OperatorClaims};

    fn op(name: &str) -> OperatorName {
        OperatorName::new(name).unwrap()
    }

    fn acc(name: &str) -> AccountName {
        AccountName::new(name).unwrap()
    }

    #[tokio::test]
    async fn layout_matches_nsc() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClaimStore::new(dir.path());
        let operator_key = KeyPair::generate(KeyKind::Operator);

        let mut operator = OperatorClaims::new(&operator_key.public_key(), "OP");
        store.write_operator(&op("OP"), &mut operator, &operator_key).await.unwrap();
        let mut account = AccountClaims::new(&KeyPair::generate(KeyKind::Account).public_key(), "APP");
        store.write_account(&op("OP"), &mut account, &operator_key).await.unwrap();

        assert!(dir.path().join("OP/OP.jwt").is_file());
        assert!(dir.path().join("OP/accounts/APP/APP.jwt").is_file());
        assert!(store.account_exists(&op("OP"), &acc("APP")).await.unwrap());
        assert!(!store.account_exists(&op("OP"), &acc("NOPE")).await.unwrap());
    }

    #[tokio::test]
    async fn read_back_verified_claims() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClaimStore::new(dir.path());
        let signer = KeyPair::generate(KeyKind::Operator);

        let mut account = AccountClaims::new(&KeyPair::generate(KeyKind::Account).public_key(), "APP");
        account.nats.description = Some("application".into());
        store.write_account(&op("OP"), &mut account, &signer).await.unwrap();

        let read = store.read_account(&op("OP"), &acc("APP")).await.unwrap();
        assert_eq!(read, account);
    }

    #[tokio::test]
    async fn missing_and_corrupt_claims() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClaimStore::new(dir.path());

        assert!(matches!(
            store.read_operator(&op("OP")).await,
            Err(StoreError::NotFound { kind: "operator", .. })
        ));

        fs::create_dir_all(dir.path().join("OP")).unwrap();
        fs::write(dir.path().join("OP/OP.jwt"), "garbage").unwrap();
        assert!(matches!(
            store.read_operator(&op("OP")).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn listing_ignores_directories_without_claims() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClaimStore::new(dir.path());
        assert!(store.list_operators().await.unwrap().is_empty());

        let signer = KeyPair::generate(KeyKind::Operator);
        for name in ["A", "B"] {
            let mut claims = OperatorClaims::new(&signer.public_key(), name);
            store.write_operator(&op(name), &mut claims, &signer).await.unwrap();
        }
        fs::create_dir_all(dir.path().join("stray")).unwrap();

        let mut operators = store.list_operators().await.unwrap();
        operators.sort();
        assert_eq!(operators, vec![op("A"), op("B")]);
        assert!(store.list_accounts(&op("A")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rewriting_a_token_leaves_only_the_claim_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsClaimStore::new(dir.path());

        store.write_account_token(&op("OP"), &acc("APP"), "first").await.unwrap();
        store.write_account_token(&op("OP"), &acc("APP"), "second").await.unwrap();

        let path = store.account_path(&op("OP"), &acc("APP"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("APP.jwt")]);
    }
}
