//! Credential bundle storage.
//!
//! Bundles live at `<root>/creds/<operator>/<account>/<user>.creds` and are
//! readable by the owner only.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use natsctl_core::{format_user_config, AccountName, OperatorName, UserName};

use crate::error::Result;

/// Writes `.creds` files under a root (usually `<working root>/nkeys`).
#[derive(Debug, Clone)]
pub struct CredsStore {
    root: PathBuf,
}

impl CredsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, operator: &OperatorName, account: &AccountName, user: &UserName) -> PathBuf {
        self.root
            .join("creds")
            .join(operator)
            .join(account)
            .join(format!("{user}.creds"))
    }

    /// Write a bundle with the user's token and seed, replacing any previous one.
    pub fn write(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        user: &UserName,
        jwt: &str,
        seed: &str,
    ) -> Result<PathBuf> {
        let path = self.path(operator, account, user);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_owner_only(&path, format_user_config(jwt, seed).as_bytes())?;
        tracing::info!(path = %path.display(), "credentials written");
        Ok(path)
    }
}

fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mut f = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // mode() only applies on creation
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        f.write_all(contents)?;
        f.flush()
    }

    #[cfg(not(unix))]
    {
        let mut f = fs::File::create(path)?;
        f.write_all(contents)?;
        f.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natsctl_core::parse_user_config;

    fn names() -> (OperatorName, AccountName, UserName) {
        (
            OperatorName::new("OP").unwrap(),
            AccountName::new("APP").unwrap(),
            UserName::new("worker-1").unwrap(),
        )
    }

    #[test]
    fn bundle_path_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredsStore::new(dir.path());
        let (op, acc, user) = names();

        let path = store.write(&op, &acc, &user, "a.b.c", "SUSEED").unwrap();
        assert_eq!(path, dir.path().join("creds/OP/APP/worker-1.creds"));

        let parsed = parse_user_config(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.jwt, "a.b.c");
        assert_eq!(parsed.seed.as_str(), "SUSEED");
    }

    #[cfg(unix)]
    #[test]
    fn bundle_is_owner_only_even_when_replacing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CredsStore::new(dir.path());
        let (op, acc, user) = names();

        let path = store.path(&op, &acc, &user);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        store.write(&op, &acc, &user, "a.b.c", "SUSEED").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
