//! Master secret sources backed by the process environment and Bitwarden.

use std::process::Stdio;

use async_trait::async_trait;
use natsctl_vault::{Result, SecretChain, SecretSource, VaultError};
use tokio::process::Command;
use zeroize::Zeroizing;

use crate::config::{MasterPasswordConfig, MASTER_KEY_ENV};

const BW_SESSION_ENV: &str = "BW_SESSION";

/// Reads the secret from an environment variable. Unset or empty means none.
pub struct EnvSecret {
    variable: String,
}

impl EnvSecret {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

#[async_trait]
impl SecretSource for EnvSecret {
    fn name(&self) -> &str {
        &self.variable
    }

    async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(std::env::var(&self.variable)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Zeroizing::new))
    }
}

/// Fetches the secret as the password of a Bitwarden vault entry via `bw`.
///
/// An existing `BW_SESSION` is reused; otherwise `bw unlock --raw` runs
/// interactively on the terminal to obtain one.
pub struct BitwardenSecret {
    entry_name: String,
}

impl BitwardenSecret {
    pub fn new(entry_name: impl Into<String>) -> Self {
        Self {
            entry_name: entry_name.into(),
        }
    }

    async fn session(&self) -> Result<Zeroizing<String>> {
        if let Ok(session) = std::env::var(BW_SESSION_ENV) {
            if !session.is_empty() {
                return Ok(Zeroizing::new(session));
            }
        }

        tracing::info!("unlocking Bitwarden vault");
        let output = Command::new("bw")
            .args(["unlock", "--raw"])
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| VaultError::SecretUnavailable(format!("failed to run bw: {e}")))?;
        if !output.status.success() {
            return Err(VaultError::SecretUnavailable(format!(
                "bw unlock exited with {}",
                output.status
            )));
        }
        stdout_text(output.stdout)
    }
}

#[async_trait]
impl SecretSource for BitwardenSecret {
    fn name(&self) -> &str {
        "bitwarden"
    }

    async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
        let session = self.session().await?;
        let output = Command::new("bw")
            .args(["get", "password", &self.entry_name])
            .env(BW_SESSION_ENV, session.as_str())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| VaultError::SecretUnavailable(format!("failed to run bw: {e}")))?;
        if !output.status.success() {
            return Err(VaultError::SecretUnavailable(format!(
                "bw get password {:?} exited with {}",
                self.entry_name, output.status
            )));
        }
        let secret = stdout_text(output.stdout)?;
        Ok((!secret.is_empty()).then_some(secret))
    }
}

fn stdout_text(stdout: Vec<u8>) -> Result<Zeroizing<String>> {
    let stdout = Zeroizing::new(stdout);
    let text = std::str::from_utf8(&stdout)
        .map_err(|_| VaultError::SecretUnavailable("bw output is not UTF-8".to_string()))?;
    Ok(Zeroizing::new(text.trim().to_string()))
}

/// The configured source, falling back to `MASTER_KEY` from the environment.
pub fn secret_source(config: &MasterPasswordConfig) -> Box<dyn SecretSource> {
    let mut sources: Vec<Box<dyn SecretSource>> = Vec::new();
    match config {
        MasterPasswordConfig::EnvVar { variable } => {
            sources.push(Box::new(EnvSecret::new(variable.clone())));
            if variable != MASTER_KEY_ENV {
                sources.push(Box::new(EnvSecret::new(MASTER_KEY_ENV)));
            }
        }
        MasterPasswordConfig::Bitwarden { entry_name } => {
            sources.push(Box::new(BitwardenSecret::new(entry_name.clone())));
            sources.push(Box::new(EnvSecret::new(MASTER_KEY_ENV)));
        }
    }
    Box::new(SecretChain::new(sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_secret_reads_variable() {
        std::env::set_var("NATSCTL_TEST_SECRET_SET", "AGE-SECRET-KEY-1ABC");
        let secret = EnvSecret::new("NATSCTL_TEST_SECRET_SET")
            .fetch()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(secret.as_str(), "AGE-SECRET-KEY-1ABC");
    }

    #[tokio::test]
    async fn blank_env_secret_is_none() {
        std::env::set_var("NATSCTL_TEST_SECRET_BLANK", "  ");
        assert!(EnvSecret::new("NATSCTL_TEST_SECRET_BLANK")
            .fetch()
            .await
            .unwrap()
            .is_none());
        assert!(EnvSecret::new("NATSCTL_TEST_SECRET_UNSET")
            .fetch()
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn configured_variable_wins_over_fallback() {
        std::env::set_var("NATSCTL_TEST_SECRET_PRIMARY", "primary");
        let source = secret_source(&MasterPasswordConfig::EnvVar {
            variable: "NATSCTL_TEST_SECRET_PRIMARY".into(),
        });
        assert_eq!(source.fetch().await.unwrap().unwrap().as_str(), "primary");
    }
}
