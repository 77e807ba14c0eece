//! Local configuration (`natsctl.json`) and the working directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use natsctl_core::OperatorName;
use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

/// Name of the configuration file, looked up in the current directory.
pub const CONFIG_FILE: &str = "natsctl.json";

/// Environment variable holding the master secret.
pub const MASTER_KEY_ENV: &str = "MASTER_KEY";

const DEFAULT_ROOT: &str = "nsc";

/// Where the master secret comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MasterPasswordConfig {
    /// Read from an environment variable.
    EnvVar {
        #[serde(default = "default_variable")]
        variable: String,
    },
    /// Looked up with the Bitwarden CLI by entry name.
    Bitwarden {
        #[serde(rename = "bitwardenVaultEntryName")]
        entry_name: String,
    },
}

fn default_variable() -> String {
    MASTER_KEY_ENV.to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

impl Default for MasterPasswordConfig {
    fn default() -> Self {
        MasterPasswordConfig::EnvVar {
            variable: default_variable(),
        }
    }
}

/// Contents of `natsctl.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Working root, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    pub master_password: MasterPasswordConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            master_password: MasterPasswordConfig::default(),
        }
    }
}

impl Config {
    /// Load `natsctl.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CtlError::Configuration(format!(
                    "{} not found; run `natsctl config-init` first",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| {
            CtlError::Configuration(format!("malformed JSON in {}: {e}", path.display()))
        })
    }

    /// Write the configuration to `dir`. Refuses to overwrite an existing file.
    pub fn write_new(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Err(CtlError::Configuration(format!(
                "{} already exists",
                path.display()
            )));
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CtlError::Configuration(e.to_string()))?;
        fs::write(&path, json + "\n")?;
        tracing::info!(path = %path.display(), "configuration written");
        Ok(path)
    }

    /// The layout of the working root, resolved against `dir`.
    pub fn layout(&self, dir: &Path) -> Layout {
        Layout::new(dir.join(&self.root))
    }
}

/// Paths below the working root.
///
/// ```text
/// store/<operator>/<operator>.jwt
/// store/<operator>/accounts/<account>/<account>.jwt
/// nkeys/keys/<c1>/<c2-3>/<public key>.nk.age
/// nkeys/creds/<operator>/<account>/<user>.creds
/// home/                          nsc state
/// config-<operator>.cfg          bootstrap server configuration
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    pub fn nkeys_dir(&self) -> PathBuf {
        self.root.join("nkeys")
    }

    pub fn nsc_home(&self) -> PathBuf {
        self.root.join("home")
    }

    pub fn server_config_path(&self, operator: &OperatorName) -> PathBuf {
        self.root.join(format!("config-{operator}.cfg"))
    }
}
