//! `nats` CLI contexts for issued credentials.
//!
//! A context is a JSON file in the `nats` CLI context directory naming the
//! servers and the creds file to connect with:
//!
//! ```text
//! ~/.config/nats/context/<operator>_<account>_<user>.json
//! ~/.config/nats/context.txt            selected context
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use natsctl_core::{AccountName, OperatorName, UserName};
use serde::{Deserialize, Serialize};

use crate::error::{CtlError, Result};

const SELECTED_CONTEXT_FILE: &str = "context.txt";

/// The subset of a `nats` context natsctl fills in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsContext {
    #[serde(default)]
    pub description: String,
    /// Comma separated server URLs.
    pub url: String,
    pub creds: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbox_prefix: Option<String>,
}

pub fn context_name(operator: &OperatorName, account: &AccountName, user: &UserName) -> String {
    format!("{operator}_{account}_{user}")
}

/// `$XDG_CONFIG_HOME/nats/context`, else `$HOME/.config/nats/context`.
pub fn default_context_dir() -> Option<PathBuf> {
    let non_empty = |name: &str| std::env::var_os(name).filter(|value| !value.is_empty());
    non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|config| config.join("nats").join("context"))
}

impl NatsContext {
    /// Write the context as `<dir>/<name>.json`, replacing an older one.
    pub fn write(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CtlError::Configuration(e.to_string()))?;
        fs::write(&path, json + "\n")?;
        tracing::info!(context = name, path = %path.display(), "nats context written");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            CtlError::Configuration(format!("malformed nats context {}: {e}", path.display()))
        })
    }
}

/// Make `name` the context `nats` uses when none is given.
pub fn select_context(dir: &Path, name: &str) -> Result<()> {
    let parent = dir.parent().ok_or_else(|| {
        CtlError::Configuration(format!("{} has no parent directory", dir.display()))
    })?;
    fs::create_dir_all(parent)?;
    fs::write(parent.join(SELECTED_CONTEXT_FILE), name)?;
    tracing::info!(context = name, "nats context selected");
    Ok(())
}

/// The context currently selected in the directory above `dir`.
pub fn selected_context(dir: &Path) -> Option<String> {
    let parent = dir.parent()?;
    fs::read_to_string(parent.join(SELECTED_CONTEXT_FILE))
        .ok()
        .map(|name| name.trim().to_string())
}
