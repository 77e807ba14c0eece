//! Master secret acquisition.
//!
//! A [`SecretSource`] fetches the master secret text from somewhere (an
//! environment variable, a password manager). The [`Unlocker`] asks its source
//! once per run and hands out a cheap, cloneable [`MasterSecretHandle`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::identity::{parse_identities, MasterIdentity, Recipient};

/// Where the master secret comes from.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Short human readable name, used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch the secret. `Ok(None)` means this source has nothing to offer.
    async fn fetch(&self) -> Result<Option<Zeroizing<String>>>;
}

/// Ordered list of sources; the first non-empty value wins.
pub struct SecretChain {
    sources: Vec<Box<dyn SecretSource>>,
}

impl SecretChain {
    pub fn new(sources: Vec<Box<dyn SecretSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SecretSource for SecretChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
        for source in &self.sources {
            match source.fetch().await {
                Ok(Some(secret)) if !secret.trim().is_empty() => {
                    tracing::debug!(source = source.name(), "master secret loaded");
                    return Ok(Some(secret));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "secret source failed");
                }
            }
        }
        Ok(None)
    }
}

/// A fixed secret, for tests and for secrets already in memory.
pub struct StaticSecret(Zeroizing<String>);

impl StaticSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }
}

#[async_trait]
impl SecretSource for StaticSecret {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(Some(self.0.clone()))
    }
}

/// The loaded master secret.
///
/// Cloning shares the same buffer, which is zeroized when the last clone drops.
#[derive(Clone)]
pub struct MasterSecretHandle(Arc<Zeroizing<String>>);

impl MasterSecretHandle {
    pub fn new(secret: Zeroizing<String>) -> Self {
        Self(Arc::new(secret))
    }

    /// Parse the identities in the secret.
    pub fn identities(&self) -> Result<Vec<MasterIdentity>> {
        parse_identities(&self.0)
    }

    /// Recipients derived from every identity.
    pub fn recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.identities()?.iter().map(MasterIdentity::recipient).collect())
    }
}

impl fmt::Debug for MasterSecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecretHandle(<redacted>)")
    }
}

/// Loads the master secret on first use and caches it for the run.
pub struct Unlocker {
    source: Box<dyn SecretSource>,
    handle: Option<MasterSecretHandle>,
}

impl Unlocker {
    pub fn new(source: Box<dyn SecretSource>) -> Self {
        Self {
            source,
            handle: None,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.handle.is_some()
    }

    /// Return the cached handle, fetching it from the source the first time.
    pub async fn unlock(&mut self) -> Result<MasterSecretHandle> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        let secret = self
            .source
            .fetch()
            .await?
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| {
                VaultError::SecretUnavailable(format!(
                    "{} did not provide a master secret",
                    self.source.name()
                ))
            })?;

        tracing::info!("vault unlocked");
        let handle = MasterSecretHandle::new(secret);
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        value: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecretSource for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.map(|v| Zeroizing::new(v.to_string())))
        }
    }

    struct Failing;

    #[async_trait]
    impl SecretSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch(&self) -> Result<Option<Zeroizing<String>>> {
            Err(VaultError::SecretUnavailable("locked".to_string()))
        }
    }

    fn counting(value: Option<&'static str>) -> (Box<dyn SecretSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Counting {
            value,
            calls: calls.clone(),
        };
        (Box::new(source), calls)
    }

    #[tokio::test]
    async fn unlock_caches_the_handle() {
        let (source, calls) = counting(Some("AGE-SECRET-KEY-1X"));
        let mut unlocker = Unlocker::new(source);
        assert!(!unlocker.is_unlocked());

        unlocker.unlock().await.unwrap();
        unlocker.unlock().await.unwrap();

        assert!(unlocker.is_unlocked());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_source_is_unavailable() {
        let (source, _) = counting(None);
        let mut unlocker = Unlocker::new(source);
        assert!(matches!(
            unlocker.unlock().await,
            Err(VaultError::SecretUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn chain_takes_first_non_empty_value() {
        let (empty, empty_calls) = counting(Some("  "));
        let (primary, _) = counting(Some("primary"));
        let (fallback, fallback_calls) = counting(Some("fallback"));
        let chain = SecretChain::new(vec![empty, Box::new(Failing), primary, fallback]);

        let secret = chain.fetch().await.unwrap().unwrap();
        assert_eq!(secret.as_str(), "primary");
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_of_nothing_yields_none() {
        let (a, _) = counting(None);
        let chain = SecretChain::new(vec![a, Box::new(Failing)]);
        assert!(chain.fetch().await.unwrap().is_none());
    }

    #[test]
    fn handle_debug_is_redacted() {
        let handle = MasterSecretHandle::new(Zeroizing::new("AGE-SECRET-KEY-1X".into()));
        assert_eq!(format!("{handle:?}"), "MasterSecretHandle(<redacted>)");
    }

    #[test]
    fn handle_with_garbage_has_no_identities() {
        let handle = MasterSecretHandle::new(Zeroizing::new("password".into()));
        assert!(handle.identities().is_err());
    }
}
