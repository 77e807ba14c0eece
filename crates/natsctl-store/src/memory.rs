//! In-memory implementation of the ClaimStore trait.
//!
//! This is primarily for testing. All data is lost when the store is dropped.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use natsctl_core::{AccountName, OperatorName};

use crate::error::Result;
use crate::traits::ClaimStore;

/// In-memory claim store. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryClaimStore {
    inner: RwLock<MemoryClaimStoreInner>,
}

#[derive(Default)]
struct MemoryClaimStoreInner {
    operators: HashMap<OperatorName, String>,
    accounts: HashMap<(OperatorName, AccountName), String>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn read_operator_token(&self, operator: &OperatorName) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.operators.get(operator).cloned())
    }

    async fn write_operator_token(&self, operator: &OperatorName, token: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.operators.insert(operator.clone(), token.to_string());
        Ok(())
    }

    async fn read_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<Option<String>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .accounts
            .get(&(operator.clone(), account.clone()))
            .cloned())
    }

    async fn write_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        token: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .accounts
            .insert((operator.clone(), account.clone()), token.to_string());
        Ok(())
    }

    async fn account_exists(&self, operator: &OperatorName, account: &AccountName) -> Result<bool> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .accounts
            .contains_key(&(operator.clone(), account.clone())))
    }

    async fn list_operators(&self) -> Result<Vec<OperatorName>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.operators.keys().cloned().collect())
    }

    async fn list_accounts(&self, operator: &OperatorName) -> Result<Vec<AccountName>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .accounts
            .keys()
            .filter(|(op, _)| op == operator)
            .map(|(_, account)| account.clone())
            .collect())
    }
}
