//! ClaimStore trait: the abstract interface for claim persistence.
//!
//! Implementations store signed tokens verbatim; decoding and signing live in
//! [`ClaimStoreExt`] so every backend verifies the same way.

use async_trait::async_trait;

use natsctl_core::{
    AccountClaims, AccountName, Claims, ClaimBody, KeyPair, OperatorClaims, OperatorName,
};

use crate::error::{Result, StoreError};

/// Raw token storage, one token per operator and per account.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn read_operator_token(&self, operator: &OperatorName) -> Result<Option<String>>;

    async fn write_operator_token(&self, operator: &OperatorName, token: &str) -> Result<()>;

    async fn read_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<Option<String>>;

    async fn write_account_token(
        &self,
        operator: &OperatorName,
        account: &AccountName,
        token: &str,
    ) -> Result<()>;

    /// Existence check without parsing.
    async fn account_exists(&self, operator: &OperatorName, account: &AccountName) -> Result<bool>;

    /// Known operators, in no particular order.
    async fn list_operators(&self) -> Result<Vec<OperatorName>>;

    /// Accounts of an operator, in no particular order.
    async fn list_accounts(&self, operator: &OperatorName) -> Result<Vec<AccountName>>;
}

/// Typed, verified access on top of [`ClaimStore`].
pub trait ClaimStoreExt: ClaimStore {
    /// Read and verify an operator's claims.
    fn read_operator(
        &self,
        operator: &OperatorName,
    ) -> impl std::future::Future<Output = Result<OperatorClaims>> + Send;

    /// Read and verify an account's claims.
    fn read_account(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> impl std::future::Future<Output = Result<AccountClaims>> + Send;

    /// Sign and store operator claims. Returns the token.
    fn write_operator(
        &self,
        operator: &OperatorName,
        claims: &mut OperatorClaims,
        signer: &KeyPair,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Sign and store account claims under the account's `name`. Returns the token.
    fn write_account(
        &self,
        operator: &OperatorName,
        claims: &mut AccountClaims,
        signer: &KeyPair,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl<S: ClaimStore + ?Sized> ClaimStoreExt for S {
    async fn read_operator(&self, operator: &OperatorName) -> Result<OperatorClaims> {
        let token = self
            .read_operator_token(operator)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "operator",
                name: operator.to_string(),
            })?;
        decode("operator", operator.as_str(), &token)
    }

    async fn read_account(
        &self,
        operator: &OperatorName,
        account: &AccountName,
    ) -> Result<AccountClaims> {
        let name = format!("{operator}/{account}");
        let token = self
            .read_account_token(operator, account)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "account",
                name: name.clone(),
            })?;
        decode("account", &name, &token)
    }

    async fn write_operator(
        &self,
        operator: &OperatorName,
        claims: &mut OperatorClaims,
        signer: &KeyPair,
    ) -> Result<String> {
        let token = claims.encode(signer)?;
        self.write_operator_token(operator, &token).await?;
        tracing::debug!(%operator, "operator claims written");
        Ok(token)
    }

    async fn write_account(
        &self,
        operator: &OperatorName,
        claims: &mut AccountClaims,
        signer: &KeyPair,
    ) -> Result<String> {
        let account = AccountName::new(claims.name.clone())?;
        let token = claims.encode(signer)?;
        self.write_account_token(operator, &account, &token).await?;
        tracing::debug!(%operator, %account, "account claims written");
        Ok(token)
    }
}

fn decode<T: ClaimBody>(kind: &'static str, name: &str, token: &str) -> Result<Claims<T>> {
    Claims::<T>::decode(token).map_err(|source| StoreError::Corrupt {
        kind,
        name: name.to_string(),
        source,
    })
}
