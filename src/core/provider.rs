//! Mock bank provider
//!
//! Serves programmable external-account snapshots for tests and demos; a
//! real bank integration implements the same [`Provider`] contract over its
//! wire client.

use crate::core::traits::Provider;
use crate::types::{Balance, ExternalAccount, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// A provider with fixed, programmable external accounts
///
/// Balances can be updated between calls to simulate the bank side moving,
/// and accounts can be removed to exercise not-found handling.
pub struct MockProvider {
    id: String,
    accounts: RwLock<HashMap<String, (String, Balance)>>,
}

impl MockProvider {
    /// Create an empty mock provider with the given integration ID
    pub fn new(id: impl Into<String>) -> Self {
        MockProvider {
            id: id.into(),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace an external account
    pub fn set_account(&self, external_id: impl Into<String>, name: impl Into<String>, balance: Balance) {
        let mut accounts = self.accounts.write().unwrap();
        accounts.insert(external_id.into(), (name.into(), balance));
    }

    /// Update the balance of an existing external account
    pub fn set_balance(&self, external_id: &str, balance: Balance) {
        let mut accounts = self.accounts.write().unwrap();
        if let Some((_, stored)) = accounts.get_mut(external_id) {
            *stored = balance;
        }
    }

    /// Remove an external account (for testing not-found handling)
    pub fn remove_account(&self, external_id: &str) {
        let mut accounts = self.accounts.write().unwrap();
        accounts.remove(external_id);
    }

    fn snapshot(
        &self,
        external_id: &str,
        name: &str,
        balance: Balance,
        sync_time: DateTime<Utc>,
    ) -> ExternalAccount {
        ExternalAccount {
            id: external_id.to_string(),
            name: name.to_string(),
            integration_id: self.id.clone(),
            last_sync_timestamp: sync_time,
            balance,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_external_accounts(
        &self,
        sync_time: DateTime<Utc>,
    ) -> Result<Vec<ExternalAccount>, ProviderError> {
        let accounts = self.accounts.read().unwrap();
        let mut snapshots: Vec<ExternalAccount> = accounts
            .iter()
            .map(|(external_id, (name, balance))| {
                self.snapshot(external_id, name, *balance, sync_time)
            })
            .collect();
        // Deterministic order for callers and tests.
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshots)
    }

    async fn get_external_account(
        &self,
        sync_time: DateTime<Utc>,
        external_id: &str,
    ) -> Result<ExternalAccount, ProviderError> {
        let accounts = self.accounts.read().unwrap();
        accounts
            .get(external_id)
            .map(|(name, balance)| self.snapshot(external_id, name, *balance, sync_time))
            .ok_or_else(|| ProviderError::ExternalAccountNotFound {
                external_id: external_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_returns_configured_account() {
        let provider = MockProvider::new("starling");
        provider.set_account("ext-1", "Personal", Balance::new(1000, 900));

        let now = Utc::now();
        let account = provider.get_external_account(now, "ext-1").await.unwrap();
        assert_eq!(account.id, "ext-1");
        assert_eq!(account.name, "Personal");
        assert_eq!(account.integration_id, "starling");
        assert_eq!(account.last_sync_timestamp, now);
        assert_eq!(account.balance, Balance::new(1000, 900));
    }

    #[tokio::test]
    async fn test_mock_provider_unknown_account() {
        let provider = MockProvider::new("starling");

        let result = provider.get_external_account(Utc::now(), "missing").await;
        assert!(matches!(
            result,
            Err(ProviderError::ExternalAccountNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_provider_lists_accounts_in_id_order() {
        let provider = MockProvider::new("starling");
        provider.set_account("ext-2", "Savings", Balance::new(2000, 2000));
        provider.set_account("ext-1", "Personal", Balance::new(1000, 900));

        let accounts = provider.get_external_accounts(Utc::now()).await.unwrap();
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["ext-1", "ext-2"]);
    }

    #[tokio::test]
    async fn test_mock_provider_balance_can_move() {
        let provider = MockProvider::new("starling");
        provider.set_account("ext-1", "Personal", Balance::new(1000, 1000));
        provider.set_balance("ext-1", Balance::new(900, 900));

        let account = provider
            .get_external_account(Utc::now(), "ext-1")
            .await
            .unwrap();
        assert_eq!(account.balance, Balance::new(900, 900));
    }
}
