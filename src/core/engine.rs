//! Budget engine
//!
//! This module provides the `BudgetEngine` that orchestrates ledger
//! commands over the versioned store and the registered bank providers.
//!
//! The engine enforces the business rules:
//! - batch validation before any persistence (referential integrity,
//!   payee-name uniqueness)
//! - internal transfers stored as balanced mirror pairs
//! - account supersession only through the close-then-insert protocol with
//!   a single per-unit timestamp
//! - reconciliation that never overwrites a disagreeing balance
//!
//! Every command is one atomic unit: begin, body, commit, with rollback on
//! any error. A rollback failure is reported together with the error that
//! triggered it.

use crate::core::traits::{Provider, Store, StoreSession, VersionedStore};
use crate::core::validation::{validate_payees, validate_transactions};
use crate::types::{
    Account, Entity, ExternalAccount, LedgerError, Payee, Transaction, VersionedRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Ledger command orchestrator
///
/// Generic over the store backend; providers are an explicit mapping from
/// integration ID to provider instance, supplied at construction time.
pub struct BudgetEngine<S: Store> {
    store: S,
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl<S: Store> BudgetEngine<S> {
    /// Create an engine over the given store and provider registry
    pub fn new(store: S, providers: HashMap<String, Arc<dyn Provider>>) -> Self {
        BudgetEngine { store, providers }
    }

    /// Create payees
    ///
    /// Validates that no requested name collides with an active payee, then
    /// persists a first version of every payee. All-or-nothing: on any
    /// validation failure no payee is persisted.
    pub async fn create_payees(&self, payees: Vec<Payee>) -> Result<Vec<Payee>, LedgerError> {
        debug!(payees = payees.len(), "creating payees");

        let mut session = self.store.begin().await?;
        match Self::create_payees_in(&mut session, payees).await {
            Ok(created) => {
                session.commit().await?;
                Ok(created)
            }
            Err(error) => Err(rollback_after(session, error).await),
        }
    }

    async fn create_payees_in(
        session: &mut S::Session,
        payees: Vec<Payee>,
    ) -> Result<Vec<Payee>, LedgerError> {
        validate_payees(session, &payees).await?;

        let now = session.now().await?;
        let records: Vec<VersionedRecord<Payee>> = payees
            .iter()
            .map(|payee| VersionedRecord::open(Uuid::new_v4().to_string(), now, payee.clone()))
            .collect();
        VersionedStore::<Payee>::insert(session, records).await?;
        Ok(payees)
    }

    /// Create accounts
    ///
    /// Persists a first version of every account in one atomic unit.
    pub async fn create_accounts(
        &self,
        accounts: Vec<Account>,
    ) -> Result<Vec<Account>, LedgerError> {
        debug!(accounts = accounts.len(), "creating accounts");

        let mut session = self.store.begin().await?;
        match Self::create_accounts_in(&mut session, accounts).await {
            Ok(created) => {
                session.commit().await?;
                Ok(created)
            }
            Err(error) => Err(rollback_after(session, error).await),
        }
    }

    async fn create_accounts_in(
        session: &mut S::Session,
        accounts: Vec<Account>,
    ) -> Result<Vec<Account>, LedgerError> {
        let now = session.now().await?;
        let records: Vec<VersionedRecord<Account>> = accounts
            .iter()
            .map(|account| VersionedRecord::open(Uuid::new_v4().to_string(), now, account.clone()))
            .collect();
        VersionedStore::<Account>::insert(session, records).await?;
        Ok(accounts)
    }

    /// Create transactions
    ///
    /// For every internal transfer in the batch, synthesizes the balancing
    /// mirror transaction and appends it before validation, so transfers
    /// are always stored as pairs that net to zero. Validation failures
    /// abort the whole batch; the returned vector includes the synthesized
    /// mirrors.
    pub async fn create_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        debug!(transactions = transactions.len(), "creating transactions");

        let mut session = self.store.begin().await?;
        match Self::create_transactions_in(&mut session, transactions).await {
            Ok(created) => {
                session.commit().await?;
                Ok(created)
            }
            Err(error) => Err(rollback_after(session, error).await),
        }
    }

    async fn create_transactions_in(
        session: &mut S::Session,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let transactions = append_mirror_transactions(transactions);
        validate_transactions(session, &transactions).await?;

        let now = session.now().await?;
        let records: Vec<VersionedRecord<Transaction>> = transactions
            .iter()
            .map(|transaction| {
                VersionedRecord::open(Uuid::new_v4().to_string(), now, transaction.clone())
            })
            .collect();
        VersionedStore::<Transaction>::insert(session, records).await?;
        // TODO: apply created transaction amounts to account balances.
        Ok(transactions)
    }

    /// List the current version of every account
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut session = self.store.begin().await?;
        match VersionedStore::<Account>::select_current(&mut session).await {
            Ok(records) => {
                session.commit().await?;
                Ok(records.into_iter().map(|record| record.record).collect())
            }
            Err(error) => Err(rollback_after(session, error.into()).await),
        }
    }

    /// List the current version of every payee
    pub async fn list_payees(&self) -> Result<Vec<Payee>, LedgerError> {
        let mut session = self.store.begin().await?;
        match VersionedStore::<Payee>::select_current(&mut session).await {
            Ok(records) => {
                session.commit().await?;
                Ok(records.into_iter().map(|record| record.record).collect())
            }
            Err(error) => Err(rollback_after(session, error.into()).await),
        }
    }

    /// List one account's current transactions, ordered by effective date
    /// then amount
    pub async fn list_transactions_by_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut session = self.store.begin().await?;
        match session.select_transactions_by_account(account_id).await {
            Ok(records) => {
                session.commit().await?;
                Ok(records.into_iter().map(|record| record.record).collect())
            }
            Err(error) => Err(rollback_after(session, error.into()).await),
        }
    }

    /// Reconcile one account against its external provider
    ///
    /// Reads the account's current version, fetches the linked external
    /// account's balance as of the unit's timestamp, and compares. On
    /// agreement, supersedes the current version with one whose external
    /// snapshot is refreshed; on disagreement, returns
    /// [`LedgerError::AccountSync`] and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account has no current version (`AccountNotFound`)
    /// - The account has no external link (`AccountNotLinked`); syncing it
    ///   is a no-op, not something to retry
    /// - No provider is registered for the link's integration
    /// - The provider call fails; transient failures propagate unchanged
    /// - The balances disagree (`AccountSync`)
    /// - Another writer superseded the account first (`WriteConflict`)
    pub async fn sync_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        info!(account_id, "syncing account");

        let mut session = self.store.begin().await?;
        match self.sync_account_in(&mut session, account_id).await {
            Ok(account) => {
                session.commit().await?;
                info!(account_id, "synced account");
                Ok(account)
            }
            Err(error) => Err(rollback_after(session, error).await),
        }
    }

    async fn sync_account_in(
        &self,
        session: &mut S::Session,
        account_id: &str,
    ) -> Result<Account, LedgerError> {
        let now = session.now().await?;

        let mut found =
            VersionedStore::<Account>::select_current_by_id(session, &[account_id.to_string()])
                .await?;
        let current = found
            .remove(account_id)
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;
        let account = current.record;

        let linked = match account.external_account.as_ref() {
            Some(linked) => linked,
            // Account is not linked, there is nothing to reconcile.
            None => {
                return Err(LedgerError::AccountNotLinked {
                    account_id: account_id.to_string(),
                })
            }
        };
        let provider =
            self.providers
                .get(&linked.integration_id)
                .ok_or_else(|| LedgerError::UnknownIntegration {
                    integration_id: linked.integration_id.clone(),
                })?;

        let external = provider.get_external_account(now, &linked.id).await?;
        if account.balance != external.balance {
            return Err(LedgerError::AccountSync {
                account_name: account.name.clone(),
                external_balance: external.balance,
                internal_balance: account.balance,
            });
        }

        // Supersede: close the current version and activate the refreshed
        // one under the same unit timestamp.
        let closed = VersionedStore::<Account>::close_current(session, account_id, now).await?;
        if !closed {
            return Err(LedgerError::WriteConflict {
                entity: Account::KIND,
                id: account_id.to_string(),
            });
        }

        let mut next = account;
        next.external_account = Some(ExternalAccount {
            last_sync_timestamp: now,
            ..external
        });
        let records: Vec<VersionedRecord<Account>> = vec![VersionedRecord::open(
            Uuid::new_v4().to_string(),
            now,
            next.clone(),
        )];
        VersionedStore::<Account>::insert(session, records).await?;
        Ok(next)
    }

    /// Load every account a provider knows as new internal accounts
    ///
    /// Each external account becomes a brand-new internal account (fresh
    /// ID, name derived from the provider's account name, balance copied,
    /// external link populated) inserted as a first version; there is no
    /// prior version to close.
    pub async fn load_accounts_from_provider(
        &self,
        integration_id: &str,
    ) -> Result<Vec<Account>, LedgerError> {
        let provider =
            self.providers
                .get(integration_id)
                .ok_or_else(|| LedgerError::UnknownIntegration {
                    integration_id: integration_id.to_string(),
                })?;
        info!(integration_id, "loading accounts from provider");

        let mut session = self.store.begin().await?;
        match Self::load_accounts_in(provider.as_ref(), &mut session).await {
            Ok(accounts) => {
                session.commit().await?;
                info!(
                    integration_id,
                    accounts = accounts.len(),
                    "loaded accounts from provider"
                );
                Ok(accounts)
            }
            Err(error) => Err(rollback_after(session, error).await),
        }
    }

    async fn load_accounts_in(
        provider: &dyn Provider,
        session: &mut S::Session,
    ) -> Result<Vec<Account>, LedgerError> {
        let now = session.now().await?;
        let external_accounts = provider.get_external_accounts(now).await?;

        let accounts: Vec<Account> = external_accounts
            .into_iter()
            .map(|external| Account {
                id: Uuid::new_v4().to_string(),
                name: format!("{} - {}", external.integration_id, external.name),
                balance: external.balance,
                external_account: Some(ExternalAccount {
                    last_sync_timestamp: now,
                    ..external
                }),
            })
            .collect();

        let records: Vec<VersionedRecord<Account>> = accounts
            .iter()
            .map(|account| VersionedRecord::open(Uuid::new_v4().to_string(), now, account.clone()))
            .collect();
        VersionedStore::<Account>::insert(session, records).await?;
        Ok(accounts)
    }
}

/// Append the balancing mirror for every internal transfer in the batch
///
/// Mirrors get fresh UUIDs; submitted transactions keep their position so
/// callers can correlate inputs with outputs.
fn append_mirror_transactions(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mirrors: Vec<Transaction> = transactions
        .iter()
        .filter(|transaction| transaction.is_payee_internal)
        .map(|transaction| transaction.mirror(Uuid::new_v4().to_string()))
        .collect();

    let mut all = transactions;
    all.extend(mirrors);
    all
}

/// Roll the unit back, surfacing a rollback failure alongside the original
/// error instead of swallowing either
async fn rollback_after<T: StoreSession>(session: T, source: LedgerError) -> LedgerError {
    match session.rollback().await {
        Ok(()) => source,
        Err(rollback) => LedgerError::Rollback {
            source: Box::new(source),
            rollback,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn transfer(account_id: &str, payee_id: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            account_id.to_string(),
            payee_id.to_string(),
            true,
            500,
            false,
        )
    }

    #[test]
    fn test_append_mirror_transactions_pairs_internal_transfers() {
        let transactions = vec![
            transfer("a-1", "a-2"),
            Transaction::new(
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                "a-1".to_string(),
                "p-1".to_string(),
                false,
                -250,
                true,
            ),
        ];
        let expanded = append_mirror_transactions(transactions.clone());

        // Only the internal transfer gains a mirror.
        assert_eq!(expanded.len(), 3);
        assert_eq!(&expanded[..2], &transactions[..]);

        let mirror = &expanded[2];
        assert_eq!(mirror.account_id, "a-2");
        assert_eq!(mirror.payee_id, "a-1");
        assert_eq!(mirror.amount, -500);
        assert_ne!(mirror.id, transactions[0].id);
    }

    #[test]
    fn test_append_mirror_transactions_without_internal_transfers() {
        let transactions = vec![Transaction::new(
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            "a-1".to_string(),
            "p-1".to_string(),
            false,
            -250,
            true,
        )];
        let expanded = append_mirror_transactions(transactions.clone());
        assert_eq!(expanded, transactions);
    }
}
