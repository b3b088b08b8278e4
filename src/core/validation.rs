//! Batch validation against the current snapshot
//!
//! Referential-integrity and uniqueness checks run before anything is
//! persisted. Every check in a batch runs even when an earlier one has
//! already failed, and all violations are reported together in a single
//! [`LedgerError::Validation`], so a caller can fix a whole batch in one
//! round trip instead of one violation at a time.

use crate::core::traits::{StoreSession, VersionedStore};
use crate::types::{Account, LedgerError, Payee, Transaction, ValidationError};
use std::collections::HashSet;

/// Check that every account and payee a batch of transactions references
/// has a current version
///
/// Account references are the debited/credited `account_id` plus, for
/// internal transfers, the `payee_id`; payee references are the `payee_id`
/// of external transactions. Both lookups always run; missing IDs from
/// each are batched into one failure per kind.
pub async fn validate_transactions<S: StoreSession>(
    session: &mut S,
    transactions: &[Transaction],
) -> Result<(), LedgerError> {
    let mut account_ids = Vec::with_capacity(transactions.len());
    let mut payee_ids = Vec::with_capacity(transactions.len());
    for transaction in transactions {
        account_ids.push(transaction.account_id.clone());
        if transaction.is_payee_internal {
            account_ids.push(transaction.payee_id.clone());
        } else {
            payee_ids.push(transaction.payee_id.clone());
        }
    }

    let mut failures = Vec::new();

    let unique_account_ids = deduplicate(account_ids);
    let found_accounts =
        VersionedStore::<Account>::select_current_by_id(session, &unique_account_ids).await?;
    if found_accounts.len() < unique_account_ids.len() {
        let missing = unique_account_ids
            .iter()
            .filter(|id| !found_accounts.contains_key(*id))
            .cloned()
            .collect();
        failures.push(ValidationError::MissingAccounts {
            account_ids: missing,
        });
    }

    let unique_payee_ids = deduplicate(payee_ids);
    let found_payees =
        VersionedStore::<Payee>::select_current_by_id(session, &unique_payee_ids).await?;
    if found_payees.len() < unique_payee_ids.len() {
        let missing = unique_payee_ids
            .iter()
            .filter(|id| !found_payees.contains_key(*id))
            .cloned()
            .collect();
        failures.push(ValidationError::MissingPayees { payee_ids: missing });
    }

    if !failures.is_empty() {
        return Err(LedgerError::Validation { failures });
    }
    Ok(())
}

/// Check that no requested payee name collides with an active payee
///
/// Every colliding name in the batch is reported in one failure.
pub async fn validate_payees<S: StoreSession>(
    session: &mut S,
    payees: &[Payee],
) -> Result<(), LedgerError> {
    let unique_names = deduplicate(payees.iter().map(|payee| payee.name.clone()));
    let existing = session.select_payees_by_name(&unique_names).await?;

    let duplicates: Vec<String> = unique_names
        .iter()
        .filter(|name| existing.contains_key(*name))
        .cloned()
        .collect();

    if !duplicates.is_empty() {
        return Err(LedgerError::Validation {
            failures: vec![ValidationError::DuplicatePayees {
                payee_names: duplicates,
            }],
        });
    }
    Ok(())
}

/// Deduplicate while preserving first-seen order, so reported violations
/// come out in the order the caller submitted them
fn deduplicate(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
