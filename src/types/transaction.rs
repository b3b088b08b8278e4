//! Transaction types for the Rust Budget Engine
//!
//! A Transaction records money moving in or out of one account. The
//! counterparty is either an external Payee, or another internal account
//! when `is_payee_internal` is set. Internal transfers are always stored as
//! a balanced pair of transactions; [`Transaction::mirror`] produces the
//! counter-entry.

use super::account::AccountId;
use super::balance::BalanceAmount;
use super::versioned::Entity;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable transaction identifier (UUID string)
pub type TransactionId = String;

/// A single ledger entry against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable identity, constant across versions
    pub id: TransactionId,

    /// Calendar date the transaction takes effect (not a timestamp)
    pub effective_date: NaiveDate,

    /// The account debited or credited
    pub account_id: AccountId,

    /// The counterparty: a Payee ID, or another Account ID when
    /// `is_payee_internal` is set
    pub payee_id: String,

    /// Whether the counterparty is another internal account
    pub is_payee_internal: bool,

    /// Signed amount in minor units; the sign indicates direction
    pub amount: BalanceAmount,

    /// Whether the bank has confirmed the transaction
    pub cleared: bool,
}

impl Transaction {
    /// Create a new Transaction with a generated UUID
    pub fn new(
        effective_date: NaiveDate,
        account_id: AccountId,
        payee_id: String,
        is_payee_internal: bool,
        amount: BalanceAmount,
        cleared: bool,
    ) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            effective_date,
            account_id,
            payee_id,
            is_payee_internal,
            amount,
            cleared,
        }
    }

    /// Produce the balancing counter-entry for this transaction
    ///
    /// The mirror swaps `account_id` and `payee_id`, negates the amount and
    /// copies every other field, so the two legs of an internal transfer
    /// net to zero. Mirroring is its own inverse: mirroring a mirror with
    /// the original ID reproduces the original transaction.
    pub fn mirror(&self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            effective_date: self.effective_date,
            account_id: self.payee_id.clone(),
            payee_id: self.account_id.clone(),
            is_payee_internal: self.is_payee_internal,
            amount: -self.amount,
            cleared: self.cleared,
        }
    }
}

impl Entity for Transaction {
    const KIND: &'static str = "transaction";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> Transaction {
        Transaction {
            id: "id-1".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(),
            account_id: "account_id-1".to_string(),
            payee_id: "payee_id-1".to_string(),
            is_payee_internal: true,
            amount: 1,
            cleared: true,
        }
    }

    fn mirror_transaction() -> Transaction {
        Transaction {
            id: "mirror_id-1".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(),
            account_id: "payee_id-1".to_string(),
            payee_id: "account_id-1".to_string(),
            is_payee_internal: true,
            amount: -1,
            cleared: true,
        }
    }

    #[test]
    fn test_mirrored_transaction_equals_mirror_transaction() {
        assert_eq!(
            mirror_transaction(),
            transaction().mirror("mirror_id-1".to_string())
        );
    }

    #[test]
    fn test_mirrored_mirror_transaction_equals_transaction() {
        assert_eq!(
            transaction(),
            mirror_transaction().mirror("id-1".to_string())
        );
    }

    #[test]
    fn test_transaction_to_mirror_to_transaction() {
        let original = transaction();
        let round_trip = original
            .mirror("mirror_id-1".to_string())
            .mirror(original.id.clone());
        assert_eq!(original, round_trip);
    }

    #[test]
    fn test_mirror_negates_amount() {
        let original = transaction();
        assert_eq!(original.mirror("m".to_string()).amount, -original.amount);
    }

    #[test]
    fn test_mirror_keeps_internal_flag_date_and_cleared() {
        let mirrored = transaction().mirror("m".to_string());
        assert!(mirrored.is_payee_internal);
        assert!(mirrored.cleared);
        assert_eq!(
            mirrored.effective_date,
            NaiveDate::from_ymd_opt(2000, 1, 3).unwrap()
        );
    }
}
