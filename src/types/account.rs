//! Account types for the Rust Budget Engine
//!
//! An Account tracks money held somewhere: a current account, a savings
//! pot, a credit card. Accounts optionally carry a link to an external
//! account at a bank provider; linked accounts can be reconciled against
//! the balance the provider reports.

use super::balance::Balance;
use super::versioned::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable account identifier (UUID string)
pub type AccountId = String;

/// An internally tracked account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity, constant across versions
    pub id: AccountId,

    /// Human-readable account name
    pub name: String,

    /// Current balance of the account
    pub balance: Balance,

    /// Snapshot of the linked external account, if any
    ///
    /// An account with no external link is purely internal and is never
    /// reconciled.
    pub external_account: Option<ExternalAccount>,
}

impl Account {
    /// Create a new internal Account with a generated UUID and zero balance
    pub fn new(name: String) -> Self {
        Account {
            id: Uuid::new_v4().to_string(),
            name,
            balance: Balance::default(),
            external_account: None,
        }
    }
}

impl Entity for Account {
    const KIND: &'static str = "account";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Snapshot of an account held at an external bank provider
///
/// Returned by a [`Provider`](crate::core::Provider) and embedded into the
/// internal [`Account`] it is linked to. `last_sync_timestamp` records the
/// instant the snapshot was last confirmed against the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalAccount {
    /// Identifier of the account in the provider's own namespace
    pub id: String,

    /// Name the provider reports for the account
    pub name: String,

    /// Identifier of the provider integration this account belongs to
    pub integration_id: String,

    /// Instant the snapshot was last reconciled
    pub last_sync_timestamp: DateTime<Utc>,

    /// Balance the provider reported as of the snapshot
    pub balance: Balance,
}
