//! Error types for the Rust Budget Engine
//!
//! This module defines all error types that can occur while operating the
//! ledger.
//!
//! # Error Categories
//!
//! - **Not-found**: a referenced entity is absent; terminal, not retried.
//! - **Validation conflicts**: every violation in a batch is collected and
//!   reported together in one `Validation` error; nothing is persisted.
//! - **Reconciliation conflicts**: an external balance disagrees with the
//!   internal one; expected and non-corrupting, the store is untouched.
//! - **Collaborator failures**: store or provider I/O errors, wrapped with
//!   context and propagated; the atomic unit is rolled back.
//! - **Concurrency conflicts**: another writer superseded the entity's
//!   current version first; the whole atomic unit fails.

use super::balance::Balance;
use thiserror::Error;

/// Main error type for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The requested account does not exist
    #[error("account {account_id:?} does not exist")]
    AccountNotFound {
        /// ID the caller asked for
        account_id: String,
    },

    /// The account has no external link, so there is nothing to reconcile
    ///
    /// Syncing such an account is a no-op the caller should not retry.
    #[error("account {account_id:?} is not linked to an external account and cannot be synced")]
    AccountNotLinked {
        /// ID of the unlinked account
        account_id: String,
    },

    /// No provider is registered for the integration an account is linked to
    #[error("no provider is registered for integration {integration_id:?}")]
    UnknownIntegration {
        /// Integration ID the account's external link names
        integration_id: String,
    },

    /// One or more batch validation failures
    ///
    /// Every distinct violation found in the batch is listed; callers can
    /// enumerate all of them rather than fixing one at a time.
    #[error("validating batch: {}", format_failures(.failures))]
    Validation {
        /// All violations found in the batch
        failures: Vec<ValidationError>,
    },

    /// Reconciliation found the external balance disagreeing with the
    /// internally tracked one
    ///
    /// The store is left unchanged; the disagreement needs external
    /// investigation and is never auto-resolved by overwriting.
    #[error(
        "syncing account {account_name:?} failed, balance synced from external account \
         {external_balance:?} does not match balance of internal account {internal_balance:?}"
    )]
    AccountSync {
        /// Name of the account being reconciled
        account_name: String,
        /// Balance the provider reported
        external_balance: Balance,
        /// Balance currently stored
        internal_balance: Balance,
    },

    /// Another writer superseded the entity's current version first
    ///
    /// Raised when a conditional close matched no row; the whole atomic
    /// unit is rolled back.
    #[error("current version of {entity} {id:?} was superseded by a concurrent writer")]
    WriteConflict {
        /// Entity kind label (account, payee, transaction)
        entity: &'static str,
        /// Stable ID whose current version was contended
        id: String,
    },

    /// Store collaborator failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Provider collaborator failure
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A rollback attempted after a failure also failed
    ///
    /// Both the original error and the rollback error are surfaced; neither
    /// is swallowed.
    #[error("{source}; additionally, rolling back failed: {rollback}")]
    Rollback {
        /// The error that aborted the atomic unit
        source: Box<LedgerError>,
        /// The error encountered while rolling the unit back
        rollback: StoreError,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error in the import shell
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

fn format_failures(failures: &[ValidationError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single batch validation violation
///
/// Each variant lists every offending ID or name found in the batch, not
/// just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Transactions reference accounts with no current version
    #[error("transactions reference accounts that do not exist: {account_ids:?}")]
    MissingAccounts {
        /// Every referenced account ID with no current version
        account_ids: Vec<String>,
    },

    /// Transactions reference payees with no current version
    #[error("transactions reference payees that do not exist: {payee_ids:?}")]
    MissingPayees {
        /// Every referenced payee ID with no current version
        payee_ids: Vec<String>,
    },

    /// Payees created with names already taken by active payees
    #[error("payees created with names that already exist: {payee_names:?}")]
    DuplicatePayees {
        /// Every requested name colliding with an active payee
        payee_names: Vec<String>,
    },
}

/// Persistence collaborator errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// External bank provider errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider does not know the requested external account
    #[error("external account {external_id:?} is not known to the provider")]
    ExternalAccountNotFound {
        /// External account ID the provider was asked for
        external_id: String,
    },

    /// Transport or authentication failure talking to the provider
    ///
    /// Transient; propagated unchanged so the caller can decide whether to
    /// retry the whole attempt.
    #[error("provider request failed: {message}")]
    Request {
        /// Description of the failure
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        // Extract line number if available
        let line = error.position().map(|pos| pos.line());

        LedgerError::Parse {
            line,
            message: error.to_string(),
        }
    }
}
