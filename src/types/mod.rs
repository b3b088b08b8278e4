//! Core data types for the Rust Budget Engine
//!
//! This module contains the domain entities, the monetary value types, the
//! versioning envelope applied to every stored entity, and the error types.

pub mod account;
pub mod balance;
pub mod error;
pub mod payee;
pub mod transaction;
pub mod versioned;

pub use account::{Account, AccountId, ExternalAccount};
pub use balance::{Balance, BalanceAmount};
pub use error::{LedgerError, ProviderError, StoreError, ValidationError};
pub use payee::{Payee, PayeeId};
pub use transaction::{Transaction, TransactionId};
pub use versioned::{Entity, RequestId, VersionedRecord};
