//! Rust Budget Engine Library
//! # Overview
//!
//! This library maintains a personal ledger of financial accounts, payees,
//! and transactions, optionally reconciled against an external bank account
//! via a provider integration.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Payee, Transaction, Balance, the
//!   versioning envelope, and the error taxonomy)
//! - [`cli`] - CLI argument parsing
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - Capability contracts for stores, sessions and
//!     providers
//!   - [`core::engine`] - Command orchestration, transaction mirroring, and
//!     the reconciliation state machine
//!   - [`core::validation`] - Batch validation against the current snapshot
//!   - [`core::memory_store`] / [`core::postgres_store`] - Interchangeable
//!     store backends
//! - [`io`] - CSV import/export for the CLI shell
//!
//! # Versioning Discipline
//!
//! Every write creates a new row tagged with a request identifier and a
//! half-open validity interval; rows are never mutated except to close
//! their interval. The row with an open interval is the entity's current
//! version, and supersession atomically closes the old version and
//! activates the new one under a single per-unit timestamp.
//!
//! # Reconciliation
//!
//! A linked account syncs by comparing its stored balance against the
//! balance its provider reports; agreement refreshes the external snapshot
//! through the supersession protocol, disagreement is reported as a
//! conflict without touching the store.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod types;

pub use crate::core::{
    BudgetEngine, MemoryStore, MockProvider, PgStore, Provider, Store, StoreSession,
    VersionedStore,
};
pub use io::{read_transactions_csv, write_accounts_csv};
pub use types::{
    Account, AccountId, Balance, BalanceAmount, Entity, ExternalAccount, LedgerError, Payee,
    PayeeId, ProviderError, RequestId, StoreError, Transaction, TransactionId, ValidationError,
    VersionedRecord,
};
