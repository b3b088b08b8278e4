//! Core traits for versioned persistence and provider integrations
//!
//! This module defines the capability contracts the engine depends on, so
//! that concrete backends (in-memory, Postgres) and concrete providers are
//! interchangeable and selected by the caller at startup.

use crate::types::{
    Account, Entity, ExternalAccount, Payee, ProviderError, RequestId, StoreError, Transaction,
    VersionedRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The five versioned-store operations, generic over the entity kind
///
/// One contract covers Accounts, Payees and Transactions; backends
/// implement it once, generically, keyed on [`Entity`]. All operations act
/// within the session's atomic unit.
#[async_trait]
pub trait VersionedStore<E: Entity> {
    /// Insert rows, skipping any whose request ID already exists
    ///
    /// Inserting is idempotent, not an error: a duplicate request ID is
    /// silently absorbed. Returns the entity IDs actually inserted.
    async fn insert(
        &mut self,
        records: Vec<VersionedRecord<E>>,
    ) -> Result<Vec<String>, StoreError>;

    /// Return every current version (open validity interval)
    async fn select_current(&mut self) -> Result<Vec<VersionedRecord<E>>, StoreError>;

    /// Return the current version for each of the given IDs
    ///
    /// IDs with no current row are simply absent from the map; callers
    /// decide whether absence is fatal.
    async fn select_current_by_id(
        &mut self,
        ids: &[String],
    ) -> Result<HashMap<String, VersionedRecord<E>>, StoreError>;

    /// Return the row written under each of the given request IDs
    ///
    /// Superseded rows are included; used to confirm a write that raced
    /// with a concurrent read.
    async fn select_by_request_id(
        &mut self,
        request_ids: &[String],
    ) -> Result<HashMap<RequestId, VersionedRecord<E>>, StoreError>;

    /// Close the current version of `id`, but only if it is still open
    ///
    /// Returns whether a row was actually closed. A `false` result means
    /// another writer won the race for the single active-version slot; the
    /// caller must fail its whole atomic unit.
    async fn close_current(
        &mut self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// A persistence backend able to open atomic units
#[async_trait]
pub trait Store: Send + Sync {
    /// The session type representing one atomic unit
    type Session: StoreSession;

    /// Begin an atomic unit
    ///
    /// Everything done through the returned session becomes visible only
    /// on [`StoreSession::commit`]; dropping or rolling back the session
    /// discards it.
    async fn begin(&self) -> Result<Self::Session, StoreError>;
}

/// One atomic unit against the store
///
/// Provides the versioned-store contract for all three entity kinds, the
/// unit-scoped clock, and the entity-specific lookups the service layer
/// needs.
#[async_trait]
pub trait StoreSession:
    VersionedStore<Account> + VersionedStore<Payee> + VersionedStore<Transaction> + Send
{
    /// The unit's timestamp
    ///
    /// Stable for the lifetime of the session, so every row written in one
    /// unit shares a consistent instant and supersession intervals never
    /// overlap or gap.
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError>;

    /// Return the current payee for each of the given names
    ///
    /// Only current versions are consulted; names with no active payee are
    /// absent from the map.
    async fn select_payees_by_name(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, VersionedRecord<Payee>>, StoreError>;

    /// Return the current transactions of one account
    ///
    /// Ordered by effective date, then amount.
    async fn select_transactions_by_account(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<VersionedRecord<Transaction>>, StoreError>;

    /// Commit the unit, making all of its writes visible atomically
    async fn commit(self) -> Result<(), StoreError>;

    /// Roll the unit back, discarding all of its writes
    async fn rollback(self) -> Result<(), StoreError>;
}

/// An external bank provider integration
///
/// The only untrusted external collaborator in the reconciliation
/// protocol. Calls may fail transiently (network, auth); such failures
/// propagate unchanged and leave the store untouched. Cancellation reaches
/// the provider call by dropping the future awaiting it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier of this provider integration
    fn id(&self) -> &str;

    /// Fetch every external account the provider knows, as of `sync_time`
    async fn get_external_accounts(
        &self,
        sync_time: DateTime<Utc>,
    ) -> Result<Vec<ExternalAccount>, ProviderError>;

    /// Fetch one external account by its provider-side ID, as of `sync_time`
    async fn get_external_account(
        &self,
        sync_time: DateTime<Utc>,
        external_id: &str,
    ) -> Result<ExternalAccount, ProviderError>;
}
