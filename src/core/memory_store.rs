//! In-memory versioned store backend
//!
//! Keeps every version of every entity in plain vectors guarded by a single
//! async mutex. A session takes the lock for the whole atomic unit and
//! mutates a working copy of the state; committing publishes the copy,
//! rolling back discards it. Concurrent units therefore serialize, readers
//! never observe partial writes, and the conditional close still reports
//! contention for the single active-version slot exactly like the
//! relational backend.
//!
//! Intended for tests and ephemeral CLI runs; nothing survives the
//! process.

use crate::core::traits::{Store, StoreSession, VersionedStore};
use crate::types::{
    Account, Entity, Payee, RequestId, StoreError, Transaction, VersionedRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// All versions of one entity kind
///
/// The generic core of the backend: one implementation of the append-only
/// versioning discipline, reused for every entity kind.
#[derive(Debug, Clone)]
struct VersionedTable<E> {
    rows: Vec<VersionedRecord<E>>,
}

impl<E> Default for VersionedTable<E> {
    fn default() -> Self {
        VersionedTable { rows: Vec::new() }
    }
}

impl<E: Entity> VersionedTable<E> {
    /// Insert rows, skipping any whose request ID is already present
    fn insert(&mut self, records: Vec<VersionedRecord<E>>) -> Vec<String> {
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            let duplicate = self
                .rows
                .iter()
                .any(|row| row.request_id == record.request_id);
            if duplicate {
                continue;
            }
            inserted.push(record.id().to_string());
            self.rows.push(record);
        }
        inserted
    }

    fn select_current(&self) -> Vec<VersionedRecord<E>> {
        self.rows
            .iter()
            .filter(|row| row.is_current())
            .cloned()
            .collect()
    }

    fn select_current_by_id(&self, ids: &[String]) -> HashMap<String, VersionedRecord<E>> {
        self.rows
            .iter()
            .filter(|row| row.is_current() && ids.iter().any(|id| id == row.id()))
            .map(|row| (row.id().to_string(), row.clone()))
            .collect()
    }

    fn select_by_request_id(
        &self,
        request_ids: &[String],
    ) -> HashMap<RequestId, VersionedRecord<E>> {
        self.rows
            .iter()
            .filter(|row| request_ids.contains(&row.request_id))
            .map(|row| (row.request_id.clone(), row.clone()))
            .collect()
    }

    /// Close the current version of `id` if one is still open
    fn close_current(&mut self, id: &str, valid_to: DateTime<Utc>) -> bool {
        for row in &mut self.rows {
            if row.id() == id && row.is_current() {
                row.valid_to = Some(valid_to);
                return true;
            }
        }
        false
    }
}

/// Whole-store state: one table per entity kind
#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: VersionedTable<Account>,
    payees: VersionedTable<Payee>,
    transactions: VersionedTable<Transaction>,
}

/// Routes the generic store implementation to the right table
trait HasTable<E> {
    fn table(&self) -> &VersionedTable<E>;
    fn table_mut(&mut self) -> &mut VersionedTable<E>;
}

impl HasTable<Account> for MemoryState {
    fn table(&self) -> &VersionedTable<Account> {
        &self.accounts
    }
    fn table_mut(&mut self) -> &mut VersionedTable<Account> {
        &mut self.accounts
    }
}

impl HasTable<Payee> for MemoryState {
    fn table(&self) -> &VersionedTable<Payee> {
        &self.payees
    }
    fn table_mut(&mut self) -> &mut VersionedTable<Payee> {
        &mut self.payees
    }
}

impl HasTable<Transaction> for MemoryState {
    fn table(&self) -> &VersionedTable<Transaction> {
        &self.transactions
    }
    fn table_mut(&mut self) -> &mut VersionedTable<Transaction> {
        &mut self.transactions
    }
}

/// In-memory store backend
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> Result<Self::Session, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemorySession {
            guard,
            working,
            now: Utc::now(),
        })
    }
}

/// One atomic unit against the in-memory store
///
/// Holds the store lock for its whole lifetime, so a task must finish or
/// drop one session before beginning the next.
pub struct MemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    now: DateTime<Utc>,
}

#[async_trait]
impl<E: Entity> VersionedStore<E> for MemorySession
where
    MemoryState: HasTable<E>,
{
    async fn insert(
        &mut self,
        records: Vec<VersionedRecord<E>>,
    ) -> Result<Vec<String>, StoreError> {
        Ok(HasTable::<E>::table_mut(&mut self.working).insert(records))
    }

    async fn select_current(&mut self) -> Result<Vec<VersionedRecord<E>>, StoreError> {
        Ok(HasTable::<E>::table(&self.working).select_current())
    }

    async fn select_current_by_id(
        &mut self,
        ids: &[String],
    ) -> Result<HashMap<String, VersionedRecord<E>>, StoreError> {
        Ok(HasTable::<E>::table(&self.working).select_current_by_id(ids))
    }

    async fn select_by_request_id(
        &mut self,
        request_ids: &[String],
    ) -> Result<HashMap<RequestId, VersionedRecord<E>>, StoreError> {
        Ok(HasTable::<E>::table(&self.working).select_by_request_id(request_ids))
    }

    async fn close_current(
        &mut self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(HasTable::<E>::table_mut(&mut self.working).close_current(id, valid_to))
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.now)
    }

    async fn select_payees_by_name(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, VersionedRecord<Payee>>, StoreError> {
        Ok(self
            .working
            .payees
            .rows
            .iter()
            .filter(|row| row.is_current() && names.contains(&row.record.name))
            .map(|row| (row.record.name.clone(), row.clone()))
            .collect())
    }

    async fn select_transactions_by_account(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<VersionedRecord<Transaction>>, StoreError> {
        let mut transactions: Vec<_> = self
            .working
            .transactions
            .rows
            .iter()
            .filter(|row| row.is_current() && row.record.account_id == account_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| {
            (a.record.effective_date, a.record.amount)
                .cmp(&(b.record.effective_date, b.record.amount))
        });
        Ok(transactions)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Dropping the working copy (and the lock) is the whole rollback.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payee_record(request_id: &str, payee: &Payee) -> VersionedRecord<Payee> {
        VersionedRecord::open(request_id.to_string(), Utc::now(), payee.clone())
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_per_request_id() {
        let store = MemoryStore::new();
        let payee = Payee::new("Rent".to_string());

        let mut session = store.begin().await.unwrap();
        let inserted = session
            .insert(vec![
                payee_record("request-1", &payee),
                payee_record("request-1", &payee),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, vec![payee.id.clone()]);

        // A second attempt under the same request ID inserts nothing.
        let inserted = session
            .insert(vec![payee_record("request-1", &payee)])
            .await
            .unwrap();
        assert!(inserted.is_empty());
        session.commit().await.unwrap();

        let mut session = store.begin().await.unwrap();
        let current: Vec<VersionedRecord<Payee>> = session.select_current().await.unwrap();
        assert_eq!(current.len(), 1);
    }

    #[tokio::test]
    async fn test_select_by_request_id_includes_superseded_rows() {
        let store = MemoryStore::new();
        let payee = Payee::new("Rent".to_string());

        let mut session = store.begin().await.unwrap();
        let now = session.now().await.unwrap();
        session
            .insert(vec![payee_record("request-1", &payee)])
            .await
            .unwrap();
        let closed = VersionedStore::<Payee>::close_current(&mut session, &payee.id, now)
            .await
            .unwrap();
        assert!(closed);
        session
            .insert(vec![payee_record("request-2", &payee)])
            .await
            .unwrap();
        session.commit().await.unwrap();

        let mut session = store.begin().await.unwrap();
        let by_request: HashMap<String, VersionedRecord<Payee>> = session
            .select_by_request_id(&["request-1".to_string(), "request-2".to_string()])
            .await
            .unwrap();
        assert_eq!(by_request.len(), 2);
        assert!(!by_request["request-1"].is_current());
        assert!(by_request["request-2"].is_current());
    }

    #[tokio::test]
    async fn test_close_current_fails_the_second_time() {
        let store = MemoryStore::new();
        let payee = Payee::new("Rent".to_string());

        let mut session = store.begin().await.unwrap();
        let now = session.now().await.unwrap();
        session
            .insert(vec![payee_record("request-1", &payee)])
            .await
            .unwrap();
        let closed = VersionedStore::<Payee>::close_current(&mut session, &payee.id, now)
            .await
            .unwrap();
        assert!(closed);
        // The active version is gone; a second conditional close matches
        // nothing and signals the conflict.
        let closed_again = VersionedStore::<Payee>::close_current(&mut session, &payee.id, now)
            .await
            .unwrap();
        assert!(!closed_again);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let payee = Payee::new("Rent".to_string());

        let mut session = store.begin().await.unwrap();
        session
            .insert(vec![payee_record("request-1", &payee)])
            .await
            .unwrap();
        session.rollback().await.unwrap();

        let mut session = store.begin().await.unwrap();
        let current: Vec<VersionedRecord<Payee>> = session.select_current().await.unwrap();
        assert!(current.is_empty());
    }

    #[tokio::test]
    async fn test_at_most_one_current_version_per_id() {
        let store = MemoryStore::new();
        let payee = Payee::new("Rent".to_string());

        let mut session = store.begin().await.unwrap();
        let now = session.now().await.unwrap();
        session
            .insert(vec![payee_record("request-1", &payee)])
            .await
            .unwrap();
        let closed = VersionedStore::<Payee>::close_current(&mut session, &payee.id, now)
            .await
            .unwrap();
        assert!(closed);
        session
            .insert(vec![payee_record("request-2", &payee)])
            .await
            .unwrap();
        session.commit().await.unwrap();

        let mut session = store.begin().await.unwrap();
        let current: HashMap<String, VersionedRecord<Payee>> = session
            .select_current_by_id(&[payee.id.clone()])
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[&payee.id].request_id, "request-2");
    }

    #[tokio::test]
    async fn test_transactions_by_account_are_ordered() {
        use chrono::NaiveDate;

        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        let date = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let transaction = |day, amount: i64| {
            Transaction::new(
                date(day),
                "acct-1".to_string(),
                "payee-1".to_string(),
                false,
                amount,
                false,
            )
        };
        let records = vec![
            VersionedRecord::open("r-1".to_string(), Utc::now(), transaction(9, 500)),
            VersionedRecord::open("r-2".to_string(), Utc::now(), transaction(2, 700)),
            VersionedRecord::open("r-3".to_string(), Utc::now(), transaction(2, -100)),
        ];
        session.insert(records).await.unwrap();

        let transactions = session
            .select_transactions_by_account("acct-1")
            .await
            .unwrap();
        let amounts: Vec<i64> = transactions.iter().map(|t| t.record.amount).collect();
        assert_eq!(amounts, vec![-100, 700, 500]);
    }
}
