//! Postgres versioned store backend
//!
//! Each entity kind maps to one append-only table sharing the versioning
//! envelope columns (`request_id`, `id`, `valid_from_timestamp`,
//! `valid_to_timestamp`). The [`PgEntity`] trait supplies the per-table
//! column list and row mapping; the store operations themselves are
//! implemented once, generically, on top of it.
//!
//! An open validity interval is stored as `valid_to_timestamp IS NULL`. A
//! partial unique index on `(id) WHERE valid_to_timestamp IS NULL` (see the
//! migrations) backs the one-active-version invariant at the schema level;
//! the conditional `UPDATE` in [`close_current`](VersionedStore::close_current)
//! is what detects a lost race.

use crate::core::traits::{Store, StoreSession, VersionedStore};
use crate::types::{
    Account, Entity, ExternalAccount, Payee, RequestId, StoreError, Transaction, VersionedRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Postgres, Row};
use std::collections::HashMap;
use tracing::debug;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Column mapping between an entity kind and its ledger table
///
/// Binds and reads only the entity-specific columns; the envelope columns
/// are handled generically by the session.
pub trait PgEntity: Entity {
    /// Table the entity kind is stored in
    const TABLE: &'static str;

    /// Entity-specific columns, in bind order
    const COLUMNS: &'static [&'static str];

    /// Bind the entity-specific columns onto an insert query
    fn bind<'q>(query: PgQuery<'q>, entity: &'q Self) -> PgQuery<'q>;

    /// Read the entity-specific columns back out of a row
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

const ENVELOPE_COLUMNS: &[&str] = &[
    "request_id",
    "id",
    "valid_from_timestamp",
    "valid_to_timestamp",
];

fn all_columns<E: PgEntity>() -> String {
    ENVELOPE_COLUMNS
        .iter()
        .chain(E::COLUMNS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql<E: PgEntity>() -> String {
    let placeholders = (1..=ENVELOPE_COLUMNS.len() + E::COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (request_id) DO NOTHING RETURNING id",
        E::TABLE,
        all_columns::<E>(),
        placeholders,
    )
}

fn select_sql<E: PgEntity>(clause: &str) -> String {
    format!("SELECT {} FROM {} WHERE {}", all_columns::<E>(), E::TABLE, clause)
}

fn record_from_row<E: PgEntity>(row: &PgRow) -> Result<VersionedRecord<E>, sqlx::Error> {
    Ok(VersionedRecord {
        request_id: row.try_get("request_id")?,
        valid_from: row.try_get("valid_from_timestamp")?,
        valid_to: row.try_get("valid_to_timestamp")?,
        record: E::from_row(row)?,
    })
}

impl PgEntity for Account {
    const TABLE: &'static str = "accounts";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "cleared_balance",
        "effective_balance",
        "external_id",
        "external_name",
        "external_integration_id",
        "external_last_sync_timestamp",
        "external_cleared_balance",
        "external_effective_balance",
    ];

    fn bind<'q>(query: PgQuery<'q>, account: &'q Account) -> PgQuery<'q> {
        let external = account.external_account.as_ref();
        query
            .bind(&account.name)
            .bind(account.balance.cleared)
            .bind(account.balance.effective)
            .bind(external.map(|e| e.id.as_str()))
            .bind(external.map(|e| e.name.as_str()))
            .bind(external.map(|e| e.integration_id.as_str()))
            .bind(external.map(|e| e.last_sync_timestamp))
            .bind(external.map(|e| e.balance.cleared))
            .bind(external.map(|e| e.balance.effective))
    }

    fn from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
        let external_id: Option<String> = row.try_get("external_id")?;
        let external_account = match external_id {
            Some(id) => Some(ExternalAccount {
                id,
                name: row.try_get("external_name")?,
                integration_id: row.try_get("external_integration_id")?,
                last_sync_timestamp: row.try_get("external_last_sync_timestamp")?,
                balance: crate::types::Balance::new(
                    row.try_get("external_cleared_balance")?,
                    row.try_get("external_effective_balance")?,
                ),
            }),
            None => None,
        };
        Ok(Account {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            balance: crate::types::Balance::new(
                row.try_get("cleared_balance")?,
                row.try_get("effective_balance")?,
            ),
            external_account,
        })
    }
}

impl PgEntity for Payee {
    const TABLE: &'static str = "payees";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn bind<'q>(query: PgQuery<'q>, payee: &'q Payee) -> PgQuery<'q> {
        query.bind(&payee.name)
    }

    fn from_row(row: &PgRow) -> Result<Payee, sqlx::Error> {
        Ok(Payee {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

impl PgEntity for Transaction {
    const TABLE: &'static str = "transactions";
    const COLUMNS: &'static [&'static str] = &[
        "effective_date",
        "account_id",
        "payee_id",
        "is_payee_internal",
        "amount",
        "cleared",
    ];

    fn bind<'q>(query: PgQuery<'q>, transaction: &'q Transaction) -> PgQuery<'q> {
        query
            .bind(transaction.effective_date)
            .bind(&transaction.account_id)
            .bind(&transaction.payee_id)
            .bind(transaction.is_payee_internal)
            .bind(transaction.amount)
            .bind(transaction.cleared)
    }

    fn from_row(row: &PgRow) -> Result<Transaction, sqlx::Error> {
        Ok(Transaction {
            id: row.try_get("id")?,
            effective_date: row.try_get("effective_date")?,
            account_id: row.try_get("account_id")?,
            payee_id: row.try_get("payee_id")?,
            is_payee_internal: row.try_get("is_payee_internal")?,
            amount: row.try_get("amount")?,
            cleared: row.try_get("cleared")?,
        })
    }
}

/// Postgres store backend over a connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Connect a new pool to the given database URL
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(PgStore::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Session = PgSession;

    async fn begin(&self) -> Result<Self::Session, StoreError> {
        Ok(PgSession {
            tx: self.pool.begin().await?,
        })
    }
}

/// One database transaction
///
/// `now()` surfaces the transaction timestamp, which Postgres keeps stable
/// for the whole transaction, giving every row written in the unit the same
/// instant.
pub struct PgSession {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl<E: PgEntity> VersionedStore<E> for PgSession {
    async fn insert(
        &mut self,
        records: Vec<VersionedRecord<E>>,
    ) -> Result<Vec<String>, StoreError> {
        debug!(table = E::TABLE, rows = records.len(), "inserting records");

        let sql = insert_sql::<E>();
        let mut inserted = Vec::with_capacity(records.len());
        for record in &records {
            let query = sqlx::query(&sql)
                .bind(&record.request_id)
                .bind(record.id())
                .bind(record.valid_from)
                .bind(record.valid_to);
            let query = E::bind(query, &record.record);
            if let Some(row) = query.fetch_optional(&mut *self.tx).await? {
                inserted.push(row.try_get("id")?);
            }
        }

        debug!(table = E::TABLE, inserted = inserted.len(), "inserted records");
        Ok(inserted)
    }

    async fn select_current(&mut self) -> Result<Vec<VersionedRecord<E>>, StoreError> {
        debug!(table = E::TABLE, "selecting current records");

        let sql = select_sql::<E>("valid_to_timestamp IS NULL ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.iter()
            .map(|row| record_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn select_current_by_id(
        &mut self,
        ids: &[String],
    ) -> Result<HashMap<String, VersionedRecord<E>>, StoreError> {
        debug!(table = E::TABLE, ids = ?ids, "selecting current records by ID");

        let sql = select_sql::<E>("id = ANY($1) AND valid_to_timestamp IS NULL");
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&mut *self.tx).await?;
        rows.iter()
            .map(|row| {
                let record: VersionedRecord<E> = record_from_row(row)?;
                Ok((record.id().to_string(), record))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn select_by_request_id(
        &mut self,
        request_ids: &[String],
    ) -> Result<HashMap<RequestId, VersionedRecord<E>>, StoreError> {
        debug!(table = E::TABLE, request_ids = ?request_ids, "selecting records by request ID");

        let sql = select_sql::<E>("request_id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(request_ids)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| {
                let record: VersionedRecord<E> = record_from_row(row)?;
                Ok((record.request_id.clone(), record))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn close_current(
        &mut self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        debug!(table = E::TABLE, id, "closing current record");

        let sql = format!(
            "UPDATE {} SET valid_to_timestamp = $2 WHERE id = $1 AND valid_to_timestamp IS NULL",
            E::TABLE,
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(valid_to)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn now(&mut self) -> Result<DateTime<Utc>, StoreError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT now()")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(now)
    }

    async fn select_payees_by_name(
        &mut self,
        names: &[String],
    ) -> Result<HashMap<String, VersionedRecord<Payee>>, StoreError> {
        debug!(names = ?names, "selecting payees by name");

        let sql = select_sql::<Payee>("name = ANY($1) AND valid_to_timestamp IS NULL");
        let rows = sqlx::query(&sql)
            .bind(names)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| {
                let record: VersionedRecord<Payee> = record_from_row(row)?;
                Ok((record.record.name.clone(), record))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn select_transactions_by_account(
        &mut self,
        account_id: &str,
    ) -> Result<Vec<VersionedRecord<Transaction>>, StoreError> {
        debug!(account_id, "selecting transactions by account");

        let sql = select_sql::<Transaction>(
            "account_id = $1 AND valid_to_timestamp IS NULL ORDER BY effective_date, amount",
        );
        let rows = sqlx::query(&sql)
            .bind(account_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| record_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
