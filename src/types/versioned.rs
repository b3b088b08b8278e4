//! Versioning envelope shared by all stored entity kinds
//!
//! Every write to the store creates a new row wrapping the entity in a
//! [`VersionedRecord`]: a writer-chosen request ID (idempotency key) plus a
//! half-open validity interval `[valid_from, valid_to)`. Rows are never
//! mutated except to close their validity interval; the row with an open
//! interval is the entity's current version.

use chrono::{DateTime, Utc};

/// A stored entity kind with a stable identity
///
/// The ID is constant across every version of the entity, distinct from the
/// per-row request ID. Implemented by Account, Payee and Transaction so the
/// store can be written once, generically, instead of three times.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Label used in logs and conflict errors (e.g. `"account"`)
    const KIND: &'static str;

    /// Stable business identity, constant across all versions
    fn id(&self) -> &str;
}

/// Request identifier: idempotency key chosen by the writer of one write
/// attempt. Re-submitting the same request ID must not create a duplicate.
pub type RequestId = String;

/// One stored version of an entity
///
/// `valid_to = None` stands for `+infinity`: the version is currently
/// active. At most one row per entity ID may be open at any instant; the
/// store enforces this through its conditional close operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord<E> {
    /// Idempotency key of the write attempt that produced this row
    pub request_id: RequestId,

    /// Start of the validity interval (inclusive)
    pub valid_from: DateTime<Utc>,

    /// End of the validity interval (exclusive); `None` means the version
    /// is still active
    pub valid_to: Option<DateTime<Utc>>,

    /// The entity payload
    pub record: E,
}

impl<E: Entity> VersionedRecord<E> {
    /// Wrap an entity as a new open (current) version
    pub fn open(request_id: RequestId, valid_from: DateTime<Utc>, record: E) -> Self {
        VersionedRecord {
            request_id,
            valid_from,
            valid_to: None,
            record,
        }
    }

    /// Whether this row is the entity's current version
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Stable identity of the wrapped entity
    pub fn id(&self) -> &str {
        self.record.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payee;

    #[test]
    fn test_open_record_is_current() {
        let record = VersionedRecord::open(
            "request-1".to_string(),
            Utc::now(),
            Payee::new("Rent".to_string()),
        );
        assert!(record.is_current());
        assert_eq!(record.id(), record.record.id);
    }

    #[test]
    fn test_closed_record_is_not_current() {
        let mut record = VersionedRecord::open(
            "request-1".to_string(),
            Utc::now(),
            Payee::new("Rent".to_string()),
        );
        record.valid_to = Some(Utc::now());
        assert!(!record.is_current());
    }
}
