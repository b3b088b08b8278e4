//! Payee type: an external party on the other side of a transaction

use super::versioned::Entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable payee identifier (UUID string)
pub type PayeeId = String;

/// An external counterparty (a shop, an employer, a landlord)
///
/// Payee names must be unique among currently active payees; creation is
/// validated against the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    /// Stable identity, constant across versions
    pub id: PayeeId,

    /// Display name, unique among active payees
    pub name: String,
}

impl Payee {
    /// Create a new Payee with a generated UUID
    pub fn new(name: String) -> Self {
        Payee {
            id: Uuid::new_v4().to_string(),
            name,
        }
    }
}

impl Entity for Payee {
    const KIND: &'static str = "payee";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payee_has_uuid_id_and_given_name() {
        let payee = Payee::new("Rent".to_string());
        assert!(Uuid::parse_str(&payee.id).is_ok());
        assert_eq!(payee.name, "Rent");
    }
}
