//! Balance types for the Rust Budget Engine
//!
//! Monetary values are stored as integer minor units (e.g. £10 is stored
//! as 1000), so balance comparisons and sums are exact. A `Balance` carries
//! both the cleared component (confirmed by the bank) and the effective
//! component (including pending transactions).

use serde::{Deserialize, Serialize};

/// Monetary amount in minor units
///
/// Assumes at most two decimal places in the display currency, so the
/// amount is stored with no decimals at all. Signed: negative amounts
/// denote outgoing money.
pub type BalanceAmount = i64;

/// A point-in-time balance of an account
///
/// Holds the cleared and effective components separately. Two balances are
/// equal only when both components match; reconciliation relies on this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Amount confirmed by the bank
    pub cleared: BalanceAmount,

    /// Amount including transactions not yet confirmed
    pub effective: BalanceAmount,
}

impl Balance {
    /// Create a Balance from its cleared and effective components
    pub fn new(cleared: BalanceAmount, effective: BalanceAmount) -> Self {
        Balance { cleared, effective }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balances_compare_componentwise() {
        assert_eq!(Balance::new(1000, 900), Balance::new(1000, 900));
        assert_ne!(Balance::new(1000, 900), Balance::new(1000, 800));
        assert_ne!(Balance::new(900, 900), Balance::new(1000, 900));
    }

    #[test]
    fn test_default_balance_is_zero() {
        let balance = Balance::default();
        assert_eq!(balance.cleared, 0);
        assert_eq!(balance.effective, 0);
    }
}
