//! CSV format handling for transaction import and account listings
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to domain transactions
//! - Account listing serialization
//!
//! Conversion functions are pure (no I/O) for easy testing.

use crate::types::{Account, BalanceAmount, LedgerError, Transaction};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::{Read, Write};

/// CSV record structure for transaction import
///
/// Matches the input CSV format with columns:
/// `date, account_id, payee_id, internal, amount, cleared`.
/// Amounts are integer minor units; dates are `YYYY-MM-DD`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    pub date: String,
    pub account_id: String,
    pub payee_id: String,
    pub internal: bool,
    pub amount: BalanceAmount,
    pub cleared: bool,
}

/// Convert a CsvRecord to a Transaction
///
/// Parses the date string and assigns the transaction a fresh ID. Internal
/// transfers (`internal = true`) get their mirror synthesized later by the
/// engine, not here.
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(Transaction) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<Transaction, String> {
    let effective_date = NaiveDate::parse_from_str(csv_record.date.trim(), "%Y-%m-%d")
        .map_err(|_| {
            format!(
                "Invalid date '{}': expected YYYY-MM-DD",
                csv_record.date
            )
        })?;

    Ok(Transaction::new(
        effective_date,
        csv_record.account_id,
        csv_record.payee_id,
        csv_record.internal,
        csv_record.amount,
        csv_record.cleared,
    ))
}

/// Read a whole transactions CSV into domain transactions
///
/// # Errors
///
/// Returns an error if the CSV structure is invalid or any record fails
/// conversion; the batch is rejected as a whole, matching the engine's
/// all-or-nothing persistence.
pub fn read_transactions_csv<R: Read>(reader: R) -> Result<Vec<Transaction>, LedgerError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut transactions = Vec::new();
    for (index, result) in csv_reader.deserialize::<CsvRecord>().enumerate() {
        let record = result?;
        let transaction = convert_csv_record(record).map_err(|message| LedgerError::Parse {
            // Header occupies the first line.
            line: Some(index as u64 + 2),
            message,
        })?;
        transactions.push(transaction);
    }
    Ok(transactions)
}

/// Write account states to CSV format
///
/// Writes accounts with columns: id, name, cleared_balance,
/// effective_balance, integration. Accounts are sorted by name then ID for
/// deterministic output; `integration` is empty for unlinked accounts.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "id",
        "name",
        "cleared_balance",
        "effective_balance",
        "integration",
    ])?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));

    for account in sorted_accounts {
        let integration = account
            .external_account
            .as_ref()
            .map(|external| external.integration_id.clone())
            .unwrap_or_default();
        writer.write_record(&[
            account.id.clone(),
            account.name.clone(),
            account.balance.cleared.to_string(),
            account.balance.effective.to_string(),
            integration,
        ])?;
    }

    writer.flush().map_err(|error| LedgerError::Io {
        message: error.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Balance;
    use rstest::rstest;

    fn record(date: &str) -> CsvRecord {
        CsvRecord {
            date: date.to_string(),
            account_id: "acct-1".to_string(),
            payee_id: "payee-1".to_string(),
            internal: false,
            amount: -1250,
            cleared: true,
        }
    }

    #[rstest]
    #[case::plain("2024-05-01")]
    #[case::padded(" 2024-05-01 ")]
    fn test_convert_csv_record_valid(#[case] date: &str) {
        let transaction = convert_csv_record(record(date)).unwrap();
        assert_eq!(
            transaction.effective_date,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
        assert_eq!(transaction.account_id, "acct-1");
        assert_eq!(transaction.payee_id, "payee-1");
        assert_eq!(transaction.amount, -1250);
        assert!(transaction.cleared);
        assert!(!transaction.is_payee_internal);
    }

    #[rstest]
    #[case::wrong_order("01-05-2024")]
    #[case::not_a_date("soon")]
    #[case::empty("")]
    fn test_convert_csv_record_invalid_date(#[case] date: &str) {
        let error = convert_csv_record(record(date)).unwrap_err();
        assert!(error.contains("Invalid date"));
    }

    #[test]
    fn test_read_transactions_csv() {
        let input = "\
date,account_id,payee_id,internal,amount,cleared
2024-05-01,acct-1,payee-1,false,-1250,true
2024-05-02,acct-1,acct-2,true,500,false
";
        let transactions = read_transactions_csv(input.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].amount, -1250);
        assert!(transactions[1].is_payee_internal);
    }

    #[test]
    fn test_read_transactions_csv_reports_line() {
        let input = "\
date,account_id,payee_id,internal,amount,cleared
2024-05-01,acct-1,payee-1,false,-1250,true
not-a-date,acct-1,payee-1,false,100,false
";
        let error = read_transactions_csv(input.as_bytes()).unwrap_err();
        match error {
            LedgerError::Parse { line, message } => {
                assert_eq!(line, Some(3));
                assert!(message.contains("Invalid date"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_write_accounts_csv_sorted_with_integration() {
        let mut linked = Account::new("Savings".to_string());
        linked.balance = Balance::new(2000, 2000);
        linked.external_account = Some(crate::types::ExternalAccount {
            id: "ext-1".to_string(),
            name: "Savings".to_string(),
            integration_id: "starling".to_string(),
            last_sync_timestamp: chrono::Utc::now(),
            balance: Balance::new(2000, 2000),
        });
        let unlinked = Account::new("Current".to_string());

        let mut output = Vec::new();
        write_accounts_csv(&[linked.clone(), unlinked.clone()], &mut output).unwrap();

        let written = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines[0],
            "id,name,cleared_balance,effective_balance,integration"
        );
        // Sorted by name: Current before Savings.
        assert!(lines[1].starts_with(&unlinked.id));
        assert!(lines[1].ends_with(",Current,0,0,"));
        assert!(lines[2].starts_with(&linked.id));
        assert!(lines[2].ends_with(",Savings,2000,2000,starling"));
    }
}
