//! I/O module
//!
//! Handles CSV parsing and output for the CLI shell.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, listing output)

pub mod csv_format;

pub use csv_format::{convert_csv_record, read_transactions_csv, write_accounts_csv, CsvRecord};
