use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Manage a versioned ledger of accounts, payees and transactions
#[derive(Parser, Debug)]
#[command(name = "budget-engine")]
#[command(about = "Manage a versioned budget ledger with bank reconciliation", long_about = None)]
pub struct CliArgs {
    /// Storage backend to run against
    #[arg(
        long = "store",
        value_name = "STORE",
        default_value = "postgres",
        help = "Storage backend: 'postgres' (connects via DATABASE_URL) or 'memory' (ephemeral)"
    )]
    pub store: StoreType,

    #[command(subcommand)]
    pub command: Command,
}

/// Available storage backends
#[derive(Clone, Debug, ValueEnum)]
pub enum StoreType {
    Postgres,
    Memory,
}

/// Ledger commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply the database schema migrations
    Init,

    /// Create payees with the given names
    CreatePayee {
        /// One or more payee names
        #[arg(value_name = "NAME", required = true)]
        names: Vec<String>,
    },

    /// Create an internal account
    CreateAccount {
        /// Account name
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List current payees
    Payees,

    /// List current accounts as CSV
    Accounts,

    /// List one account's current transactions
    Transactions {
        /// Account to list the ledger of
        #[arg(long = "account", value_name = "ACCOUNT_ID")]
        account_id: String,
    },

    /// Import transactions from a CSV file
    Import {
        /// Path to the input CSV file
        #[arg(value_name = "INPUT")]
        input_file: PathBuf,
    },

    /// Reconcile an account against its external provider
    Sync {
        /// Account to reconcile
        #[arg(value_name = "ACCOUNT_ID")]
        account_id: String,
    },
}
