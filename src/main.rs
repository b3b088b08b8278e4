//! Rust Budget Engine CLI
//!
//! Command-line shell over the budget engine.
//!
//! # Usage
//!
//! ```bash
//! budget-engine init
//! budget-engine create-payee Rent Groceries
//! budget-engine create-account "Current"
//! budget-engine import transactions.csv
//! budget-engine accounts > accounts.csv
//! budget-engine sync <ACCOUNT_ID>
//! budget-engine --store memory import transactions.csv
//! ```
//!
//! The Postgres backend (default) connects via the `DATABASE_URL`
//! environment variable, loaded from `.env` if present. The memory backend
//! is ephemeral and only useful for single-run experiments.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (validation conflict, sync conflict, store failure, etc.)

use rust_budget_engine::cli::{self, Command, StoreType};
use rust_budget_engine::core::{BudgetEngine, MemoryStore, PgStore, Provider, Store};
use rust_budget_engine::io;
use rust_budget_engine::types::{Account, LedgerError, Payee};
use std::collections::HashMap;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = cli::parse_args();
    if let Err(error) = run(args).await {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

async fn run(args: cli::CliArgs) -> Result<(), LedgerError> {
    // Concrete bank integrations are registered here once configured; the
    // engine takes them as an explicit map rather than a global registry.
    let providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

    match args.store {
        StoreType::Postgres => {
            let database_url = std::env::var("DATABASE_URL").map_err(|_| LedgerError::Io {
                message: "missing DATABASE_URL environment variable".to_string(),
            })?;
            let store = PgStore::connect(&database_url).await?;
            if let Command::Init = args.command {
                store.migrate().await?;
                println!("Applied schema migrations");
                return Ok(());
            }
            run_command(BudgetEngine::new(store, providers), args.command).await
        }
        StoreType::Memory => {
            if let Command::Init = args.command {
                println!("The in-memory store needs no initialization");
                return Ok(());
            }
            run_command(BudgetEngine::new(MemoryStore::new(), providers), args.command).await
        }
    }
}

async fn run_command<S: Store>(
    engine: BudgetEngine<S>,
    command: Command,
) -> Result<(), LedgerError> {
    match command {
        // Handled before the engine is built.
        Command::Init => Ok(()),

        Command::CreatePayee { names } => {
            let payees = names.into_iter().map(Payee::new).collect();
            for payee in engine.create_payees(payees).await? {
                println!("{}  {}", payee.id, payee.name);
            }
            Ok(())
        }

        Command::CreateAccount { name } => {
            for account in engine.create_accounts(vec![Account::new(name)]).await? {
                println!("{}  {}", account.id, account.name);
            }
            Ok(())
        }

        Command::Payees => {
            for payee in engine.list_payees().await? {
                println!("{}  {}", payee.id, payee.name);
            }
            Ok(())
        }

        Command::Accounts => {
            let accounts = engine.list_accounts().await?;
            let mut stdout = std::io::stdout();
            io::write_accounts_csv(&accounts, &mut stdout)
        }

        Command::Transactions { account_id } => {
            for transaction in engine.list_transactions_by_account(&account_id).await? {
                println!(
                    "{}  {}  {}  {}",
                    transaction.effective_date,
                    transaction.payee_id,
                    transaction.amount,
                    if transaction.cleared { "cleared" } else { "pending" },
                );
            }
            Ok(())
        }

        Command::Import { input_file } => {
            let file = std::fs::File::open(&input_file)?;
            let transactions = io::read_transactions_csv(file)?;
            let created = engine.create_transactions(transactions).await?;
            println!("Imported {} transactions", created.len());
            Ok(())
        }

        Command::Sync { account_id } => {
            let account = engine.sync_account(&account_id).await?;
            println!("Synced {}  {}", account.id, account.name);
            Ok(())
        }
    }
}
