use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::{Parser, Subcommand};

use crate::application::{
    LedgerService, PeriodFilter, RecordTransaction, TransactionFilter,
};
use crate::domain::{Flow, format_cents, parse_cents};

/// Aequo - Shared-Expense Ledger
#[derive(Parser)]
#[command(name = "aequo")]
#[command(about = "A local-first shared-expense ledger with debt settlement")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "aequo.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Expense category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Record a transaction
    Add {
        /// Amount (e.g., "90.00" or "90")
        amount: String,

        /// Who paid (expense) or received (income)
        #[arg(short, long)]
        payer: String,

        /// Expense category name
        #[arg(short, long)]
        category: String,

        /// Accounting month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Accounting year
        #[arg(short, long)]
        year: i32,

        /// Record as income instead of expense
        #[arg(long)]
        income: bool,

        /// User sharing the cost (repeat for each participant)
        #[arg(long = "share")]
        share: Vec<String>,

        /// Description of the transaction
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List recorded transactions
    Transactions {
        /// Filter by payer name
        #[arg(long)]
        payer: Option<String>,

        /// Filter by category name
        #[arg(long)]
        category: Option<String>,

        /// Filter by month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Filter by year
        #[arg(long)]
        year: Option<i32>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show net balances between users
    Balances {
        /// Restrict the snapshot to a month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Restrict the snapshot to a year
        #[arg(long)]
        year: Option<i32>,
    },

    /// Compute the minimal transfer plan that settles all debts
    Settle {
        /// Restrict the snapshot to a month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Restrict the snapshot to a year
        #[arg(long)]
        year: Option<i32>,
    },

    /// Period summary report (income vs expense, category breakdown)
    Report {
        /// Month (1-12, defaults to the current month)
        #[arg(long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Verify store integrity
    Check,

    /// Delete all data and reinitialize empty tables
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Add {
        /// User name (must be unique)
        name: String,
    },

    /// List all users
    List,
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Register a new expense category
    Add {
        /// Category name (must be unique)
        name: String,
    },

    /// List all categories
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::User(user_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Category(category_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_category_command(&service, category_cmd).await?;
            }

            Commands::Add {
                amount,
                payer,
                category,
                month,
                year,
                income,
                share,
                description,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '90.00' or '90'")?;

                let flow = if income { Flow::Income } else { Flow::Expense };
                let result = service
                    .record_transaction(RecordTransaction {
                        payer,
                        amount_cents,
                        month,
                        year,
                        category,
                        flow,
                        shared_with: share,
                        description,
                    })
                    .await?;

                let tx = &result.transaction;
                println!(
                    "Recorded {}: {} by {} ({}, {}/{}) ({})",
                    tx.flow,
                    format_cents(tx.amount_cents),
                    result.payer_name,
                    result.category_name,
                    tx.month,
                    tx.year,
                    tx.id
                );
                if !result.participant_names.is_empty() {
                    println!("  Shared with: {}", result.participant_names.join(", "));
                }
            }

            Commands::Transactions {
                payer,
                category,
                month,
                year,
                limit,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_transactions_command(&service, payer, category, month, year, limit).await?;
            }

            Commands::Balances { month, year } => {
                let service = LedgerService::connect(&self.database).await?;
                run_balances_command(&service, PeriodFilter { month, year }, self.verbose).await?;
            }

            Commands::Settle { month, year } => {
                let service = LedgerService::connect(&self.database).await?;
                run_settle_command(&service, PeriodFilter { month, year }, self.verbose).await?;
            }

            Commands::Report {
                month,
                year,
                format,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                let now = Utc::now();
                let month = month.unwrap_or(now.month());
                let year = year.unwrap_or(now.year());
                run_report_command(&service, month, year, &format).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Reset { force } => {
                if !force {
                    anyhow::bail!("Refusing to wipe the ledger without --force");
                }
                let service = LedgerService::connect(&self.database).await?;
                service.reset().await?;
                println!("Ledger reset: {}", self.database);
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add { name } => {
            let user = service.add_user(name).await?;
            println!("Added user: {} ({})", user.name, user.id);
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<20} {:<12}", "NAME", "SINCE");
                println!("{}", "-".repeat(32));
                for user in users {
                    println!(
                        "{:<20} {:<12}",
                        user.name,
                        user.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_category_command(service: &LedgerService, cmd: CategoryCommands) -> Result<()> {
    match cmd {
        CategoryCommands::Add { name } => {
            let category = service.add_category(name).await?;
            println!("Added category: {}", category.name);
        }

        CategoryCommands::List => {
            let categories = service.list_categories().await?;
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in categories {
                    println!("{}", category.name);
                }
            }
        }
    }
    Ok(())
}

async fn run_transactions_command(
    service: &LedgerService,
    payer: Option<String>,
    category: Option<String>,
    month: Option<u32>,
    year: Option<i32>,
    limit: Option<usize>,
) -> Result<()> {
    let transactions = service
        .list_transactions(TransactionFilter {
            payer,
            category,
            month,
            year,
            limit,
        })
        .await?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let user_names = service.get_user_names().await?;
    let category_names = service.get_category_names().await?;
    let name_of = |id| {
        user_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("{:.8}", id))
    };

    println!(
        "{:<12} {:<15} {:>12} {:<8} {:<15} {:<30}",
        "PERIOD", "PAYER", "AMOUNT", "FLOW", "CATEGORY", "SHARED WITH"
    );
    println!("{}", "-".repeat(95));
    for tx in transactions {
        let shared = tx
            .shared_with
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|&id| name_of(id))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<12} {:<15} {:>12} {:<8} {:<15} {:<30}",
            format!("{}/{}", tx.month, tx.year),
            truncate(&name_of(tx.payer), 15),
            format_cents(tx.amount_cents),
            tx.flow,
            truncate(
                category_names
                    .get(&tx.category)
                    .map(String::as_str)
                    .unwrap_or("?"),
                15
            ),
            truncate(&shared, 30),
        );
    }

    Ok(())
}

async fn run_balances_command(
    service: &LedgerService,
    period: PeriodFilter,
    verbose: bool,
) -> Result<()> {
    let balances = service.net_balances(period).await?;

    if verbose {
        eprintln!("[balances] {} user(s) in snapshot", balances.len());
    }

    if balances.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("{:<20} {:>12}", "USER", "BALANCE");
    println!("{}", "-".repeat(32));
    for entry in balances {
        println!(
            "{:<20} {:>12}",
            entry.user.name,
            format_cents(entry.balance_cents)
        );
    }

    Ok(())
}

async fn run_settle_command(
    service: &LedgerService,
    period: PeriodFilter,
    verbose: bool,
) -> Result<()> {
    let plan = service.settlement_plan(period).await?;

    if verbose {
        eprintln!(
            "[settle] {} debt balance(s), {} transfer(s)",
            plan.balances.len(),
            plan.transfers.len()
        );
    }

    if plan.transfers.is_empty() {
        println!("All settled up.");
        return Ok(());
    }

    println!("{:<20} {:<20} {:>12}", "DEBTOR", "CREDITOR", "AMOUNT");
    println!("{}", "-".repeat(52));
    for row in &plan.transfers {
        println!(
            "{:<20} {:<20} {:>12}",
            row.debtor.name,
            row.creditor.name,
            format_cents(row.amount_cents)
        );
    }

    Ok(())
}

async fn run_report_command(
    service: &LedgerService,
    month: u32,
    year: i32,
    format: &str,
) -> Result<()> {
    let report = service.period_report(month, year).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "csv" => {
            println!("category,total,count,average,percentage");
            for cat in &report.expense_categories {
                println!(
                    "{},{},{},{},{:.2}",
                    cat.category, cat.total, cat.count, cat.average, cat.percentage
                );
            }
        }
        _ => {
            // Table format
            println!("Period Summary: {}/{}", report.month, report.year);
            println!();
            println!("Total Income:   {:>15}", format_cents(report.total_income));
            println!("Total Expense:  {:>15}", format_cents(report.total_expense));
            println!("{}", "-".repeat(32));
            println!("Net:            {:>15}", format_cents(report.net));

            if !report.expense_categories.is_empty() {
                println!();
                println!(
                    "{:<20} {:>12} {:>8} {:>12} {:>8}",
                    "CATEGORY", "TOTAL", "COUNT", "AVERAGE", "PERCENT"
                );
                println!("{}", "-".repeat(65));
                for cat in &report.expense_categories {
                    println!(
                        "{:<20} {:>12} {:>8} {:>12} {:>7.1}%",
                        truncate(&cat.category, 20),
                        format_cents(cat.total),
                        cat.count,
                        format_cents(cat.average),
                        cat.percentage
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter.export_transactions_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "balances" => {
            let count = exporter
                .export_balances_csv(writer, PeriodFilter::default())
                .await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} users, {} categories, {} transactions",
                    snapshot.users.len(),
                    snapshot.categories.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, balances, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let stats = service.check_integrity().await?;

    println!("Store integrity check");
    println!("  Users:        {}", stats.user_count);
    println!("  Categories:   {}", stats.category_count);
    println!("  Transactions: {}", stats.transaction_count);
    println!();

    if stats.is_clean() {
        println!("No problems found.");
    } else {
        println!("Problems:");
        if stats.invalid_user_refs > 0 {
            println!("  {} transaction(s) with unknown payer", stats.invalid_user_refs);
        }
        if stats.invalid_category_refs > 0 {
            println!(
                "  {} transaction(s) with unknown category",
                stats.invalid_category_refs
            );
        }
        if stats.invalid_amounts > 0 {
            println!(
                "  {} transaction(s) with non-positive amount",
                stats.invalid_amounts
            );
        }
        if stats.invalid_months > 0 {
            println!("  {} transaction(s) with month outside 1-12", stats.invalid_months);
        }
        if stats.empty_shared_sets > 0 {
            println!(
                "  {} shared transaction(s) with empty participant set",
                stats.empty_shared_sets
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
