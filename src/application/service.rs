use std::collections::HashMap;

use crate::domain::{
    CategoryId, Cents, DEFAULT_CATEGORIES, ExpenseCategory, Flow, SettlementTransfer, Transaction,
    User, UserId, compute_net_balances, settle,
};
use crate::storage::{IntegrityStats, Repository};

use super::{AppError, CategorySummary, PeriodReport};

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.), and
/// the caller of the settlement engine's contract: it assembles snapshots
/// and resolves names to identifiers at this boundary.
pub struct LedgerService {
    repo: Repository,
}

/// Input for recording a transaction. Users and categories are referenced
/// by name; the service resolves them.
pub struct RecordTransaction {
    pub payer: String,
    pub amount_cents: Cents,
    pub month: u32,
    pub year: i32,
    pub category: String,
    pub flow: Flow,
    /// Names of participants sharing the cost; empty = not shared
    pub shared_with: Vec<String>,
    pub description: Option<String>,
}

/// Result of recording a transaction
#[derive(Debug)]
pub struct TransactionResult {
    pub transaction: Transaction,
    pub payer_name: String,
    pub category_name: String,
    pub participant_names: Vec<String>,
}

/// Which transactions form the snapshot handed to the settlement engine.
/// The accumulation boundary is always the caller's choice; `default()`
/// means the whole ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodFilter {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Filter for querying transactions
#[derive(Default)]
pub struct TransactionFilter {
    pub payer: Option<String>,
    pub category: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub limit: Option<usize>,
}

/// Net balance entry for a user
pub struct BalanceEntry {
    pub user: User,
    pub balance_cents: Cents,
}

/// A settlement transfer with its users resolved
pub struct SettlementRow {
    pub debtor: User,
    pub creditor: User,
    pub amount_cents: Cents,
}

/// Debt balances plus the minimal transfer plan that settles them
pub struct SettlementPlan {
    pub balances: Vec<BalanceEntry>,
    pub transfers: Vec<SettlementRow>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path and seed the default
    /// expense categories.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        let service = Self::new(repo);
        service.seed_default_categories().await?;
        Ok(service)
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    async fn seed_default_categories(&self) -> Result<(), AppError> {
        for name in DEFAULT_CATEGORIES {
            if self.repo.get_category_by_name(name).await?.is_none() {
                let category = ExpenseCategory::new((*name).to_string());
                self.repo.save_category(&category).await?;
            }
        }
        Ok(())
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user.
    pub async fn add_user(&self, name: String) -> Result<User, AppError> {
        if self.repo.get_user_by_name(&name).await?.is_some() {
            return Err(AppError::UserAlreadyExists(name));
        }

        let user = User::new(name);
        self.repo.save_user(&user).await?;
        Ok(user)
    }

    /// Get a user by name.
    pub async fn get_user(&self, name: &str) -> Result<User, AppError> {
        self.repo
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| AppError::UserNotFound(name.to_string()))
    }

    /// List all users, ordered by name.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    /// Get a map of user IDs to names (useful for display).
    pub async fn get_user_names(&self) -> Result<HashMap<UserId, String>, AppError> {
        let users = self.repo.list_users().await?;
        Ok(users.into_iter().map(|u| (u.id, u.name)).collect())
    }

    // ========================
    // Category operations
    // ========================

    /// Register a new expense category.
    pub async fn add_category(&self, name: String) -> Result<ExpenseCategory, AppError> {
        if self.repo.get_category_by_name(&name).await?.is_some() {
            return Err(AppError::CategoryAlreadyExists(name));
        }

        let category = ExpenseCategory::new(name);
        self.repo.save_category(&category).await?;
        Ok(category)
    }

    /// Get a category by name.
    pub async fn get_category(&self, name: &str) -> Result<ExpenseCategory, AppError> {
        self.repo
            .get_category_by_name(name)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(name.to_string()))
    }

    /// List all categories, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<ExpenseCategory>, AppError> {
        Ok(self.repo.list_categories().await?)
    }

    /// Get a map of category IDs to names (useful for display).
    pub async fn get_category_names(&self) -> Result<HashMap<CategoryId, String>, AppError> {
        let categories = self.repo.list_categories().await?;
        Ok(categories.into_iter().map(|c| (c.id, c.name)).collect())
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a new transaction.
    pub async fn record_transaction(
        &self,
        input: RecordTransaction,
    ) -> Result<TransactionResult, AppError> {
        if input.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        if !(1..=12).contains(&input.month) {
            return Err(AppError::InvalidMonth(input.month));
        }
        if input.flow.is_income() && !input.shared_with.is_empty() {
            return Err(AppError::SharedIncome(input.payer));
        }

        let payer = self.get_user(&input.payer).await?;
        let category = self.get_category(&input.category).await?;

        let mut participants = Vec::with_capacity(input.shared_with.len());
        for name in &input.shared_with {
            participants.push(self.get_user(name).await?);
        }

        let mut transaction = Transaction::new(
            payer.id,
            input.amount_cents,
            input.month,
            input.year,
            category.id,
            input.flow,
        );
        if !participants.is_empty() {
            transaction =
                transaction.with_shared_with(participants.iter().map(|u| u.id).collect());
        }
        if let Some(desc) = input.description {
            transaction = transaction.with_description(desc);
        }

        self.repo.save_transaction(&transaction).await?;

        Ok(TransactionResult {
            transaction,
            payer_name: payer.name,
            category_name: category.name,
            participant_names: participants.into_iter().map(|u| u.name).collect(),
        })
    }

    /// List transactions with optional filters.
    pub async fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        if let Some(month) = filter.month {
            if !(1..=12).contains(&month) {
                return Err(AppError::InvalidMonth(month));
            }
        }

        let payer_id = match &filter.payer {
            Some(name) => Some(self.get_user(name).await?.id),
            None => None,
        };
        let category_id = match &filter.category {
            Some(name) => Some(self.get_category(name).await?.id),
            None => None,
        };

        Ok(self
            .repo
            .list_transactions_filtered(payer_id, category_id, filter.month, filter.year, filter.limit)
            .await?)
    }

    // ========================
    // Balances and settlement
    // ========================

    /// Load the snapshot the engine operates on: the full user roster plus
    /// the transactions matching the period filter.
    async fn snapshot(&self, period: PeriodFilter) -> Result<(Vec<User>, Vec<Transaction>), AppError> {
        if let Some(month) = period.month {
            if !(1..=12).contains(&month) {
                return Err(AppError::InvalidMonth(month));
            }
        }
        let users = self.repo.list_users().await?;
        let transactions = self
            .repo
            .list_transactions_filtered(None, None, period.month, period.year, None)
            .await?;
        Ok((users, transactions))
    }

    /// Net balances over the snapshot, income included. Every known user
    /// gets an entry; users without transactions sit at zero.
    pub async fn net_balances(&self, period: PeriodFilter) -> Result<Vec<BalanceEntry>, AppError> {
        let (users, transactions) = self.snapshot(period).await?;
        let balances = compute_net_balances(&users, &transactions)?;

        Ok(users
            .into_iter()
            .map(|user| {
                let balance_cents = balances.get(&user.id).copied().unwrap_or(0);
                BalanceEntry {
                    user,
                    balance_cents,
                }
            })
            .collect())
    }

    /// Compute the debt balances and the minimal transfer plan for the
    /// snapshot. Only shared expenses create pairwise debt, so the engine is
    /// fed that subset; income and personal expenses never reach `settle`,
    /// keeping its zero-sum precondition satisfied by construction.
    pub async fn settlement_plan(&self, period: PeriodFilter) -> Result<SettlementPlan, AppError> {
        let (users, transactions) = self.snapshot(period).await?;
        let shared: Vec<Transaction> = transactions
            .into_iter()
            .filter(|tx| tx.is_shared() && !tx.flow.is_income())
            .collect();

        let balances = compute_net_balances(&users, &shared)?;
        let transfers = settle(&balances)?;

        let by_id: HashMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();
        let resolve = |id: UserId| -> Result<User, AppError> {
            by_id
                .get(&id)
                .map(|u| (*u).clone())
                .ok_or_else(|| AppError::UserNotFound(id.to_string()))
        };

        let mut balance_entries = Vec::with_capacity(balances.len());
        for (&id, &balance_cents) in &balances {
            balance_entries.push(BalanceEntry {
                user: resolve(id)?,
                balance_cents,
            });
        }

        let mut rows = Vec::with_capacity(transfers.len());
        for SettlementTransfer {
            debtor,
            creditor,
            amount_cents,
        } in transfers
        {
            rows.push(SettlementRow {
                debtor: resolve(debtor)?,
                creditor: resolve(creditor)?,
                amount_cents,
            });
        }

        Ok(SettlementPlan {
            balances: balance_entries,
            transfers: rows,
        })
    }

    // ========================
    // Reporting
    // ========================

    /// Income vs expense summary for one accounting period, with a
    /// per-category expense breakdown.
    pub async fn period_report(&self, month: u32, year: i32) -> Result<PeriodReport, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::InvalidMonth(month));
        }

        let total_income = self.repo.sum_by_flow(month, year, Flow::Income).await?;
        let total_expense = self.repo.sum_by_flow(month, year, Flow::Expense).await?;
        let aggregates = self.repo.aggregate_expense_categories(month, year).await?;

        let expense_categories = aggregates
            .into_iter()
            .map(|agg| {
                let average = if agg.count > 0 { agg.total / agg.count } else { 0 };
                let percentage = if total_expense > 0 {
                    (agg.total as f64 / total_expense as f64) * 100.0
                } else {
                    0.0
                };
                CategorySummary {
                    category: agg.category,
                    total: agg.total,
                    count: agg.count,
                    average,
                    percentage,
                }
            })
            .collect();

        Ok(PeriodReport {
            month,
            year,
            total_income,
            total_expense,
            net: total_income - total_expense,
            expense_categories,
        })
    }

    // ========================
    // Maintenance operations
    // ========================

    /// Scan the store for records the engine would reject.
    pub async fn check_integrity(&self) -> Result<IntegrityStats, AppError> {
        Ok(self.repo.get_integrity_stats().await?)
    }

    /// Drop all data and recreate the schema with the default categories.
    pub async fn reset(&self) -> Result<(), AppError> {
        self.repo.reset().await?;
        self.seed_default_categories().await?;
        Ok(())
    }
}
