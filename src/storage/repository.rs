use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::CategoryAggregate;
use crate::domain::{
    CategoryId, Cents, ExpenseCategory, Flow, Transaction, User, UserId,
};

use super::MIGRATION_001_INITIAL;

/// Statistics for store-level integrity verification: counts plus records
/// the settlement engine would reject.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub user_count: i64,
    pub category_count: i64,
    pub transaction_count: i64,
    pub invalid_user_refs: i64,
    pub invalid_category_refs: i64,
    pub invalid_amounts: i64,
    pub invalid_months: i64,
    pub empty_shared_sets: i64,
}

impl IntegrityStats {
    pub fn is_clean(&self) -> bool {
        self.invalid_user_refs == 0
            && self.invalid_category_refs == 0
            && self.invalid_amounts == 0
            && self.invalid_months == 0
            && self.empty_shared_sets == 0
    }
}

/// Repository for persisting and querying users, categories and transactions.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Drop all tables and recreate the schema.
    pub async fn reset(&self) -> Result<()> {
        for table in ["transactions", "categories", "users"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to drop table {}", table))?;
        }
        self.migrate().await
    }

    // ========================
    // User operations
    // ========================

    /// Save a new user to the database.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(user.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save user")?;
        Ok(())
    }

    /// Get a user by name.
    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, created_at FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// List all users, ordered by name.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Category operations
    // ========================

    /// Save a new expense category to the database.
    pub async fn save_category(&self, category: &ExpenseCategory) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
            .bind(category.id.to_string())
            .bind(&category.name)
            .bind(category.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .context("Failed to save category")?;
        Ok(())
    }

    /// Get a category by name.
    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<ExpenseCategory>> {
        let row = sqlx::query("SELECT id, name, created_at FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch category by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_category(&row)?)),
            None => Ok(None),
        }
    }

    /// List all categories, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<ExpenseCategory>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list categories")?;

        rows.iter().map(Self::row_to_category).collect()
    }

    fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<ExpenseCategory> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(ExpenseCategory {
            id: Uuid::parse_str(&id_str).context("Invalid category ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Save a new transaction to the database.
    pub async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        let shared_with_json = transaction
            .shared_with
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, payer_id, amount_cents, month, year, category_id, flow, shared_with, description, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.payer.to_string())
        .bind(transaction.amount_cents)
        .bind(transaction.month as i64)
        .bind(transaction.year as i64)
        .bind(transaction.category.to_string())
        .bind(transaction.flow.as_str())
        .bind(shared_with_json)
        .bind(&transaction.description)
        .bind(transaction.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;

        Ok(())
    }

    /// List transactions with optional filters, ordered by recording time.
    pub async fn list_transactions_filtered(
        &self,
        payer_id: Option<UserId>,
        category_id: Option<CategoryId>,
        month: Option<u32>,
        year: Option<i32>,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, payer_id, amount_cents, month, year, category_id, flow, shared_with, description, recorded_at FROM transactions WHERE 1=1"
        );

        let payer_id_str = payer_id.map(|id| id.to_string());
        let category_id_str = category_id.map(|id| id.to_string());

        if payer_id.is_some() {
            query.push_str(" AND payer_id = ?");
        }
        if category_id.is_some() {
            query.push_str(" AND category_id = ?");
        }
        if month.is_some() {
            query.push_str(" AND month = ?");
        }
        if year.is_some() {
            query.push_str(" AND year = ?");
        }

        query.push_str(" ORDER BY recorded_at, id");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);

        if let Some(ref pid) = payer_id_str {
            sql_query = sql_query.bind(pid);
        }
        if let Some(ref cid) = category_id_str {
            sql_query = sql_query.bind(cid);
        }
        if let Some(m) = month {
            sql_query = sql_query.bind(m as i64);
        }
        if let Some(y) = year {
            sql_query = sql_query.bind(y as i64);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Sum transaction amounts for a flow within one period.
    pub async fn sum_by_flow(&self, month: u32, year: i32, flow: Flow) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) as total
            FROM transactions
            WHERE flow = ? AND month = ? AND year = ?
            "#,
        )
        .bind(flow.as_str())
        .bind(month as i64)
        .bind(year as i64)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum transactions by flow")?;

        Ok(row.get("total"))
    }

    /// Aggregate expense totals per category for one period.
    pub async fn aggregate_expense_categories(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Vec<CategoryAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT c.name as category, COUNT(*) as count, SUM(t.amount_cents) as total
            FROM transactions t
            JOIN categories c ON c.id = t.category_id
            WHERE t.flow = 'expense' AND t.month = ? AND t.year = ?
            GROUP BY c.name
            ORDER BY total DESC, c.name
            "#,
        )
        .bind(month as i64)
        .bind(year as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate expense categories")?;

        Ok(rows
            .iter()
            .map(|row| CategoryAggregate {
                category: row.get("category"),
                count: row.get("count"),
                total: row.get("total"),
            })
            .collect())
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let user_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let category_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM categories")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        // Transactions whose payer no longer resolves
        let invalid_user_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = t.payer_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_category_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM transactions t
            WHERE NOT EXISTS (SELECT 1 FROM categories c WHERE c.id = t.category_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        let invalid_months: i64 = sqlx::query(
            "SELECT COUNT(*) as count FROM transactions WHERE month < 1 OR month > 12",
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let empty_shared_sets: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE shared_with = '[]'")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        Ok(IntegrityStats {
            user_count,
            category_count,
            transaction_count,
            invalid_user_refs,
            invalid_category_refs,
            invalid_amounts,
            invalid_months,
            empty_shared_sets,
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let payer_str: String = row.get("payer_id");
        let category_str: String = row.get("category_id");
        let flow_str: String = row.get("flow");
        let shared_with_json: Option<String> = row.get("shared_with");
        let recorded_at_str: String = row.get("recorded_at");

        let shared_with = shared_with_json
            .map(|json| serde_json::from_str::<Vec<UserId>>(&json))
            .transpose()
            .context("Invalid shared_with JSON")?;

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            payer: Uuid::parse_str(&payer_str).context("Invalid payer ID")?,
            amount_cents: row.get("amount_cents"),
            month: row.get::<i64, _>("month") as u32,
            year: row.get::<i64, _>("year") as i32,
            category: Uuid::parse_str(&category_str).context("Invalid category ID")?,
            flow: flow_str
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid flow: {}", flow_str))?,
            shared_with,
            description: row.get("description"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
