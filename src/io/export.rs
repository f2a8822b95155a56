use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{LedgerService, PeriodFilter, TransactionFilter};
use crate::domain::{ExpenseCategory, Transaction, User};

/// Full-ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub categories: Vec<ExpenseCategory>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export transactions to CSV format
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self
            .service
            .list_transactions(TransactionFilter::default())
            .await?;
        let user_names = self.service.get_user_names().await?;
        let category_names = self.service.get_category_names().await?;

        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record([
            "id",
            "recorded_at",
            "payer",
            "amount_cents",
            "month",
            "year",
            "category",
            "flow",
            "shared_with",
            "description",
        ])?;

        let mut count = 0;
        for tx in &transactions {
            let payer = user_names
                .get(&tx.payer)
                .cloned()
                .unwrap_or_else(|| tx.payer.to_string());
            let category = category_names
                .get(&tx.category)
                .cloned()
                .unwrap_or_else(|| tx.category.to_string());
            let shared_with = tx
                .shared_with
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|id| {
                    user_names
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| id.to_string())
                })
                .collect::<Vec<_>>()
                .join(";");

            csv_writer.write_record([
                tx.id.to_string(),
                tx.recorded_at.to_rfc3339(),
                payer,
                tx.amount_cents.to_string(),
                tx.month.to_string(),
                tx.year.to_string(),
                category,
                tx.flow.to_string(),
                shared_with,
                tx.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export net balances to CSV format
    pub async fn export_balances_csv<W: Write>(
        &self,
        writer: W,
        period: PeriodFilter,
    ) -> Result<usize> {
        let balances = self.service.net_balances(period).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(["user", "balance_cents"])?;

        let mut count = 0;
        for entry in &balances {
            csv_writer.write_record([
                entry.user.name.clone(),
                entry.balance_cents.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let users = self.service.list_users().await?;
        let categories = self.service.list_categories().await?;
        let transactions = self
            .service
            .list_transactions(TransactionFilter::default())
            .await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            users,
            categories,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
