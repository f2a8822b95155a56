// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use aequo::application::{LedgerService, RecordTransaction};
use aequo::domain::{Cents, Flow};
use anyhow::Result;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Test fixture: a three-person household
pub struct Household;

impl Household {
    pub const MEMBERS: [&'static str; 3] = ["Alice", "Bob", "Carol"];

    /// Register Alice, Bob and Carol
    pub async fn create_members(service: &LedgerService) -> Result<()> {
        for name in Self::MEMBERS {
            service.add_user(name.into()).await?;
        }
        Ok(())
    }

    /// Record a shared expense paid by `payer`, split among `shared_with`
    pub async fn shared_expense(
        service: &LedgerService,
        payer: &str,
        amount_cents: Cents,
        month: u32,
        year: i32,
        shared_with: &[&str],
    ) -> Result<()> {
        service
            .record_transaction(RecordTransaction {
                payer: payer.to_string(),
                amount_cents,
                month,
                year,
                category: "groceries".to_string(),
                flow: Flow::Expense,
                shared_with: shared_with.iter().map(|s| s.to_string()).collect(),
                description: None,
            })
            .await?;
        Ok(())
    }

    /// Record an income for `payer`
    pub async fn income(
        service: &LedgerService,
        payer: &str,
        amount_cents: Cents,
        month: u32,
        year: i32,
    ) -> Result<()> {
        service
            .record_transaction(RecordTransaction {
                payer: payer.to_string(),
                amount_cents,
                month,
                year,
                category: "taxes".to_string(),
                flow: Flow::Income,
                shared_with: vec![],
                description: None,
            })
            .await?;
        Ok(())
    }
}
