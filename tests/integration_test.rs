mod common;

use aequo::application::{PeriodFilter, RecordTransaction};
use aequo::domain::Flow;
use aequo::io::Exporter;
use anyhow::Result;
use common::{Household, test_service};

#[tokio::test]
async fn test_full_household_workflow() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Household::create_members(&service).await?;
    service.add_category("rent".into()).await?;

    // A month of activity: salary, rent split three ways, a dinner for two.
    Household::income(&service, "Alice", 300000, 5, 2024).await?;
    service
        .record_transaction(RecordTransaction {
            payer: "Alice".to_string(),
            amount_cents: 150000,
            month: 5,
            year: 2024,
            category: "rent".to_string(),
            flow: Flow::Expense,
            shared_with: Household::MEMBERS.iter().map(|s| s.to_string()).collect(),
            description: Some("May rent".to_string()),
        })
        .await?;
    service
        .record_transaction(RecordTransaction {
            payer: "Bob".to_string(),
            amount_cents: 8000,
            month: 5,
            year: 2024,
            category: "restaurants".to_string(),
            flow: Flow::Expense,
            shared_with: vec!["Bob".to_string(), "Carol".to_string()],
            description: None,
        })
        .await?;

    // Debts: Bob owes 50000 - 4000, Carol owes 50000 + 4000.
    let plan = service.settlement_plan(PeriodFilter::default()).await?;
    let mut transfers: Vec<(String, String, i64)> = plan
        .transfers
        .iter()
        .map(|r| {
            (
                r.debtor.name.clone(),
                r.creditor.name.clone(),
                r.amount_cents,
            )
        })
        .collect();
    transfers.sort();
    assert_eq!(
        transfers,
        vec![
            ("Bob".to_string(), "Alice".to_string(), 46000),
            ("Carol".to_string(), "Alice".to_string(), 54000),
        ]
    );

    // The store stays healthy.
    let stats = service.check_integrity().await?;
    assert!(stats.is_clean());
    assert_eq!(stats.user_count, 3);
    assert_eq!(stats.transaction_count, 3);

    Ok(())
}

#[tokio::test]
async fn test_export_transactions_and_balances_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Household::create_members(&service).await?;
    Household::shared_expense(&service, "Alice", 9000, 3, 2024, &["Alice", "Bob", "Carol"])
        .await?;

    let exporter = Exporter::new(&service);

    let mut buf = Vec::new();
    let count = exporter.export_transactions_csv(&mut buf).await?;
    assert_eq!(count, 1);
    let csv = String::from_utf8(buf)?;
    assert!(csv.starts_with("id,recorded_at,payer,"));
    assert!(csv.contains("Alice"));
    assert!(csv.contains("9000"));

    let mut buf = Vec::new();
    let count = exporter
        .export_balances_csv(&mut buf, PeriodFilter::default())
        .await?;
    assert_eq!(count, 3);
    let csv = String::from_utf8(buf)?;
    assert!(csv.contains("Alice,6000"));
    assert!(csv.contains("Bob,-3000"));

    Ok(())
}

#[tokio::test]
async fn test_export_full_json_snapshot() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Household::create_members(&service).await?;
    Household::shared_expense(&service, "Bob", 4200, 7, 2024, &["Alice", "Bob"]).await?;

    let exporter = Exporter::new(&service);
    let mut buf = Vec::new();
    let snapshot = exporter.export_full_json(&mut buf).await?;

    assert_eq!(snapshot.users.len(), 3);
    assert_eq!(snapshot.categories.len(), 5);
    assert_eq!(snapshot.transactions.len(), 1);

    let parsed: serde_json::Value = serde_json::from_slice(&buf)?;
    assert_eq!(parsed["transactions"][0]["amount_cents"], 4200);

    Ok(())
}

#[tokio::test]
async fn test_reset_wipes_data_and_reseeds_defaults() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Household::create_members(&service).await?;
    Household::shared_expense(&service, "Alice", 1000, 1, 2024, &["Alice", "Bob"]).await?;

    service.reset().await?;

    assert!(service.list_users().await?.is_empty());
    let stats = service.check_integrity().await?;
    assert_eq!(stats.transaction_count, 0);

    let categories = service.list_categories().await?;
    assert_eq!(categories.len(), 5, "Default categories come back");

    Ok(())
}

#[tokio::test]
async fn test_reconnect_sees_persisted_data() -> Result<()> {
    use aequo::application::LedgerService;

    let temp_dir = tempfile::TempDir::new()?;
    let db_path = temp_dir.path().join("ledger.db");
    let path = db_path.to_str().unwrap();

    {
        let service = LedgerService::init(path).await?;
        Household::create_members(&service).await?;
        Household::shared_expense(&service, "Alice", 9000, 3, 2024, &["Alice", "Bob", "Carol"])
            .await?;
    }

    let service = LedgerService::connect(path).await?;
    let plan = service.settlement_plan(PeriodFilter::default()).await?;
    assert_eq!(plan.transfers.len(), 2);

    Ok(())
}
