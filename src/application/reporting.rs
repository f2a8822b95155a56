use serde::{Deserialize, Serialize};

use crate::domain::Cents;

/// Income vs expense summary for one accounting period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodReport {
    pub month: u32,
    pub year: i32,
    pub total_income: Cents,
    pub total_expense: Cents,
    pub net: Cents,
    pub expense_categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    pub total: Cents,
    pub count: i64,
    pub average: Cents,
    pub percentage: f64,
}

// Helper struct for repository aggregation
#[derive(Debug, Clone)]
pub struct CategoryAggregate {
    pub category: String,
    pub count: i64,
    pub total: Cents,
}
