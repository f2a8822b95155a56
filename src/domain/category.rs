use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CategoryId = Uuid;

/// Categories every fresh ledger starts with.
pub const DEFAULT_CATEGORIES: &[&str] =
    &["groceries", "healthcare", "taxes", "restaurants", "shopping"];

/// An expense category. A flat set with no hierarchy; categories are
/// created once and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl ExpenseCategory {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
        }
    }
}
