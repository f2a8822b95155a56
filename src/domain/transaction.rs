use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CategoryId, Cents, UserId};

pub type TransactionId = Uuid;

/// Direction of a transaction from the payer's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Income,
    Expense,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Income => "income",
            Flow::Expense => "expense",
        }
    }

    pub fn is_income(&self) -> bool {
        matches!(self, Flow::Income)
    }
}

impl std::str::FromStr for Flow {
    type Err = ParseFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Flow::Income),
            "expense" => Ok(Flow::Expense),
            _ => Err(ParseFlowError),
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFlowError;

impl std::fmt::Display for ParseFlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected 'income' or 'expense'")
    }
}

impl std::error::Error for ParseFlowError {}

/// A recorded income or expense. Transactions are append-only: corrections
/// are made by recording a compensating transaction, never by mutation.
///
/// `shared_with` is `None` for a personal transaction and `Some` for a cost
/// shared among a participant set. The payer may or may not appear in the
/// set; their own share nets out during balance computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Who paid (expense) or received (income)
    pub payer: UserId,
    /// Amount in cents, always positive; the sign convention is applied by
    /// the settlement engine
    pub amount_cents: Cents,
    /// Accounting period, 1-12
    pub month: u32,
    pub year: i32,
    pub category: CategoryId,
    pub flow: Flow,
    /// Participants sharing the cost, or None when not shared
    pub shared_with: Option<Vec<UserId>>,
    pub description: Option<String>,
    /// When this transaction was recorded in the system
    pub recorded_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        payer: UserId,
        amount_cents: Cents,
        month: u32,
        year: i32,
        category: CategoryId,
        flow: Flow,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            payer,
            amount_cents,
            month,
            year,
            category,
            flow,
            shared_with: None,
            description: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_shared_with(mut self, participants: Vec<UserId>) -> Self {
        self.shared_with = Some(participants);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns true if this transaction splits its cost among participants
    pub fn is_shared(&self) -> bool {
        self.shared_with.is_some()
    }
}
