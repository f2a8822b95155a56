use thiserror::Error;

use crate::domain::SettlementError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    CategoryAlreadyExists(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid month {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("Income cannot be shared (payer: {0})")]
    SharedIncome(String),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
