use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::RecordId;

/// Errors reported at the ledger boundary. Any of these leaves the ledger
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid transaction: {0}")]
    Validation(String),

    #[error(
        "Insufficient position in {portfolio}/{ticker} on {date}: held {held}, requested {requested}"
    )]
    InsufficientPosition {
        portfolio: String,
        ticker: String,
        date: NaiveDate,
        held: Decimal,
        requested: Decimal,
    },

    #[error("Transaction {0} not found")]
    NotFound(RecordId),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
