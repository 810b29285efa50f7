//! Append-only transaction ledger.

mod jsonl;
mod memory;
pub mod migrations;

pub use jsonl::JsonlLedger;
pub use memory::MemoryLedger;

use std::collections::HashSet;

use anyhow::Result;

use crate::error::LedgerError;
use crate::models::{NewTransaction, RecordId, TransactionKind, TransactionRecord};

/// Narrows [`Ledger::all_records`]. The default filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub portfolio: Option<String>,
    pub kinds: Option<HashSet<TransactionKind>>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn portfolio(name: impl Into<String>) -> Self {
        Self {
            portfolio: Some(name.into()),
            kinds: None,
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = TransactionKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(portfolio) = &self.portfolio {
            if &record.portfolio != portfolio {
                return false;
            }
        }
        match &self.kinds {
            Some(kinds) => kinds.contains(&record.kind),
            None => true,
        }
    }
}

/// Storage contract for transaction records.
///
/// There is no update: corrections are a delete followed by an append.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Validate and persist a record. The record is durable once this returns.
    async fn append(&self, tx: NewTransaction) -> Result<RecordId, LedgerError>;

    /// Remove a record by id. Fails with [`LedgerError::NotFound`] if absent.
    async fn delete(&self, id: RecordId) -> Result<(), LedgerError>;

    /// Records sorted by date, then insertion order.
    async fn all_records(&self, filter: &RecordFilter) -> Result<Vec<TransactionRecord>>;

    async fn get(&self, id: RecordId) -> Result<Option<TransactionRecord>> {
        Ok(self
            .all_records(&RecordFilter::all())
            .await?
            .into_iter()
            .find(|r| r.id == id))
    }
}

/// Sort records by date, breaking ties by id (insertion order).
pub fn sort_chronologically(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
}

/// Next id after both the stored records and the highest id ever issued.
pub(crate) fn next_id(records: &[TransactionRecord], last_issued: Option<RecordId>) -> RecordId {
    records
        .iter()
        .map(|r| r.id)
        .chain(last_issued)
        .max()
        .map(|id| id.next())
        .unwrap_or(RecordId::new(1))
}

pub(crate) fn filtered(
    records: &[TransactionRecord],
    filter: &RecordFilter,
) -> Vec<TransactionRecord> {
    let mut out: Vec<TransactionRecord> = records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    sort_chronologically(&mut out);
    out
}
