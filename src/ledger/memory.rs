//! In-memory ledger for tests and dry runs.

use anyhow::Result;
use tokio::sync::Mutex;

use super::{filtered, next_id, Ledger, RecordFilter};
use crate::error::LedgerError;
use crate::models::{NewTransaction, RecordId, TransactionRecord};

#[derive(Default)]
struct State {
    records: Vec<TransactionRecord>,
    /// Highest id ever issued; deleted ids are not reused.
    last_id: Option<RecordId>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, tx: NewTransaction) -> Result<RecordId, LedgerError> {
        let mut state = self.state.lock().await;
        let id = next_id(&state.records, state.last_id);
        let record = tx.into_record(id)?;
        state.records.push(record);
        state.last_id = Some(id);
        Ok(id)
    }

    async fn delete(&self, id: RecordId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        if state.records.len() == before {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    async fn all_records(&self, filter: &RecordFilter) -> Result<Vec<TransactionRecord>> {
        let state = self.state.lock().await;
        Ok(filtered(&state.records, filter))
    }
}
