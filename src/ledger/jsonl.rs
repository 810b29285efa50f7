use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

use super::migrations::{self, LedgerMeta};
use super::{filtered, next_id, Ledger, RecordFilter};
use crate::error::LedgerError;
use crate::jsonl::{append_jsonl, read_jsonl, write_jsonl};
use crate::models::{NewTransaction, RecordId, TransactionRecord};

/// JSONL file-backed ledger.
///
/// Directory structure:
/// ```text
/// data/
///   ledger/
///     schema.json         schema version and id high-water mark
///     transactions.jsonl  one record per line
/// ```
///
/// Appends are written and fsynced before returning. All writes go through a
/// single lock, so the file has one writer at a time.
pub struct JsonlLedger {
    dir: PathBuf,
    state: Mutex<State>,
}

struct State {
    records: Vec<TransactionRecord>,
    meta: LedgerMeta,
}

impl JsonlLedger {
    /// Open (creating if needed) the ledger under `data_dir/ledger`, running
    /// any pending schema migration first.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().join("ledger");
        let meta = migrations::migrate(&dir).await?;
        let records: Vec<TransactionRecord> =
            read_jsonl(&migrations::transactions_file(&dir)).await?;

        Ok(Self {
            dir,
            state: Mutex::new(State { records, meta }),
        })
    }

    pub fn transactions_file(&self) -> PathBuf {
        migrations::transactions_file(&self.dir)
    }
}

#[async_trait::async_trait]
impl Ledger for JsonlLedger {
    async fn append(&self, tx: NewTransaction) -> Result<RecordId, LedgerError> {
        let mut state = self.state.lock().await;
        let id = next_id(&state.records, state.meta.last_id);
        let record = tx.into_record(id)?;

        append_jsonl(&self.transactions_file(), std::slice::from_ref(&record)).await?;

        info!(
            id = %id,
            portfolio = %record.portfolio,
            kind = %record.kind,
            ticker = record.ticker_str(),
            "Appended transaction"
        );
        state.records.push(record);
        state.meta.last_id = Some(id);
        Ok(id)
    }

    async fn delete(&self, id: RecordId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if !state.records.iter().any(|r| r.id == id) {
            return Err(LedgerError::NotFound(id));
        }

        let remaining: Vec<TransactionRecord> = state
            .records
            .iter()
            .filter(|r| r.id != id)
            .cloned()
            .collect();
        let high_water = state
            .records
            .iter()
            .map(|r| r.id)
            .chain(state.meta.last_id)
            .max();
        let meta = LedgerMeta {
            last_id: high_water,
            ..state.meta
        };

        migrations::write_meta(&self.dir, &meta).await?;
        write_jsonl(&self.transactions_file(), &remaining).await?;

        info!(id = %id, "Deleted transaction");
        state.records = remaining;
        state.meta = meta;
        Ok(())
    }

    async fn all_records(&self, filter: &RecordFilter) -> Result<Vec<TransactionRecord>> {
        let state = self.state.lock().await;
        Ok(filtered(&state.records, filter))
    }
}
