//! Versioned schema migrations for the on-disk ledger.
//!
//! The schema version lives in `ledger/schema.json` next to
//! `transactions.jsonl`. [`migrate`] runs once when the ledger is opened, applies
//! each pending step in order, and records the new version after every step,
//! so re-running it is a no-op.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::jsonl::{read_json, read_jsonl, write_json, write_jsonl};
use crate::models::{Market, RecordId, TransactionKind, TransactionRecord};

pub const CURRENT_VERSION: u32 = 2;

/// Contents of `schema.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMeta {
    pub version: u32,
    /// Highest record id ever issued, kept so deleted ids are never reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<RecordId>,
}

pub(crate) fn schema_file(ledger_dir: &Path) -> PathBuf {
    ledger_dir.join("schema.json")
}

pub(crate) fn transactions_file(ledger_dir: &Path) -> PathBuf {
    ledger_dir.join("transactions.jsonl")
}

pub(crate) async fn write_meta(ledger_dir: &Path, meta: &LedgerMeta) -> Result<()> {
    write_json(&schema_file(ledger_dir), meta).await
}

/// Bring the ledger in `ledger_dir` up to [`CURRENT_VERSION`].
///
/// A directory with records but no `schema.json` is treated as version 1,
/// the legacy shape (`side` instead of `kind`, no market, currency or fee).
pub async fn migrate(ledger_dir: &Path) -> Result<LedgerMeta> {
    let tx_file = transactions_file(ledger_dir);
    let mut meta = match read_json::<LedgerMeta>(&schema_file(ledger_dir)).await? {
        Some(meta) => meta,
        None if tx_file.exists() => LedgerMeta {
            version: 1,
            last_id: None,
        },
        None => {
            let meta = LedgerMeta {
                version: CURRENT_VERSION,
                last_id: None,
            };
            write_meta(ledger_dir, &meta).await?;
            info!(
                dir = %ledger_dir.display(),
                version = CURRENT_VERSION,
                "Initialized ledger schema"
            );
            return Ok(meta);
        }
    };

    if meta.version > CURRENT_VERSION {
        bail!(
            "Ledger schema version {} is newer than supported version {}",
            meta.version,
            CURRENT_VERSION
        );
    }

    while meta.version < CURRENT_VERSION {
        let from = meta.version;
        match from {
            1 => {
                let rows: Vec<Value> = read_jsonl(&tx_file).await?;
                let count = rows.len();
                let records = upgrade_v1_rows(rows)?;
                write_jsonl(&tx_file, &records).await?;
                info!(from, to = from + 1, records = count, "Migrated ledger schema");
            }
            other => bail!("No migration registered for ledger schema version {other}"),
        }
        meta.version = from + 1;
        write_meta(ledger_dir, &meta).await?;
    }

    Ok(meta)
}

/// Convert legacy rows to typed records. Rows already in the current shape
/// pass through unchanged.
fn upgrade_v1_rows(rows: Vec<Value>) -> Result<Vec<TransactionRecord>> {
    let mut max_id = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_u64))
        .max()
        .unwrap_or(0);

    rows.into_iter()
        .enumerate()
        .map(|(line, row)| {
            let Value::Object(mut obj) = row else {
                bail!("Ledger line {} is not an object", line + 1);
            };
            upgrade_v1_object(&mut obj, &mut max_id)
                .with_context(|| format!("Failed to migrate ledger line {}", line + 1))?;
            serde_json::from_value(Value::Object(obj))
                .with_context(|| format!("Ledger line {} is not a valid record", line + 1))
        })
        .collect()
}

fn upgrade_v1_object(obj: &mut Map<String, Value>, max_id: &mut u64) -> Result<()> {
    if !obj.contains_key("id") {
        *max_id += 1;
        obj.insert("id".to_string(), Value::from(*max_id));
    }

    if !obj.contains_key("kind") {
        let side = obj
            .remove("side")
            .and_then(|v| v.as_str().map(str::to_string))
            .context("record has neither kind nor side")?;
        let kind: TransactionKind = side.parse()?;
        obj.insert("kind".to_string(), serde_json::to_value(kind)?);
    } else {
        obj.remove("side");
    }

    let ticker = obj
        .get("ticker")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty());
    match &ticker {
        Some(t) => {
            obj.insert("ticker".to_string(), Value::from(t.as_str()));
        }
        None => {
            obj.remove("ticker");
        }
    }

    let market = match obj.get("market") {
        Some(value) => serde_json::from_value::<Market>(value.clone())?,
        None => {
            let market = ticker.as_deref().map(Market::from_ticker).unwrap_or_default();
            obj.insert("market".to_string(), serde_json::to_value(market)?);
            market
        }
    };

    if obj.get("currency").map_or(true, Value::is_null) {
        obj.insert(
            "currency".to_string(),
            Value::from(market.default_currency()),
        );
    }
    if obj.get("fee").map_or(true, Value::is_null) {
        obj.insert("fee".to_string(), Value::from(0));
    }
    if obj.get("price").map_or(true, Value::is_null) {
        obj.insert("price".to_string(), Value::from(1));
    }

    Ok(())
}
