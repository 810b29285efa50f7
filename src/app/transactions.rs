use anyhow::Result;

use crate::error::LedgerError;
use crate::ledger::RecordFilter;
use crate::models::{NewTransaction, RawTransaction, RecordId, TransactionKind};

use super::App;

/// Ledger rejections are reported in the JSON body; storage failures are
/// returned as errors.
fn rejection(err: LedgerError) -> Result<serde_json::Value> {
    match err {
        LedgerError::Storage(e) => Err(e),
        other => Ok(serde_json::json!({
            "success": false,
            "error": other.to_string(),
        })),
    }
}

pub async fn add_transaction(app: &App, raw: RawTransaction) -> Result<serde_json::Value> {
    let recorded = match NewTransaction::try_from(raw) {
        Ok(tx) => app.service.record_transaction(tx).await,
        Err(e) => Err(e),
    };
    match recorded {
        Ok(record) => Ok(serde_json::json!({
            "success": true,
            "transaction": record,
        })),
        Err(e) => rejection(e),
    }
}

pub async fn delete_transaction(app: &App, id_str: &str) -> Result<serde_json::Value> {
    let Ok(id) = id_str.parse::<RecordId>() else {
        return Ok(serde_json::json!({
            "success": false,
            "error": format!("Invalid transaction id: {id_str}"),
        }));
    };
    match app.service.delete_transaction(id).await {
        Ok(()) => Ok(serde_json::json!({
            "success": true,
            "deleted": id,
        })),
        Err(e) => rejection(e),
    }
}

pub async fn list_transactions(
    app: &App,
    portfolio: Option<String>,
    kind: Option<String>,
) -> Result<serde_json::Value> {
    let mut filter = match portfolio {
        Some(name) => RecordFilter::portfolio(name),
        None => RecordFilter::all(),
    };
    if let Some(kind) = kind {
        filter = filter.with_kinds([kind.parse::<TransactionKind>()?]);
    }
    let records = app.service.transactions(&filter).await?;
    Ok(serde_json::to_value(records)?)
}
