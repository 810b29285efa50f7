use anyhow::Result;
use chrono::NaiveDate;

use super::App;

pub async fn report(app: &App, as_of: Option<NaiveDate>) -> Result<serde_json::Value> {
    let report = app.service.report(as_of).await?;
    Ok(serde_json::to_value(report)?)
}
