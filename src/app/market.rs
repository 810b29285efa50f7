use anyhow::{ensure, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::market_data::{FxObservation, HistoryBar};

use super::App;

/// One daily bar entered by hand.
#[derive(Debug, Clone)]
pub struct BarInput {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: Decimal,
    pub dividend: Option<Decimal>,
    pub split: Option<Decimal>,
}

pub async fn add_bar(app: &App, input: BarInput) -> Result<serde_json::Value> {
    ensure!(input.close >= Decimal::ZERO, "close must not be negative");
    let ticker = input.ticker.trim().to_uppercase();
    ensure!(!ticker.is_empty(), "ticker must not be empty");

    let mut bar = HistoryBar::new(input.date, input.close);
    if let Some(per_share) = input.dividend {
        ensure!(per_share >= Decimal::ZERO, "dividend must not be negative");
        bar = bar.with_dividend(per_share);
    }
    if let Some(factor) = input.split {
        ensure!(factor > Decimal::ZERO, "split factor must be positive");
        bar = bar.with_split(factor);
    }

    app.market_store.put_bars(&ticker, &[bar.clone()]).await?;
    app.market_data.invalidate(&ticker).await;
    Ok(serde_json::json!({
        "success": true,
        "ticker": ticker,
        "bar": bar,
    }))
}

pub async fn add_fx(
    app: &App,
    base: &str,
    quote: &str,
    date: NaiveDate,
    rate: Decimal,
) -> Result<serde_json::Value> {
    ensure!(rate > Decimal::ZERO, "FX rate must be positive");
    let observation = FxObservation::new(
        base.trim().to_uppercase(),
        quote.trim().to_uppercase(),
        date,
        rate,
    );
    app.market_store.put_fx(&[observation.clone()]).await?;
    Ok(serde_json::json!({
        "success": true,
        "observation": observation,
    }))
}
