use anyhow::{ensure, Result};
use rust_decimal::Decimal;

use crate::settings::DividendMode;

use super::App;

pub async fn show_settings(app: &App) -> Result<serde_json::Value> {
    let settings = app.service.settings().await?;
    Ok(serde_json::json!({
        "path": app.config.data_dir.join("settings.json").display().to_string(),
        "settings": settings,
    }))
}

async fn ensure_portfolio(app: &App, portfolio: &str) -> Result<()> {
    let settings = app.service.settings().await?;
    ensure!(
        settings.has_portfolio(portfolio),
        "unknown portfolio '{portfolio}' (expected one of: {})",
        settings.portfolios.join(", ")
    );
    Ok(())
}

pub async fn set_cash(app: &App, portfolio: &str, amount: Decimal) -> Result<serde_json::Value> {
    ensure_portfolio(app, portfolio).await?;
    let settings = app
        .service
        .update_settings(|s| {
            s.initial_cash.insert(portfolio.to_string(), amount);
        })
        .await?;
    Ok(serde_json::to_value(settings)?)
}

pub async fn set_benchmarks(app: &App, tickers: Vec<String>) -> Result<serde_json::Value> {
    let settings = app
        .service
        .update_settings(move |s| s.benchmarks = tickers)
        .await?;
    Ok(serde_json::to_value(settings)?)
}

pub async fn set_fee(app: &App, fee: Decimal) -> Result<serde_json::Value> {
    let settings = app.service.update_settings(|s| s.fees = fee).await?;
    Ok(serde_json::to_value(settings)?)
}

pub async fn set_dividend_mode(
    app: &App,
    portfolio: &str,
    mode: DividendMode,
) -> Result<serde_json::Value> {
    ensure_portfolio(app, portfolio).await?;
    let settings = app
        .service
        .update_settings(|s| {
            s.dividend_mode.insert(portfolio.to_string(), mode);
        })
        .await?;
    Ok(serde_json::to_value(settings)?)
}
