#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use paperfolio::clock::FixedClock;
use paperfolio::ledger::MemoryLedger;
use paperfolio::market_data::{MarketDataGateway, MemoryMarketDataSource};
use paperfolio::portfolio::PortfolioService;
use paperfolio::settings::SettingsStore;
use rust_decimal::Decimal;
use tempfile::TempDir;

pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Decimal fields serialize as strings.
pub fn json_dec(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or_else(|| panic!("not a decimal string: {value}"))
}

/// Settings with a single "Test" portfolio holding `initial_cash` and no
/// benchmarks.
pub async fn single_portfolio_settings(dir: &Path, initial_cash: Decimal) -> Result<SettingsStore> {
    let store = SettingsStore::new(dir);
    store
        .update(|s| {
            s.portfolios = vec!["Test".to_string()];
            s.initial_cash.clear();
            s.initial_cash.insert("Test".to_string(), initial_cash);
            s.benchmarks.clear();
        })
        .await?;
    Ok(store)
}

pub struct Harness {
    pub dir: TempDir,
    pub source: Arc<MemoryMarketDataSource>,
    pub service: PortfolioService,
}

/// In-memory ledger and market data over a "Test" portfolio with $10,000,
/// with today pinned to `today`.
pub async fn harness(source: MemoryMarketDataSource, today: NaiveDate) -> Result<Harness> {
    let dir = TempDir::new()?;
    let settings = single_portfolio_settings(dir.path(), Decimal::from(10_000)).await?;
    let source = Arc::new(source);
    let gateway = MarketDataGateway::new(source.clone())
        .with_clock(Arc::new(FixedClock::on_date(today)));
    let service = PortfolioService::new(
        Arc::new(MemoryLedger::new()),
        Arc::new(settings),
        Arc::new(gateway),
    );
    Ok(Harness {
        dir,
        source,
        service,
    })
}

pub fn write_config(dir: &Path) -> Result<PathBuf> {
    let config_path = dir.join("paperfolio.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
data_dir = "{}"
reporting_currency = "USD"
"#,
            dir.display()
        ),
    )?;
    Ok(config_path)
}

/// Run the binary and parse its stdout as JSON.
pub fn run_cli(config_path: &Path, args: &[&str]) -> Result<serde_json::Value> {
    let output = Command::new(env!("CARGO_BIN_EXE_paperfolio"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()?;
    if !output.status.success() {
        anyhow::bail!(
            "paperfolio {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}
