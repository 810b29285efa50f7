//! User settings persisted as a JSON document in the data directory.
//!
//! Loaded once at startup; keys missing from the file are filled from
//! defaults and written back, and every edit is saved immediately.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{ensure, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::jsonl::{read_json, write_json};

pub const DEFAULT_PORTFOLIOS: [&str; 3] = ["Conservative", "Moderate", "Aggressive"];
pub const DEFAULT_BENCHMARKS: [&str; 3] = ["SPY", "QQQ", "VT"];

fn default_initial_cash() -> Decimal {
    Decimal::from(10_000)
}

/// How dividends reach a portfolio's cash balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividendMode {
    /// Credited from the provider's dividend-per-share times shares held that
    /// day. Manual DIVIDEND records are ignored.
    #[default]
    Auto,
    /// Only DIVIDEND ledger records count.
    Manual,
}

impl fmt::Display for DividendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DividendMode::Auto => f.write_str("auto"),
            DividendMode::Manual => f.write_str("manual"),
        }
    }
}

impl FromStr for DividendMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DividendMode::Auto),
            "manual" => Ok(DividendMode::Manual),
            other => anyhow::bail!("unknown dividend mode '{other}' (use: auto, manual)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The fixed set of named portfolios transactions may be booked against.
    pub portfolios: Vec<String>,
    /// Starting cash per portfolio, in the reporting currency.
    pub initial_cash: BTreeMap<String, Decimal>,
    pub benchmarks: Vec<String>,
    /// Fee applied to a trade that does not specify one.
    pub fees: Decimal,
    pub dividend_mode: BTreeMap<String, DividendMode>,
}

impl Default for Settings {
    fn default() -> Self {
        let portfolios: Vec<String> = DEFAULT_PORTFOLIOS.iter().map(|p| p.to_string()).collect();
        Self {
            initial_cash: portfolios
                .iter()
                .map(|p| (p.clone(), default_initial_cash()))
                .collect(),
            dividend_mode: portfolios
                .iter()
                .map(|p| (p.clone(), DividendMode::default()))
                .collect(),
            portfolios,
            benchmarks: DEFAULT_BENCHMARKS.iter().map(|b| b.to_string()).collect(),
            fees: Decimal::ZERO,
        }
    }
}

impl Settings {
    pub fn has_portfolio(&self, name: &str) -> bool {
        self.portfolios.iter().any(|p| p == name)
    }

    pub fn initial_cash_for(&self, portfolio: &str) -> Decimal {
        self.initial_cash
            .get(portfolio)
            .copied()
            .unwrap_or_else(default_initial_cash)
    }

    pub fn dividend_mode_for(&self, portfolio: &str) -> DividendMode {
        self.dividend_mode
            .get(portfolio)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_initial_cash(&self) -> Decimal {
        self.portfolios
            .iter()
            .map(|p| self.initial_cash_for(p))
            .sum()
    }

    /// Fill per-portfolio entries missing from the maps. Returns true if
    /// anything was added.
    pub fn fill_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.portfolios.is_empty() {
            self.portfolios = DEFAULT_PORTFOLIOS.iter().map(|p| p.to_string()).collect();
            changed = true;
        }
        for portfolio in &self.portfolios {
            if !self.initial_cash.contains_key(portfolio) {
                self.initial_cash
                    .insert(portfolio.clone(), default_initial_cash());
                changed = true;
            }
            if !self.dividend_mode.contains_key(portfolio) {
                self.dividend_mode
                    .insert(portfolio.clone(), DividendMode::default());
                changed = true;
            }
        }
        changed
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.fees >= Decimal::ZERO, "default fee must not be negative");
        for (portfolio, cash) in &self.initial_cash {
            ensure!(
                *cash >= Decimal::ZERO,
                "initial cash for {portfolio} must not be negative"
            );
        }
        for benchmark in &self.benchmarks {
            ensure!(!benchmark.trim().is_empty(), "benchmark ticker must not be empty");
        }
        Ok(())
    }

    /// Trim names, drop blanks and keep the first of any repeated name.
    fn normalize(&mut self) {
        let mut seen = HashSet::new();
        self.portfolios = self
            .portfolios
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && seen.insert(p.clone()))
            .collect();
        let mut seen = HashSet::new();
        self.benchmarks = self
            .benchmarks
            .iter()
            .map(|b| b.trim().to_uppercase())
            .filter(|b| !b.is_empty() && seen.insert(b.clone()))
            .collect();
    }
}

const SETTINGS_KEYS: [&str; 5] = [
    "portfolios",
    "initial_cash",
    "benchmarks",
    "fees",
    "dividend_mode",
];

/// JSON-file backed settings with write-through edits.
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("settings.json"),
            current: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, writing defaults if the file is missing and
    /// backfilling any missing keys.
    pub async fn load_or_init(&self) -> Result<Settings> {
        let mut current = self.current.lock().await;
        if let Some(settings) = current.as_ref() {
            return Ok(settings.clone());
        }

        let settings = match read_json::<serde_json::Value>(&self.path).await? {
            None => {
                let settings = Settings::default();
                write_json(&self.path, &settings).await?;
                info!(path = %self.path.display(), "Wrote default settings");
                settings
            }
            Some(raw) => {
                let missing: Vec<&str> = SETTINGS_KEYS
                    .iter()
                    .copied()
                    .filter(|key| raw.get(key).is_none())
                    .collect();
                let mut settings: Settings = serde_json::from_value(raw)
                    .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
                settings.normalize();
                let filled = settings.fill_defaults();
                if !missing.is_empty() || filled {
                    write_json(&self.path, &settings).await?;
                    info!(
                        path = %self.path.display(),
                        missing = ?missing,
                        "Filled missing settings from defaults"
                    );
                }
                settings
            }
        };

        *current = Some(settings.clone());
        Ok(settings)
    }

    /// Apply an edit and persist it. A rejected edit leaves both the file and
    /// the cached copy unchanged.
    pub async fn update<F>(&self, edit: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load_or_init().await?;
        edit(&mut settings);
        settings.normalize();
        settings.fill_defaults();
        settings.validate()?;

        let mut current = self.current.lock().await;
        write_json(&self.path, &settings).await?;
        info!(path = %self.path.display(), "Saved settings");
        *current = Some(settings.clone());
        Ok(settings)
    }
}
