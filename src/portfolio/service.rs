use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::{Ledger, RecordFilter};
use crate::market_data::{MarketDataGateway, SplitEvent};
use crate::models::{NewTransaction, RecordId, TransactionKind, TransactionRecord};
use crate::settings::{Settings, SettingsStore};

use super::benchmark::{align_to_grid, normalize};
use super::{
    check_position_invariant, GridFrequency, NamedSeries, PortfolioReport, PortfolioSummary,
    ReportTotals, SeriesPoint, Valuation, ValuationOptions,
};

/// Name of the combined curve in [`PortfolioReport::curves`].
pub const TOTAL_CURVE: &str = "Total";

/// Ledger edits and reports over one ledger, settings document and gateway.
///
/// Writes are serialized so the position check and the append that follows
/// it see the same ledger.
pub struct PortfolioService {
    ledger: Arc<dyn Ledger>,
    settings: Arc<SettingsStore>,
    market_data: Arc<MarketDataGateway>,
    reporting_currency: String,
    frequency: GridFrequency,
    write_lock: Mutex<()>,
}

impl PortfolioService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        settings: Arc<SettingsStore>,
        market_data: Arc<MarketDataGateway>,
    ) -> Self {
        Self {
            ledger,
            settings,
            market_data,
            reporting_currency: "USD".to_string(),
            frequency: GridFrequency::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_reporting_currency(mut self, currency: impl Into<String>) -> Self {
        self.reporting_currency = currency.into().trim().to_uppercase();
        self
    }

    pub fn with_grid_frequency(mut self, frequency: GridFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn reporting_currency(&self) -> &str {
        &self.reporting_currency
    }

    /// Validate and append a transaction. A SELL that would leave any
    /// chronological prefix of its position negative is rejected.
    pub async fn record_transaction(
        &self,
        tx: NewTransaction,
    ) -> Result<TransactionRecord, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let settings = self.settings.load_or_init().await?;

        let mut tx = tx;
        tx.portfolio = tx.portfolio.trim().to_string();
        if !settings.has_portfolio(&tx.portfolio) {
            return Err(LedgerError::validation(format!(
                "unknown portfolio '{}' (expected one of: {})",
                tx.portfolio,
                settings.portfolios.join(", ")
            )));
        }
        if tx.kind.is_trade() && tx.fee.is_none() {
            tx.fee = Some(settings.fees);
        }
        let tx = tx.validate()?;

        if tx.kind == TransactionKind::Sell {
            let candidate = tx.clone().into_record(RecordId::new(u64::MAX))?;
            let mut records = self
                .position_records(&candidate.portfolio, candidate.ticker_str())
                .await?;
            records.push(candidate);
            let splits = self.splits_for(&records).await;
            check_position_invariant(&records, &splits)?;
        }

        let id = self.ledger.append(tx).await?;
        self.ledger.get(id).await?.ok_or(LedgerError::NotFound(id))
    }

    /// Delete a record. Removing a BUY that later sells depend on is
    /// rejected.
    pub async fn delete_transaction(&self, id: RecordId) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let record = self.ledger.get(id).await?.ok_or(LedgerError::NotFound(id))?;

        if record.kind == TransactionKind::Buy {
            let mut remaining = self
                .position_records(&record.portfolio, record.ticker_str())
                .await?;
            remaining.retain(|r| r.id != id);
            let splits = self.splits_for(&remaining).await;
            check_position_invariant(&remaining, &splits)?;
        }

        self.ledger.delete(id).await?;
        info!(id = %id, kind = %record.kind, portfolio = %record.portfolio, "Transaction deleted");
        Ok(())
    }

    pub async fn transactions(&self, filter: &RecordFilter) -> Result<Vec<TransactionRecord>> {
        self.ledger.all_records(filter).await
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.settings.load_or_init().await
    }

    /// Edit and persist settings. Removing a portfolio that still has
    /// records is rejected.
    pub async fn update_settings<F>(&self, edit: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock().await;
        let records = self.ledger.all_records(&RecordFilter::all()).await?;
        let in_use: BTreeSet<&str> = records.iter().map(|r| r.portfolio.as_str()).collect();

        let mut draft = self.settings.load_or_init().await?;
        edit(&mut draft);
        for portfolio in in_use {
            ensure!(
                draft.portfolios.iter().any(|p| p.trim() == portfolio),
                "portfolio '{portfolio}' still has transactions and cannot be removed"
            );
        }
        self.settings.update(move |settings| *settings = draft).await
    }

    /// Value every portfolio as of `as_of` (today when omitted).
    pub async fn report(&self, as_of: Option<NaiveDate>) -> Result<PortfolioReport> {
        let as_of = as_of.unwrap_or_else(|| self.market_data.today());
        let settings = self.settings.load_or_init().await?;
        let records: Vec<TransactionRecord> = self
            .ledger
            .all_records(&RecordFilter::all())
            .await?
            .into_iter()
            .filter(|r| r.date <= as_of)
            .collect();

        let options =
            ValuationOptions::new(&self.reporting_currency, as_of).with_frequency(self.frequency);
        let valuation = Valuation::build(&self.market_data, &records, &settings, &options).await?;
        let date = valuation.as_of().unwrap_or(as_of);

        let portfolios: Vec<PortfolioSummary> = settings
            .portfolios
            .iter()
            .map(|name| summarize(&valuation, &settings, name, date))
            .collect();

        let total_value: Decimal = portfolios.iter().map(|p| p.total_value).sum();
        let initial_cash = settings.total_initial_cash();
        let totals = ReportTotals {
            total_value,
            total_cash: portfolios.iter().map(|p| p.cash).sum(),
            holdings_value: portfolios.iter().map(|p| p.holdings_value).sum(),
            initial_cash,
            pnl_vs_initial_cash: total_value - initial_cash,
            best_portfolio: portfolios
                .iter()
                .max_by(|a, b| a.total_value.cmp(&b.total_value))
                .map(|p| p.name.clone()),
        };

        let value_history = settings
            .portfolios
            .iter()
            .map(|name| NamedSeries::new(name.clone(), valuation.value_series(Some(name))))
            .collect();
        let curves = self.curves(&valuation, &settings.benchmarks).await;

        Ok(PortfolioReport {
            as_of: date,
            reporting_currency: self.reporting_currency.clone(),
            grid: self.frequency,
            totals,
            portfolios,
            holdings: valuation.snapshot(date),
            dividends: valuation.dividends().to_vec(),
            value_history,
            curves,
            gaps: valuation.gaps().to_vec(),
        })
    }

    /// The combined value curve followed by each benchmark, all aligned to
    /// the valuation grid and rebased to 100 at its first day.
    async fn curves(&self, valuation: &Valuation, benchmarks: &[String]) -> Vec<NamedSeries> {
        let grid = valuation.grid();
        let (Some(base), Some(end)) = (grid.start(), grid.end()) else {
            return Vec::new();
        };
        let mut curves = vec![NamedSeries::new(
            TOTAL_CURVE,
            normalize(&valuation.value_series(None), base),
        )];

        let lookback = chrono::Duration::days(i64::from(self.market_data.lookback_days()));
        let fetch_start = base - lookback;
        for ticker in benchmarks {
            let closes: Vec<SeriesPoint> = self
                .market_data
                .history_range(ticker, fetch_start, Some(end))
                .await
                .into_iter()
                .filter(|b| b.close > Decimal::ZERO)
                .map(|b| SeriesPoint::new(b.date, b.close))
                .collect();
            let normalized = normalize(&align_to_grid(&closes, grid), base);
            if normalized.is_empty() {
                warn!(benchmark = %ticker, start = %base, "no benchmark history, curve omitted");
                continue;
            }
            curves.push(NamedSeries::new(ticker.clone(), normalized));
        }
        curves
    }

    /// Stored trades of one (portfolio, ticker) position.
    async fn position_records(
        &self,
        portfolio: &str,
        ticker: &str,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let filter = RecordFilter::portfolio(portfolio)
            .with_kinds([TransactionKind::Buy, TransactionKind::Sell]);
        Ok(self
            .ledger
            .all_records(&filter)
            .await?
            .into_iter()
            .filter(|r| r.ticker.as_deref() == Some(ticker))
            .collect())
    }

    /// Splits of the tickers in `records`, from the earliest record through
    /// today.
    async fn splits_for(&self, records: &[TransactionRecord]) -> Vec<SplitEvent> {
        let Some(start) = records.iter().map(|r| r.date).min() else {
            return Vec::new();
        };
        let tickers: BTreeSet<&str> = records.iter().filter_map(|r| r.ticker.as_deref()).collect();
        let mut splits = Vec::new();
        for ticker in tickers {
            splits.extend(self.market_data.splits(ticker, start, None).await);
        }
        splits
    }
}

fn summarize(
    valuation: &Valuation,
    settings: &Settings,
    name: &str,
    date: NaiveDate,
) -> PortfolioSummary {
    let cash = valuation.cash_value(name, date);
    let holdings_value = valuation.holdings_value(name, date);
    let cost_basis = valuation.cost_basis_as_of(name, date);
    let dividends_total = valuation
        .dividends()
        .iter()
        .filter(|d| d.portfolio == name)
        .filter_map(|d| valuation.to_reporting(d.amount, &d.currency, d.credited_on))
        .sum();

    PortfolioSummary {
        name: name.to_string(),
        dividend_mode: settings.dividend_mode_for(name),
        initial_cash: settings.initial_cash_for(name),
        total_value: cash + holdings_value,
        cash,
        holdings_value,
        cost_basis,
        unrealized_gain: holdings_value - cost_basis,
        realized_gain: valuation.realized_gain(name, date),
        total_return: valuation.total_return(name, date),
        cagr: valuation.cagr(name, date),
        holdings_return: valuation.holdings_return(name, date),
        holdings_cagr: valuation.holdings_cagr(name, date),
        dividends_total,
        first_activity: valuation.first_activity(name),
    }
}
