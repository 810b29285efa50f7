use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DailyGrid, PositionMatrix};
use crate::market_data::DividendEvent;
use crate::models::{TransactionKind, TransactionRecord};
use crate::settings::{DividendMode, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendSource {
    /// Derived from the provider's dividend-per-share.
    Auto,
    /// A DIVIDEND ledger record.
    Manual,
}

/// One dividend credited to a portfolio's cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendCredit {
    /// Payment date as reported.
    pub date: NaiveDate,
    /// Grid day the credit lands on.
    pub credited_on: NaiveDate,
    pub portfolio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_share: Option<Decimal>,
    pub amount: Decimal,
    pub currency: String,
    pub source: DividendSource,
}

/// Daily cash balance per (portfolio, currency) over a [`DailyGrid`].
#[derive(Debug, Clone)]
pub struct CashMatrix {
    grid: DailyGrid,
    balances: BTreeMap<(String, String), Vec<Decimal>>,
    dividends: Vec<DividendCredit>,
}

impl CashMatrix {
    pub fn grid(&self) -> &DailyGrid {
        &self.grid
    }

    pub fn balance_at(&self, portfolio: &str, currency: &str, idx: usize) -> Decimal {
        self.balances
            .get(&(portfolio.to_string(), currency.to_string()))
            .and_then(|col| col.get(idx).copied())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn balance_on(&self, portfolio: &str, currency: &str, date: NaiveDate) -> Decimal {
        match self.grid.index_on_or_before(date) {
            Some(idx) => self.balance_at(portfolio, currency, idx),
            None => Decimal::ZERO,
        }
    }

    /// Non-empty balances of `portfolio` at grid index `idx`, by currency.
    pub fn balances_at(&self, portfolio: &str, idx: usize) -> Vec<(&str, Decimal)> {
        self.balances
            .iter()
            .filter(|((p, _), _)| p == portfolio)
            .filter_map(|((_, currency), col)| {
                col.get(idx)
                    .copied()
                    .filter(|b| !b.is_zero())
                    .map(|b| (currency.as_str(), b))
            })
            .collect()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.balances.keys().map(|(_, c)| c.as_str())
    }

    pub fn dividends(&self) -> &[DividendCredit] {
        &self.dividends
    }
}

/// Builds a [`CashMatrix`] from cash flows of the ledger plus dividends.
///
/// Each portfolio's balance in the reporting currency is seeded with its
/// configured initial cash. Dividends follow the portfolio's mode, so the
/// same payment is never counted from both the provider and the ledger.
pub struct CashReconstructor<'a> {
    grid: DailyGrid,
    settings: &'a Settings,
    reporting_currency: String,
}

impl<'a> CashReconstructor<'a> {
    pub fn new(
        grid: DailyGrid,
        settings: &'a Settings,
        reporting_currency: impl Into<String>,
    ) -> Self {
        Self {
            grid,
            settings,
            reporting_currency: reporting_currency.into(),
        }
    }

    pub fn reconstruct(
        &self,
        records: &[TransactionRecord],
        positions: &PositionMatrix,
        dividends: &[DividendEvent],
    ) -> CashMatrix {
        let len = self.grid.len();
        let mut flows: BTreeMap<(String, String), Vec<Decimal>> = BTreeMap::new();
        let mut credits = Vec::new();

        for portfolio in &self.settings.portfolios {
            let column = flows
                .entry((portfolio.clone(), self.reporting_currency.clone()))
                .or_insert_with(|| vec![Decimal::ZERO; len]);
            if let Some(seed) = column.first_mut() {
                *seed += self.settings.initial_cash_for(portfolio);
            }
        }

        let mut ticker_currency: HashMap<(&str, &str), &str> = HashMap::new();
        for record in records {
            let Some(idx) = self.grid_index(record.date) else {
                continue;
            };
            let mode = self.settings.dividend_mode_for(&record.portfolio);
            if record.kind == TransactionKind::Dividend {
                if mode == DividendMode::Auto {
                    warn!(
                        id = %record.id,
                        portfolio = %record.portfolio,
                        "ignoring manual dividend record: portfolio credits dividends automatically"
                    );
                    continue;
                }
                credits.push(DividendCredit {
                    date: record.date,
                    credited_on: self.grid.dates()[idx],
                    portfolio: record.portfolio.clone(),
                    ticker: record.ticker.clone(),
                    shares: None,
                    per_share: None,
                    amount: record.quantity,
                    currency: record.currency.clone(),
                    source: DividendSource::Manual,
                });
            }
            if let (true, Some(ticker)) = (record.kind.is_trade(), record.ticker.as_deref()) {
                ticker_currency
                    .insert((record.portfolio.as_str(), ticker), record.currency.as_str());
            }

            flows
                .entry((record.portfolio.clone(), record.currency.clone()))
                .or_insert_with(|| vec![Decimal::ZERO; len])[idx] += record.cash_flow();
        }

        let mut by_ticker: HashMap<&str, Vec<&DividendEvent>> = HashMap::new();
        for event in dividends {
            by_ticker.entry(event.ticker.as_str()).or_default().push(event);
        }

        for key in positions.keys() {
            if self.settings.dividend_mode_for(&key.portfolio) != DividendMode::Auto {
                continue;
            }
            let Some(events) = by_ticker.get(key.ticker.as_str()) else {
                continue;
            };
            let currency = ticker_currency
                .get(&(key.portfolio.as_str(), key.ticker.as_str()))
                .copied()
                .unwrap_or(self.reporting_currency.as_str())
                .to_string();

            for event in events {
                let Some(idx) = self.grid_index(event.date) else {
                    continue;
                };
                let shares = positions.shares_on(&key.portfolio, &key.ticker, event.date);
                if shares <= Decimal::ZERO || event.per_share <= Decimal::ZERO {
                    continue;
                }
                let amount = shares * event.per_share;
                debug!(
                    portfolio = %key.portfolio,
                    ticker = %key.ticker,
                    date = %event.date,
                    amount = %amount,
                    "crediting dividend"
                );
                flows
                    .entry((key.portfolio.clone(), currency.clone()))
                    .or_insert_with(|| vec![Decimal::ZERO; len])[idx] += amount;
                credits.push(DividendCredit {
                    date: event.date,
                    credited_on: self.grid.dates()[idx],
                    portfolio: key.portfolio.clone(),
                    ticker: Some(key.ticker.clone()),
                    shares: Some(shares),
                    per_share: Some(event.per_share),
                    amount,
                    currency: currency.clone(),
                    source: DividendSource::Auto,
                });
            }
        }

        credits.sort_by(|a, b| {
            a.credited_on
                .cmp(&b.credited_on)
                .then_with(|| a.portfolio.cmp(&b.portfolio))
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let balances = flows
            .into_iter()
            .map(|(key, col)| {
                let mut running = Decimal::ZERO;
                let cumulative = col
                    .into_iter()
                    .map(|flow| {
                        running += flow;
                        running
                    })
                    .collect();
                (key, cumulative)
            })
            .collect();

        CashMatrix {
            grid: self.grid.clone(),
            balances,
            dividends: credits,
        }
    }

    /// Grid day an event dated `date` lands on; `None` past the grid end.
    fn grid_index(&self, date: NaiveDate) -> Option<usize> {
        if self.grid.end().is_some_and(|end| date > end) {
            return None;
        }
        self.grid.index_on_or_after(date)
    }
}
