//! Daily valuation of portfolios in one reporting currency.
//!
//! [`Valuation::build`] reconstructs positions and cash on a [`DailyGrid`],
//! loads prices and FX once per ticker and currency, and forward-fills both
//! onto the grid. Every historical value is converted at the rate in effect
//! on its own date. A position with no close at all up to a date contributes
//! nothing that day and is reported as a [`ValuationGap`]. So is a position
//! that replays short because split history for its ticker was unavailable;
//! it is floored at zero rather than failing the whole valuation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    AverageCostBook, CashMatrix, CashReconstructor, DailyGrid, DividendCredit, GridFrequency,
    PositionMatrix, PositionReconstructor, SeriesPoint,
};
use crate::error::LedgerError;
use crate::market_data::{DividendEvent, HistoryBar, MarketDataGateway, SplitEvent};
use crate::models::TransactionRecord;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct ValuationOptions {
    pub reporting_currency: String,
    pub frequency: GridFrequency,
    pub as_of: NaiveDate,
}

impl ValuationOptions {
    pub fn new(reporting_currency: impl Into<String>, as_of: NaiveDate) -> Self {
        Self {
            reporting_currency: reporting_currency.into().trim().to_uppercase(),
            frequency: GridFrequency::default(),
            as_of,
        }
    }

    pub fn with_frequency(mut self, frequency: GridFrequency) -> Self {
        self.frequency = frequency;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    MissingPrice,
    MissingFx,
    /// Shares replayed negative against the split history on hand.
    UnreconciledPosition,
}

/// A run of grid days on which a held ticker (or a needed currency) had no
/// value at all, so its contribution was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationGap {
    pub subject: String,
    pub kind: GapKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// One open position as of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub portfolio: String,
    pub ticker: String,
    pub currency: String,
    pub shares: Decimal,
    pub average_cost: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,
    /// Market value in the reporting currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_value: Option<Decimal>,
    /// Cost basis in the reporting currency.
    pub cost_basis: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unrealized_gain: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct Valuation {
    grid: DailyGrid,
    reporting_currency: String,
    portfolios: Vec<String>,
    records: Vec<TransactionRecord>,
    splits: Vec<SplitEvent>,
    positions: PositionMatrix,
    cash: CashMatrix,
    /// Forward-filled close per ticker, in the ticker's trade currency.
    prices: HashMap<String, Vec<Option<Decimal>>>,
    ticker_currency: HashMap<String, String>,
    /// Forward-filled rate into the reporting currency, per currency.
    fx: HashMap<String, Vec<Option<Decimal>>>,
    first_activity: HashMap<String, NaiveDate>,
    gaps: Vec<ValuationGap>,
}

impl Valuation {
    /// Build the valuation of `records` from the first record (or `as_of`,
    /// whichever is earlier) through `as_of`.
    pub async fn build(
        gateway: &MarketDataGateway,
        records: &[TransactionRecord],
        settings: &Settings,
        options: &ValuationOptions,
    ) -> Result<Self, LedgerError> {
        let as_of = options.as_of;
        let first = records.iter().map(|r| r.date).min().unwrap_or(as_of).min(as_of);
        let grid = grid_for(first, as_of, options.frequency);
        let Some(start) = grid.start() else {
            return Err(LedgerError::validation(format!("empty valuation grid ending {as_of}")));
        };
        let fetch_start = start - chrono::Duration::days(i64::from(gateway.lookback_days()));
        let reporting = options.reporting_currency.clone();

        let mut ordered: Vec<&TransactionRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        let mut ticker_currency = HashMap::new();
        let mut first_activity = HashMap::new();
        for record in &ordered {
            first_activity
                .entry(record.portfolio.clone())
                .or_insert(record.date);
            if let (true, Some(ticker)) = (record.kind.is_trade(), record.ticker.as_deref()) {
                ticker_currency.insert(ticker.to_string(), record.currency.clone());
            }
        }

        let mut prices = HashMap::new();
        let mut splits = Vec::new();
        let mut dividends = Vec::new();
        for ticker in ticker_currency.keys() {
            let bars = gateway.history_range(ticker, fetch_start, Some(as_of)).await;
            splits.extend(
                bars.iter()
                    .filter(|b| b.has_split() && b.date >= start)
                    .map(|b| SplitEvent::new(ticker.clone(), b.date, b.split_factor)),
            );
            dividends.extend(
                bars.iter()
                    .filter(|b| b.has_dividend() && b.date >= start)
                    .map(|b| DividendEvent::new(ticker.clone(), b.date, b.dividend_per_share)),
            );
            prices.insert(ticker.clone(), price_curve(&grid, &bars));
        }

        let (positions, clamped) =
            PositionReconstructor::new(grid.clone()).reconstruct_clamped(records, &splits);
        let cash = CashReconstructor::new(grid.clone(), settings, &reporting).reconstruct(
            records,
            &positions,
            &dividends,
        );

        let currencies: BTreeSet<String> = records
            .iter()
            .map(|r| r.currency.clone())
            .chain(cash.currencies().map(str::to_string))
            .filter(|c| *c != reporting)
            .collect();
        let mut fx = HashMap::new();
        for currency in currencies {
            let observations: Vec<(NaiveDate, Decimal)> = gateway
                .fx_history(&currency, &reporting, fetch_start, Some(as_of))
                .await
                .into_iter()
                .map(|o| (o.date, o.rate))
                .collect();
            fx.insert(currency, grid.forward_fill(&observations));
        }

        let mut valuation = Self {
            grid,
            reporting_currency: reporting,
            portfolios: settings.portfolios.clone(),
            records: records.to_vec(),
            splits,
            positions,
            cash,
            prices,
            ticker_currency,
            fx,
            first_activity,
            gaps: Vec::new(),
        };
        let end = valuation.grid.end().unwrap_or(as_of);
        valuation.gaps = clamped
            .into_iter()
            .map(|(key, from)| ValuationGap {
                subject: format!("{}/{}", key.portfolio, key.ticker),
                kind: GapKind::UnreconciledPosition,
                from,
                to: end,
            })
            .chain(valuation.find_gaps())
            .collect();
        for gap in &valuation.gaps {
            warn!(
                subject = %gap.subject,
                kind = ?gap.kind,
                from = %gap.from,
                to = %gap.to,
                "valuation gap: contribution excluded"
            );
        }
        debug!(
            days = valuation.grid.len(),
            tickers = valuation.prices.len(),
            currencies = valuation.fx.len(),
            "valuation built"
        );
        Ok(valuation)
    }

    pub fn grid(&self) -> &DailyGrid {
        &self.grid
    }

    pub fn reporting_currency(&self) -> &str {
        &self.reporting_currency
    }

    pub fn as_of(&self) -> Option<NaiveDate> {
        self.grid.end()
    }

    pub fn portfolios(&self) -> &[String] {
        &self.portfolios
    }

    pub fn positions(&self) -> &PositionMatrix {
        &self.positions
    }

    pub fn cash(&self) -> &CashMatrix {
        &self.cash
    }

    pub fn dividends(&self) -> &[DividendCredit] {
        self.cash.dividends()
    }

    pub fn gaps(&self) -> &[ValuationGap] {
        &self.gaps
    }

    pub fn first_activity(&self, portfolio: &str) -> Option<NaiveDate> {
        self.first_activity.get(portfolio).copied()
    }

    /// Cash plus holdings of `portfolio` on `date`, in the reporting currency.
    /// Zero before the grid starts.
    pub fn daily_value(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        self.cash_value(portfolio, date) + self.holdings_value(portfolio, date)
    }

    pub fn holdings_value(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        self.grid
            .index_on_or_before(date)
            .map_or(Decimal::ZERO, |idx| self.holdings_value_at(portfolio, idx))
    }

    pub fn cash_value(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        self.grid
            .index_on_or_before(date)
            .map_or(Decimal::ZERO, |idx| self.cash_value_at(portfolio, idx))
    }

    /// `amount` of `currency` at the rate in effect on `date`. `None` when no
    /// rate is known by then.
    pub fn to_reporting(
        &self,
        amount: Decimal,
        currency: &str,
        date: NaiveDate,
    ) -> Option<Decimal> {
        let idx = self.grid.index_on_or_before(date)?;
        self.rate_at(currency, idx).map(|rate| amount * rate)
    }

    /// Cost basis of open positions as of the valuation date.
    pub fn cost_basis(&self, portfolio: &str) -> Decimal {
        match self.as_of() {
            Some(as_of) => self.cost_basis_as_of(portfolio, as_of),
            None => Decimal::ZERO,
        }
    }

    /// Average-cost basis of the positions open on `date`, converted at that
    /// date's rates.
    pub fn cost_basis_as_of(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        let Some(idx) = self.grid.index_on_or_before(date) else {
            return Decimal::ZERO;
        };
        AverageCostBook::replay(&self.records, &self.splits, date)
            .cost_by_currency(portfolio)
            .into_iter()
            .filter_map(|(currency, cost)| self.rate_at(&currency, idx).map(|rate| cost * rate))
            .sum()
    }

    /// Realized gain from sells up to `date`, in the reporting currency.
    pub fn realized_gain(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        let Some(idx) = self.grid.index_on_or_before(date) else {
            return Decimal::ZERO;
        };
        AverageCostBook::replay(&self.records, &self.splits, date)
            .realized_by_currency(portfolio)
            .into_iter()
            .filter_map(|(currency, gain)| self.rate_at(&currency, idx).map(|rate| gain * rate))
            .sum()
    }

    /// `(daily value - cost) / cost` on `date`, as a fraction. Zero when no
    /// cost is open.
    pub fn total_return(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        let cost = self.cost_basis_as_of(portfolio, date);
        simple_return(self.daily_value(portfolio, date), cost)
    }

    /// Annualized `(daily value / cost)^(365.25 / days) - 1`, where days run
    /// from the portfolio's first record to `date`. Zero whenever it is
    /// undefined.
    pub fn cagr(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        self.annualized(portfolio, date, self.daily_value(portfolio, date))
    }

    /// Return of the open positions alone: `(holdings - cost) / cost`.
    pub fn holdings_return(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        let cost = self.cost_basis_as_of(portfolio, date);
        simple_return(self.holdings_value(portfolio, date), cost)
    }

    /// [`cagr`](Self::cagr) over holdings value instead of daily value.
    pub fn holdings_cagr(&self, portfolio: &str, date: NaiveDate) -> Decimal {
        self.annualized(portfolio, date, self.holdings_value(portfolio, date))
    }

    fn annualized(&self, portfolio: &str, date: NaiveDate, value: Decimal) -> Decimal {
        let Some(first) = self.first_activity(portfolio) else {
            return Decimal::ZERO;
        };
        let days = (date - first).num_days();
        let cost = self.cost_basis_as_of(portfolio, date);
        if days <= 0 || cost <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let ratio = value / cost;
        if ratio <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let exponent = Decimal::new(36525, 2) / Decimal::from(days);
        match ratio.checked_powd(exponent) {
            Some(growth) => growth - Decimal::ONE,
            None => {
                warn!(portfolio, days, ratio = %ratio, "CAGR overflow, reporting zero");
                Decimal::ZERO
            }
        }
    }

    /// Daily value on every grid day for `portfolio`, or for all configured
    /// portfolios combined when `None`.
    pub fn value_series(&self, portfolio: Option<&str>) -> Vec<SeriesPoint> {
        let portfolios: Vec<&str> = match portfolio {
            Some(p) => vec![p],
            None => self.portfolios.iter().map(String::as_str).collect(),
        };
        self.grid
            .dates()
            .iter()
            .enumerate()
            .map(|(idx, date)| {
                let value = portfolios
                    .iter()
                    .map(|p| self.cash_value_at(p, idx) + self.holdings_value_at(p, idx))
                    .sum();
                SeriesPoint::new(*date, value)
            })
            .collect()
    }

    /// Open positions on `date` across all portfolios.
    pub fn snapshot(&self, date: NaiveDate) -> Vec<HoldingSnapshot> {
        let Some(idx) = self.grid.index_on_or_before(date) else {
            return Vec::new();
        };
        let book = AverageCostBook::replay(&self.records, &self.splits, date);

        let mut holdings = Vec::new();
        for key in self.positions.keys() {
            let shares = self.positions.shares_at(&key.portfolio, &key.ticker, idx);
            if shares <= Decimal::ZERO {
                continue;
            }
            let currency = self.currency_of(&key.ticker).to_string();
            let rate = self.rate_at(&currency, idx);
            let average_cost = book
                .position(&key.portfolio, &key.ticker)
                .map_or(Decimal::ZERO, |p| p.average_cost);
            let last_price = self.price_at(&key.ticker, idx);
            let market_value = last_price.zip(rate).map(|(price, rate)| shares * price * rate);
            let cost_basis = rate.map_or(Decimal::ZERO, |rate| shares * average_cost * rate);
            holdings.push(HoldingSnapshot {
                portfolio: key.portfolio.clone(),
                ticker: key.ticker.clone(),
                currency,
                shares,
                average_cost,
                last_price,
                market_value,
                cost_basis,
                unrealized_gain: market_value.map(|value| value - cost_basis),
            });
        }
        holdings
    }

    fn currency_of(&self, ticker: &str) -> &str {
        self.ticker_currency
            .get(ticker)
            .map_or(self.reporting_currency.as_str(), String::as_str)
    }

    fn price_at(&self, ticker: &str, idx: usize) -> Option<Decimal> {
        self.prices.get(ticker).and_then(|curve| curve.get(idx).copied().flatten())
    }

    fn rate_at(&self, currency: &str, idx: usize) -> Option<Decimal> {
        if currency == self.reporting_currency {
            return Some(Decimal::ONE);
        }
        self.fx.get(currency).and_then(|curve| curve.get(idx).copied().flatten())
    }

    fn holdings_value_at(&self, portfolio: &str, idx: usize) -> Decimal {
        self.positions
            .keys()
            .filter(|key| key.portfolio == portfolio)
            .filter_map(|key| {
                let shares = self.positions.shares_at(portfolio, &key.ticker, idx);
                if shares.is_zero() {
                    return None;
                }
                let price = self.price_at(&key.ticker, idx)?;
                let rate = self.rate_at(self.currency_of(&key.ticker), idx)?;
                Some(shares * price * rate)
            })
            .sum()
    }

    fn cash_value_at(&self, portfolio: &str, idx: usize) -> Decimal {
        self.cash
            .balances_at(portfolio, idx)
            .into_iter()
            .filter_map(|(currency, balance)| {
                self.rate_at(currency, idx).map(|rate| balance * rate)
            })
            .sum()
    }

    fn find_gaps(&self) -> Vec<ValuationGap> {
        let mut missing: BTreeMap<(String, GapKind), Vec<usize>> = BTreeMap::new();
        for idx in 0..self.grid.len() {
            for key in self.positions.keys() {
                if self.positions.shares_at(&key.portfolio, &key.ticker, idx) <= Decimal::ZERO {
                    continue;
                }
                if self.price_at(&key.ticker, idx).is_none() {
                    missing
                        .entry((key.ticker.clone(), GapKind::MissingPrice))
                        .or_default()
                        .push(idx);
                }
                let currency = self.currency_of(&key.ticker);
                if self.rate_at(currency, idx).is_none() {
                    missing
                        .entry((currency.to_string(), GapKind::MissingFx))
                        .or_default()
                        .push(idx);
                }
            }
            for portfolio in self.cash_portfolios() {
                for (currency, _) in self.cash.balances_at(portfolio, idx) {
                    if self.rate_at(currency, idx).is_none() {
                        missing
                            .entry((currency.to_string(), GapKind::MissingFx))
                            .or_default()
                            .push(idx);
                    }
                }
            }
        }

        let dates = self.grid.dates();
        let mut gaps = Vec::new();
        for ((subject, kind), mut indices) in missing {
            indices.sort_unstable();
            indices.dedup();
            let mut run: Option<(usize, usize)> = None;
            for idx in indices {
                run = match run {
                    Some((from, to)) if idx == to + 1 => Some((from, idx)),
                    Some((from, to)) => {
                        gaps.push(ValuationGap {
                            subject: subject.clone(),
                            kind,
                            from: dates[from],
                            to: dates[to],
                        });
                        Some((idx, idx))
                    }
                    None => Some((idx, idx)),
                };
            }
            if let Some((from, to)) = run {
                gaps.push(ValuationGap {
                    subject: subject.clone(),
                    kind,
                    from: dates[from],
                    to: dates[to],
                });
            }
        }
        gaps
    }

    fn cash_portfolios(&self) -> BTreeSet<&str> {
        self.portfolios
            .iter()
            .map(String::as_str)
            .chain(self.records.iter().map(|r| r.portfolio.as_str()))
            .collect()
    }
}

/// Grid from `start` to `as_of`. A business grid whose range holds no
/// weekday starts on the preceding Friday.
fn grid_for(start: NaiveDate, as_of: NaiveDate, frequency: GridFrequency) -> DailyGrid {
    let mut start = start;
    while !frequency.includes(start) {
        start -= chrono::Duration::days(1);
    }
    DailyGrid::new(start, as_of, frequency)
}

fn simple_return(value: Decimal, cost: Decimal) -> Decimal {
    if cost.is_zero() {
        return Decimal::ZERO;
    }
    (value - cost) / cost
}

fn price_curve(grid: &DailyGrid, bars: &[HistoryBar]) -> Vec<Option<Decimal>> {
    let closes: Vec<(NaiveDate, Decimal)> = bars
        .iter()
        .filter(|b| b.close > Decimal::ZERO)
        .map(|b| (b.date, b.close))
        .collect();
    grid.forward_fill(&closes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::market_data::{FxObservation, MemoryMarketDataSource};
    use crate::models::{Market, NewTransaction, RecordId};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    fn records(txs: Vec<NewTransaction>) -> Vec<TransactionRecord> {
        txs.into_iter()
            .enumerate()
            .map(|(i, tx)| tx.into_record(RecordId::new(i as u64 + 1)).unwrap())
            .collect()
    }

    fn settings() -> Settings {
        let mut settings = Settings {
            portfolios: vec!["Test".to_string()],
            ..Default::default()
        };
        settings.initial_cash.clear();
        settings.initial_cash.insert("Test".to_string(), Decimal::from(10_000));
        settings
    }

    fn gateway(source: MemoryMarketDataSource) -> MarketDataGateway {
        MarketDataGateway::new(Arc::new(source))
    }

    #[tokio::test]
    async fn value_forward_fills_missing_closes() -> Result<(), LedgerError> {
        let source = MemoryMarketDataSource::new();
        source.insert_bars(
            "AAPL",
            vec![
                HistoryBar::new(day(1), Decimal::from(150)),
                HistoryBar::new(day(3), Decimal::from(160)),
            ],
        )
        .await;
        let ledger = records(vec![NewTransaction::buy(
            day(1),
            "Test",
            "AAPL",
            Decimal::from(10),
            Decimal::from(150),
        )]);
        let valuation = Valuation::build(
            &gateway(source),
            &ledger,
            &settings(),
            &ValuationOptions::new("USD", day(5)),
        )
        .await?;

        assert_eq!(valuation.daily_value("Test", day(2)), Decimal::from(10_000));
        assert_eq!(valuation.daily_value("Test", day(5)), Decimal::from(10_100));
        assert_eq!(valuation.cost_basis("Test"), Decimal::from(1_500));
        let before = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(valuation.daily_value("Test", before), Decimal::ZERO);
        assert!(valuation.gaps().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ticker_without_any_close_is_a_gap() -> Result<(), LedgerError> {
        let ledger = records(vec![NewTransaction::buy(
            day(1),
            "Test",
            "GONE",
            Decimal::from(5),
            Decimal::from(20),
        )]);
        let valuation = Valuation::build(
            &gateway(MemoryMarketDataSource::new()),
            &ledger,
            &settings(),
            &ValuationOptions::new("USD", day(3)),
        )
        .await?;

        assert_eq!(valuation.daily_value("Test", day(3)), Decimal::from(9_900));
        assert_eq!(
            valuation.gaps(),
            &[ValuationGap {
                subject: "GONE".to_string(),
                kind: GapKind::MissingPrice,
                from: day(1),
                to: day(3),
            }]
        );
        Ok(())
    }

    #[tokio::test]
    async fn foreign_legs_convert_at_each_days_rate() -> Result<(), LedgerError> {
        let source = MemoryMarketDataSource::new();
        source.insert_bars("RY.TO", vec![HistoryBar::new(day(1), Decimal::from(100))]).await;
        source.insert_fx(vec![
            FxObservation::new("CAD", "USD", day(1), Decimal::new(75, 2)),
            FxObservation::new("CAD", "USD", day(3), Decimal::new(80, 2)),
        ])
        .await;
        let ledger = records(vec![
            NewTransaction::deposit(day(1), "Test", Decimal::from(1_000), "CAD"),
            NewTransaction::buy(day(1), "Test", "RY.TO", Decimal::from(10), Decimal::from(100))
                .with_market(Market::Tsx),
        ]);
        let valuation = Valuation::build(
            &gateway(source),
            &ledger,
            &settings(),
            &ValuationOptions::new("USD", day(3)),
        )
        .await?;

        // CAD cash nets to zero; holdings are 1000 CAD.
        assert_eq!(valuation.holdings_value("Test", day(2)), Decimal::from(750));
        assert_eq!(valuation.holdings_value("Test", day(3)), Decimal::from(800));
        assert_eq!(valuation.cost_basis_as_of("Test", day(3)), Decimal::from(800));
        assert_eq!(valuation.cost_basis_as_of("Test", day(2)), Decimal::from(750));
        Ok(())
    }

    #[tokio::test]
    async fn returns_are_zero_without_cost() -> Result<(), LedgerError> {
        let valuation = Valuation::build(
            &gateway(MemoryMarketDataSource::new()),
            &[],
            &settings(),
            &ValuationOptions::new("USD", day(3)),
        )
        .await?;
        assert_eq!(valuation.total_return("Test", day(3)), Decimal::ZERO);
        assert_eq!(valuation.cagr("Test", day(3)), Decimal::ZERO);
        assert_eq!(valuation.value_series(None).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn return_and_cagr_over_a_year() -> Result<(), LedgerError> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let source = MemoryMarketDataSource::new();
        source.insert_bars(
            "SPY",
            vec![
                HistoryBar::new(start, Decimal::from(100)),
                HistoryBar::new(end, Decimal::from(121)),
            ],
        )
        .await;
        let ledger = records(vec![NewTransaction::buy(
            start,
            "Test",
            "SPY",
            Decimal::from(10),
            Decimal::from(100),
        )]);
        let valuation = Valuation::build(
            &gateway(source),
            &ledger,
            &settings(),
            &ValuationOptions::new("USD", end),
        )
        .await?;

        // Daily value is 9,000 cash plus 1,210 holdings against 1,000 cost.
        assert_eq!(valuation.daily_value("Test", end), Decimal::from(10_210));
        assert_eq!(valuation.total_return("Test", end), Decimal::new(921, 2));
        let cagr = valuation.cagr("Test", end);
        assert!((cagr - Decimal::new(92263, 4)).abs() < Decimal::new(1, 2), "cagr = {cagr}");
        assert_eq!(valuation.cagr("Test", start), Decimal::ZERO);

        assert_eq!(valuation.holdings_return("Test", end), Decimal::new(21, 2));
        let holdings_cagr = valuation.holdings_cagr("Test", end);
        assert!(
            (holdings_cagr - Decimal::new(21, 2)).abs() < Decimal::new(1, 3),
            "holdings cagr = {holdings_cagr}"
        );
        Ok(())
    }
}
