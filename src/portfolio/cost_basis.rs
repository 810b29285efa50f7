//! Average-cost bookkeeping.
//!
//! A BUY folds into a running volume-weighted mean of entry prices. A SELL
//! reduces shares at the current average and books the difference as realized
//! gain. A split scales shares up and the average down, leaving total cost
//! unchanged. Fees never enter the average; they reduce realized gain instead.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PositionKey;
use crate::market_data::SplitEvent;
use crate::models::{TransactionKind, TransactionRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostPosition {
    pub shares: Decimal,
    pub average_cost: Decimal,
    /// Accumulated gains from sells, net of their fees, in `currency`.
    pub realized_gain: Decimal,
    pub currency: String,
}

impl CostPosition {
    pub fn cost_basis(&self) -> Decimal {
        self.shares * self.average_cost
    }

    pub fn is_open(&self) -> bool {
        self.shares > Decimal::ZERO
    }

    fn buy(&mut self, quantity: Decimal, price: Decimal) {
        let shares = self.shares + quantity;
        if shares > Decimal::ZERO {
            self.average_cost = (self.shares * self.average_cost + quantity * price) / shares;
        }
        self.shares = shares;
    }

    fn sell(&mut self, quantity: Decimal, price: Decimal, fee: Decimal) {
        self.realized_gain += quantity * (price - self.average_cost) - fee;
        self.shares -= quantity;
        if self.shares <= Decimal::ZERO {
            self.shares = Decimal::ZERO;
            self.average_cost = Decimal::ZERO;
        }
    }

    fn split(&mut self, factor: Decimal) {
        self.shares *= factor;
        self.average_cost /= factor;
    }
}

enum Event<'a> {
    Split(&'a SplitEvent),
    Trade(&'a TransactionRecord),
}

impl Event<'_> {
    fn date(&self) -> NaiveDate {
        match self {
            Event::Split(split) => split.date,
            Event::Trade(record) => record.date,
        }
    }

    /// Splits sort ahead of trades on the same date.
    fn rank(&self) -> u8 {
        match self {
            Event::Split(_) => 0,
            Event::Trade(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AverageCostBook {
    positions: BTreeMap<PositionKey, CostPosition>,
}

impl AverageCostBook {
    /// Replay trades and splits dated on or before `as_of`.
    pub fn replay(records: &[TransactionRecord], splits: &[SplitEvent], as_of: NaiveDate) -> Self {
        let mut seen = HashSet::new();
        let mut events: Vec<Event<'_>> = splits
            .iter()
            .filter(|s| s.factor > Decimal::ZERO && s.date <= as_of)
            .filter(|s| seen.insert((s.ticker.as_str(), s.date)))
            .map(Event::Split)
            .chain(
                records
                    .iter()
                    .filter(|r| r.kind.is_trade() && r.date <= as_of)
                    .map(Event::Trade),
            )
            .collect();
        events.sort_by(|a, b| {
            a.date().cmp(&b.date()).then(a.rank().cmp(&b.rank())).then_with(|| {
                match (a, b) {
                    (Event::Trade(x), Event::Trade(y)) => x.id.cmp(&y.id),
                    _ => std::cmp::Ordering::Equal,
                }
            })
        });

        let mut book = Self::default();
        for event in events {
            match event {
                Event::Split(split) => {
                    for (key, position) in book.positions.iter_mut() {
                        if key.ticker == split.ticker {
                            position.split(split.factor);
                        }
                    }
                }
                Event::Trade(record) => {
                    let Some(ticker) = record.ticker.as_deref() else {
                        continue;
                    };
                    let position = book
                        .positions
                        .entry(PositionKey::new(&record.portfolio, ticker))
                        .or_default();
                    position.currency = record.currency.clone();
                    match record.kind {
                        TransactionKind::Buy => position.buy(record.quantity, record.price),
                        TransactionKind::Sell => {
                            position.sell(record.quantity, record.price, record.fee)
                        }
                        _ => {}
                    }
                }
            }
        }
        book
    }

    pub fn position(&self, portfolio: &str, ticker: &str) -> Option<&CostPosition> {
        self.positions.get(&PositionKey::new(portfolio, ticker))
    }

    pub fn positions(&self) -> impl Iterator<Item = (&PositionKey, &CostPosition)> {
        self.positions.iter()
    }

    pub fn open_positions<'a>(
        &'a self,
        portfolio: &'a str,
    ) -> impl Iterator<Item = (&'a PositionKey, &'a CostPosition)> + 'a {
        self.positions
            .iter()
            .filter(move |(k, p)| k.portfolio == portfolio && p.is_open())
    }

    /// Cost basis of the portfolio's open positions, per trade currency.
    pub fn cost_by_currency(&self, portfolio: &str) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        for (_, position) in self.open_positions(portfolio) {
            *out.entry(position.currency.clone()).or_insert(Decimal::ZERO) +=
                position.cost_basis();
        }
        out
    }

    /// Realized gain across open and closed positions, per trade currency.
    pub fn realized_by_currency(&self, portfolio: &str) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        for (key, position) in &self.positions {
            if key.portfolio == portfolio {
                *out.entry(position.currency.clone()).or_insert(Decimal::ZERO) +=
                    position.realized_gain;
            }
        }
        out
    }
}
