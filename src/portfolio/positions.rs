//! Share-count reconstruction from the ledger.
//!
//! Shares evolve per grid day as `held[i] = held[i-1] * split[i] + delta[i]`:
//! a split multiplies the shares carried into its day, and trades on or after
//! the split day are in post-split units. Multiple splits compound in date
//! order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DailyGrid;
use crate::error::LedgerError;
use crate::market_data::SplitEvent;
use crate::models::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub portfolio: String,
    pub ticker: String,
}

impl PositionKey {
    pub fn new(portfolio: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            portfolio: portfolio.into(),
            ticker: ticker.into(),
        }
    }
}

/// Daily share counts per (portfolio, ticker) over a [`DailyGrid`].
#[derive(Debug, Clone)]
pub struct PositionMatrix {
    grid: DailyGrid,
    deltas: BTreeMap<PositionKey, Vec<Decimal>>,
    /// Compound split factor per ticker per grid day; absent means no split.
    factors: HashMap<String, Vec<Decimal>>,
    shares: BTreeMap<PositionKey, Vec<Decimal>>,
    applied_splits: HashSet<(String, NaiveDate)>,
    /// Columns floored at zero instead of going negative.
    clamped: HashSet<PositionKey>,
}

impl PositionMatrix {
    pub fn grid(&self) -> &DailyGrid {
        &self.grid
    }

    pub fn keys(&self) -> impl Iterator<Item = &PositionKey> {
        self.shares.keys()
    }

    pub fn tickers(&self) -> BTreeSet<&str> {
        self.shares.keys().map(|k| k.ticker.as_str()).collect()
    }

    pub fn column(&self, portfolio: &str, ticker: &str) -> Option<&[Decimal]> {
        self.shares
            .get(&PositionKey::new(portfolio, ticker))
            .map(Vec::as_slice)
    }

    /// Shares held at grid index `idx`.
    pub fn shares_at(&self, portfolio: &str, ticker: &str, idx: usize) -> Decimal {
        self.column(portfolio, ticker)
            .and_then(|col| col.get(idx).copied())
            .unwrap_or(Decimal::ZERO)
    }

    /// Shares held on `date`, carrying the last grid day forward. Zero before
    /// the grid starts.
    pub fn shares_on(&self, portfolio: &str, ticker: &str, date: NaiveDate) -> Decimal {
        match self.grid.index_on_or_before(date) {
            Some(idx) => self.shares_at(portfolio, ticker, idx),
            None => Decimal::ZERO,
        }
    }

    pub fn is_split_applied(&self, ticker: &str, date: NaiveDate) -> bool {
        self.applied_splits.contains(&(ticker.to_string(), date))
    }

    /// Apply a split to every portfolio holding its ticker, from the split's
    /// grid day onward (the next grid day if the split date is not on the
    /// grid). Each (ticker, date) applies once; re-applying returns `false`
    /// and changes nothing. Non-positive factors are ignored.
    pub fn apply_split(&mut self, split: &SplitEvent) -> bool {
        if split.factor <= Decimal::ZERO || split.factor == Decimal::ONE {
            return false;
        }
        if !self
            .applied_splits
            .insert((split.ticker.clone(), split.date))
        {
            return false;
        }
        let Some(idx) = self.grid.index_on_or_after(split.date) else {
            // After the grid ends: nothing held on the grid is affected.
            return true;
        };

        let len = self.grid.len();
        let factors = self
            .factors
            .entry(split.ticker.clone())
            .or_insert_with(|| vec![Decimal::ONE; len]);
        factors[idx] *= split.factor;

        self.recompute(&split.ticker);
        true
    }

    fn recompute(&mut self, ticker: &str) {
        let factors = self.factors.get(ticker);
        for (key, deltas) in self.deltas.iter().filter(|(k, _)| k.ticker == ticker) {
            let floor = self.clamped.contains(key);
            self.shares
                .insert(key.clone(), cumulate(deltas, factors.map(Vec::as_slice), floor));
        }
    }

    /// Floor every column that goes negative at zero from the first negative
    /// day on. Returns each clamped position with that day.
    pub fn clamp_negative(&mut self) -> Vec<(PositionKey, NaiveDate)> {
        let negative: Vec<(PositionKey, usize)> = self
            .shares
            .iter()
            .filter_map(|(key, column)| {
                column
                    .iter()
                    .position(|held| *held < Decimal::ZERO)
                    .map(|idx| (key.clone(), idx))
            })
            .collect();

        let mut clamped = Vec::with_capacity(negative.len());
        for (key, idx) in negative {
            let factors = self.factors.get(&key.ticker).map(Vec::as_slice);
            let column = cumulate(&self.deltas[&key], factors, true);
            self.shares.insert(key.clone(), column);
            self.clamped.insert(key.clone());
            clamped.push((key, self.grid.dates()[idx]));
        }
        clamped
    }

    /// Fails on the first grid day where any position is negative.
    pub fn check_non_negative(&self) -> Result<(), LedgerError> {
        for (key, column) in &self.shares {
            let deltas = &self.deltas[key];
            let factors = self.factors.get(&key.ticker);
            let mut prev = Decimal::ZERO;
            for (idx, held) in column.iter().enumerate() {
                if *held < Decimal::ZERO {
                    let factor = factors
                        .and_then(|f| f.get(idx).copied())
                        .unwrap_or(Decimal::ONE);
                    return Err(LedgerError::InsufficientPosition {
                        portfolio: key.portfolio.clone(),
                        ticker: key.ticker.clone(),
                        date: self.grid.dates()[idx],
                        held: prev * factor,
                        requested: -deltas[idx],
                    });
                }
                prev = *held;
            }
        }
        Ok(())
    }
}

fn cumulate(deltas: &[Decimal], factors: Option<&[Decimal]>, floor: bool) -> Vec<Decimal> {
    let mut running = Decimal::ZERO;
    deltas
        .iter()
        .enumerate()
        .map(|(idx, delta)| {
            if let Some(factor) = factors.and_then(|f| f.get(idx)) {
                running *= *factor;
            }
            running += *delta;
            if floor && running < Decimal::ZERO {
                running = Decimal::ZERO;
            }
            running
        })
        .collect()
}

/// Builds a [`PositionMatrix`] from ledger records and split history.
pub struct PositionReconstructor {
    grid: DailyGrid,
}

impl PositionReconstructor {
    pub fn new(grid: DailyGrid) -> Self {
        Self { grid }
    }

    /// Records dated before the grid fold into its first day; records after
    /// its last day are ignored. Same-day trades are summed.
    pub fn reconstruct(
        &self,
        records: &[TransactionRecord],
        splits: &[SplitEvent],
    ) -> Result<PositionMatrix, LedgerError> {
        let matrix = self.replay(records, splits);
        matrix.check_non_negative()?;
        Ok(matrix)
    }

    /// Like [`reconstruct`](Self::reconstruct), but a position that would go
    /// negative (a split missing from `splits`, say) is floored at zero and
    /// reported with the day it first went negative.
    pub fn reconstruct_clamped(
        &self,
        records: &[TransactionRecord],
        splits: &[SplitEvent],
    ) -> (PositionMatrix, Vec<(PositionKey, NaiveDate)>) {
        let mut matrix = self.replay(records, splits);
        let clamped = matrix.clamp_negative();
        (matrix, clamped)
    }

    fn replay(&self, records: &[TransactionRecord], splits: &[SplitEvent]) -> PositionMatrix {
        let len = self.grid.len();
        let mut deltas: BTreeMap<PositionKey, Vec<Decimal>> = BTreeMap::new();

        for record in records.iter().filter(|r| r.kind.is_trade()) {
            let (Some(ticker), Some(idx)) =
                (record.ticker.as_deref(), self.grid.index_on_or_after(record.date))
            else {
                continue;
            };
            if self.grid.end().is_some_and(|end| record.date > end) {
                continue;
            }
            let column = deltas
                .entry(PositionKey::new(&record.portfolio, ticker))
                .or_insert_with(|| vec![Decimal::ZERO; len]);
            column[idx] += record.signed_quantity();
        }

        let shares = deltas
            .iter()
            .map(|(key, d)| (key.clone(), cumulate(d, None, false)))
            .collect();
        let mut matrix = PositionMatrix {
            grid: self.grid.clone(),
            deltas,
            factors: HashMap::new(),
            shares,
            applied_splits: HashSet::new(),
            clamped: HashSet::new(),
        };

        let mut ordered: Vec<&SplitEvent> = splits.iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        for split in ordered {
            matrix.apply_split(split);
        }
        matrix
    }
}

/// Check the ledger invariant: along the chronological order (date, then
/// insertion), no prefix leaves a (portfolio, ticker) position negative.
/// Splits take effect on their date, before that day's trades.
pub fn check_position_invariant(
    records: &[TransactionRecord],
    splits: &[SplitEvent],
) -> Result<(), LedgerError> {
    let mut ordered: Vec<&TransactionRecord> =
        records.iter().filter(|r| r.kind.is_trade()).collect();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let mut splits_by_ticker: HashMap<&str, Vec<&SplitEvent>> = HashMap::new();
    let mut seen = HashSet::new();
    for split in splits {
        if split.factor > Decimal::ZERO && seen.insert((split.ticker.as_str(), split.date)) {
            splits_by_ticker
                .entry(split.ticker.as_str())
                .or_default()
                .push(split);
        }
    }
    for list in splits_by_ticker.values_mut() {
        list.sort_by_key(|s| s.date);
    }

    // (portfolio, ticker) -> (shares held, date of the last split applied)
    let mut held: HashMap<(&str, &str), (Decimal, Option<NaiveDate>)> = HashMap::new();
    for record in ordered {
        let Some(ticker) = record.ticker.as_deref() else {
            continue;
        };
        let (shares, last_split) = held
            .entry((record.portfolio.as_str(), ticker))
            .or_insert((Decimal::ZERO, None));

        for split in splits_by_ticker.get(ticker).into_iter().flatten() {
            let pending = last_split.map_or(true, |last| split.date > last);
            if pending && split.date <= record.date {
                *shares *= split.factor;
                *last_split = Some(split.date);
            }
        }

        let next = *shares + record.signed_quantity();
        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientPosition {
                portfolio: record.portfolio.clone(),
                ticker: ticker.to_string(),
                date: record.date,
                held: *shares,
                requested: record.quantity,
            });
        }
        *shares = next;
    }
    Ok(())
}
