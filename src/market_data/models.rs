use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn one() -> Decimal {
    Decimal::ONE
}

/// One trading day of a ticker's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryBar {
    pub date: NaiveDate,
    pub close: Decimal,
    /// Cash paid per share on this date; zero when none.
    #[serde(default)]
    pub dividend_per_share: Decimal,
    /// Split ratio effective this date (4 for a 4:1 split); one when none.
    #[serde(default = "one")]
    pub split_factor: Decimal,
}

impl HistoryBar {
    pub fn new(date: NaiveDate, close: Decimal) -> Self {
        Self {
            date,
            close,
            dividend_per_share: Decimal::ZERO,
            split_factor: Decimal::ONE,
        }
    }

    pub fn with_dividend(mut self, per_share: Decimal) -> Self {
        self.dividend_per_share = per_share;
        self
    }

    pub fn with_split(mut self, factor: Decimal) -> Self {
        self.split_factor = factor;
        self
    }

    /// Providers report "no split" as either 0 or 1.
    pub fn has_split(&self) -> bool {
        self.split_factor > Decimal::ZERO && self.split_factor != Decimal::ONE
    }

    pub fn has_dividend(&self) -> bool {
        self.dividend_per_share > Decimal::ZERO
    }
}

/// Units of `quote` per one unit of `base` on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxObservation {
    pub base: String,
    pub quote: String,
    pub date: NaiveDate,
    pub rate: Decimal,
}

impl FxObservation {
    pub fn new(
        base: impl Into<String>,
        quote: impl Into<String>,
        date: NaiveDate,
        rate: Decimal,
    ) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            date,
            rate,
        }
    }

    /// The same observation expressed as `quote -> base`. `None` for a zero rate.
    pub fn inverted(&self) -> Option<Self> {
        if self.rate.is_zero() {
            return None;
        }
        Some(Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
            date: self.date,
            rate: Decimal::ONE / self.rate,
        })
    }
}

/// Outcome of a market data lookup. A missing observation is an expected
/// data gap, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum Lookup<T> {
    Available(T),
    NotAvailable,
}

impl<T> Lookup<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Lookup::Available(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Available(value) => Some(value),
            Lookup::NotAvailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Available(value) => Lookup::Available(f(value)),
            Lookup::NotAvailable => Lookup::NotAvailable,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.into_option().unwrap_or(default)
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Available(v),
            None => Lookup::NotAvailable,
        }
    }
}

/// A close together with the date it was observed, which may be earlier
/// than the date asked for when it was forward-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedClose {
    pub date: NaiveDate,
    pub close: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitEvent {
    pub ticker: String,
    pub date: NaiveDate,
    pub factor: Decimal,
}

impl SplitEvent {
    pub fn new(ticker: impl Into<String>, date: NaiveDate, factor: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub ticker: String,
    pub date: NaiveDate,
    pub per_share: Decimal,
}

impl DividendEvent {
    pub fn new(ticker: impl Into<String>, date: NaiveDate, per_share: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            per_share,
        }
    }
}
