use anyhow::Result;
use chrono::NaiveDate;

use super::{FxObservation, HistoryBar};

/// A provider of daily history. Implementations talk to one external
/// service; the gateway layers caching, timeouts and gap handling on top.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Bars for `ticker` with `start <= date <= end`, in any order.
    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryBar>>;

    /// `base -> quote` observations with `start <= date <= end`.
    async fn fetch_fx_history(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FxObservation>>;

    fn name(&self) -> &str;
}

pub struct NoopSource;

#[async_trait::async_trait]
impl MarketDataSource for NoopSource {
    async fn fetch_history(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<HistoryBar>> {
        Ok(Vec::new())
    }

    async fn fetch_fx_history(
        &self,
        _base: &str,
        _quote: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<FxObservation>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}
