use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::MarketDataConfig;

use super::{
    CacheKey, CachedValue, DatedClose, DividendEvent, FxObservation, HistoryBar, Lookup,
    MarketDataCache, MarketDataSource, MemoryMarketDataCache, SplitEvent,
};

/// The valuation engine's only view of market data.
///
/// Every lookup is memoized in the injected cache and bounded by a request
/// timeout. A failing, stalled or empty source yields an empty history or
/// [`Lookup::NotAvailable`], never an error.
pub struct MarketDataGateway {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<dyn MarketDataCache>,
    clock: Arc<dyn Clock>,
    lookback_days: u32,
    history_ttl: Duration,
    last_close_ttl: Duration,
    request_timeout: Duration,
}

impl MarketDataGateway {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        let defaults = MarketDataConfig::default();
        Self {
            source,
            cache: Arc::new(MemoryMarketDataCache::default()),
            clock: Arc::new(SystemClock),
            lookback_days: defaults.lookback_days,
            history_ttl: defaults.history_ttl,
            last_close_ttl: defaults.last_close_ttl,
            request_timeout: defaults.request_timeout,
        }
    }

    pub fn with_config(self, config: &MarketDataConfig) -> Self {
        self.with_lookback_days(config.lookback_days)
            .with_history_ttl(config.history_ttl)
            .with_last_close_ttl(config.last_close_ttl)
            .with_request_timeout(config.request_timeout)
    }

    pub fn with_cache(mut self, cache: Arc<dyn MarketDataCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_history_ttl(mut self, ttl: Duration) -> Self {
        self.history_ttl = ttl;
        self
    }

    pub fn with_last_close_ttl(mut self, ttl: Duration) -> Self {
        self.last_close_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn lookback_start(&self, date: NaiveDate) -> NaiveDate {
        date - chrono::Duration::days(i64::from(self.lookback_days))
    }

    /// Run one source request under the timeout. Failures are logged and
    /// reported as `None`.
    async fn guarded<T>(&self, request: &str, fut: impl Future<Output = Result<T>>) -> Option<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(
                    source = self.source.name(),
                    request,
                    error = %e,
                    "market data request failed"
                );
                None
            }
            Err(_) => {
                warn!(
                    source = self.source.name(),
                    request,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "market data request timed out"
                );
                None
            }
        }
    }

    /// Daily bars for `ticker` between `start` and `end` (today when omitted),
    /// sorted by date with one bar per date.
    pub async fn history_range(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Vec<HistoryBar> {
        let ticker = ticker.trim().to_uppercase();
        let end = end.unwrap_or_else(|| self.clock.today());
        if end < start {
            return Vec::new();
        }

        let key = CacheKey::History {
            ticker: ticker.clone(),
            start,
            end,
        };
        if let Some(CachedValue::History(bars)) = self.cache.get(&key).await {
            debug!(ticker = %ticker, start = %start, end = %end, "history cache hit");
            return bars;
        }

        debug!(ticker = %ticker, start = %start, end = %end, "fetching history");
        let request = format!("history {ticker} {start}..{end}");
        let Some(mut bars) = self
            .guarded(&request, self.source.fetch_history(&ticker, start, end))
            .await
        else {
            return Vec::new();
        };

        bars.retain(|b| b.date >= start && b.date <= end);
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        if bars.is_empty() {
            warn!(ticker = %ticker, start = %start, end = %end, "no history returned");
        }

        self.cache
            .put(key, CachedValue::History(bars.clone()), self.history_ttl)
            .await;
        bars
    }

    /// The close on exactly `date`.
    pub async fn daily_close(&self, ticker: &str, date: NaiveDate) -> Lookup<Decimal> {
        self.history_range(ticker, date, Some(date))
            .await
            .into_iter()
            .find(|b| b.date == date && b.close > Decimal::ZERO)
            .map(|b| b.close)
            .into()
    }

    /// The most recent close on or before `date`, looking back at most
    /// `lookback_days`.
    pub async fn close_on_or_before(&self, ticker: &str, date: NaiveDate) -> Lookup<DatedClose> {
        let bars = self
            .history_range(ticker, self.lookback_start(date), Some(date))
            .await;

        for offset in 0..=self.lookback_days {
            let target_date = date - chrono::Duration::days(i64::from(offset));
            if let Some(bar) = bars
                .iter()
                .find(|b| b.date == target_date && b.close > Decimal::ZERO)
            {
                debug!(
                    ticker = %ticker,
                    date = %target_date,
                    close = %bar.close,
                    "close found"
                );
                return Lookup::Available(DatedClose {
                    date: bar.date,
                    close: bar.close,
                });
            }
        }

        warn!(
            ticker = %ticker,
            date = %date,
            lookback_days = self.lookback_days,
            "no close within lookback window"
        );
        Lookup::NotAvailable
    }

    /// Latest close as of today, forward-filled across weekends and gaps.
    pub async fn last_known_close(&self, ticker: &str) -> Lookup<DatedClose> {
        let ticker = ticker.trim().to_uppercase();
        let key = CacheKey::LastClose {
            ticker: ticker.clone(),
        };
        if let Some(CachedValue::LastClose(close)) = self.cache.get(&key).await {
            debug!(ticker = %ticker, "last close cache hit");
            return Lookup::Available(close);
        }

        let found = self.close_on_or_before(&ticker, self.clock.today()).await;
        if let Lookup::Available(close) = found {
            self.cache
                .put(key, CachedValue::LastClose(close), self.last_close_ttl)
                .await;
        }
        found
    }

    /// `base -> quote` observations between `start` and `end`. When the
    /// direct pair is unavailable, the reverse pair is fetched and inverted.
    pub async fn fx_history(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Vec<FxObservation> {
        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        let end = end.unwrap_or_else(|| self.clock.today());
        if base == quote || end < start {
            return Vec::new();
        }

        let key = CacheKey::FxHistory {
            base: base.clone(),
            quote: quote.clone(),
            start,
            end,
        };
        if let Some(CachedValue::FxHistory(rates)) = self.cache.get(&key).await {
            debug!(base = %base, quote = %quote, "FX history cache hit");
            return rates;
        }

        let direct = self
            .guarded(
                &format!("fx {base}/{quote} {start}..{end}"),
                self.source.fetch_fx_history(&base, &quote, start, end),
            )
            .await;
        let mut rates = match direct {
            Some(rates) if !rates.is_empty() => Some(rates),
            direct => {
                let reverse = self
                    .guarded(
                        &format!("fx {quote}/{base} {start}..{end}"),
                        self.source.fetch_fx_history(&quote, &base, start, end),
                    )
                    .await
                    .map(|rates| {
                        rates
                            .iter()
                            .filter_map(FxObservation::inverted)
                            .collect::<Vec<_>>()
                    });
                match (direct, reverse) {
                    (_, Some(inverted)) if !inverted.is_empty() => {
                        debug!(base = %base, quote = %quote, "using inverted reverse FX pair");
                        Some(inverted)
                    }
                    (None, None) => None,
                    _ => Some(Vec::new()),
                }
            }
        };

        let Some(rates) = rates.as_mut() else {
            return Vec::new();
        };
        rates.retain(|o| o.date >= start && o.date <= end && o.rate > Decimal::ZERO);
        rates.sort_by_key(|o| o.date);
        rates.dedup_by_key(|o| o.date);

        self.cache
            .put(key, CachedValue::FxHistory(rates.clone()), self.history_ttl)
            .await;
        rates.clone()
    }

    /// Rate converting one unit of `from` into `to` on `date` (today when
    /// omitted), forward-filled within the lookback window.
    pub async fn fx_rate(&self, from: &str, to: &str, date: Option<NaiveDate>) -> Lookup<Decimal> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from == to {
            return Lookup::Available(Decimal::ONE);
        }

        let date = date.unwrap_or_else(|| self.clock.today());
        let rates = self
            .fx_history(&from, &to, self.lookback_start(date), Some(date))
            .await;

        for offset in 0..=self.lookback_days {
            let target_date = date - chrono::Duration::days(i64::from(offset));
            if let Some(obs) = rates.iter().find(|o| o.date == target_date) {
                debug!(
                    from = %from,
                    to = %to,
                    date = %target_date,
                    rate = %obs.rate,
                    "FX rate found"
                );
                return Lookup::Available(obs.rate);
            }
        }

        warn!(from = %from, to = %to, date = %date, "no FX rate within lookback window");
        Lookup::NotAvailable
    }

    pub async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        date: Option<NaiveDate>,
    ) -> Lookup<Decimal> {
        self.fx_rate(from, to, date).await.map(|rate| amount * rate)
    }

    /// Split events for `ticker`, read from the history's split factors.
    pub async fn splits(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Vec<SplitEvent> {
        let ticker = ticker.trim().to_uppercase();
        self.history_range(&ticker, start, end)
            .await
            .into_iter()
            .filter(HistoryBar::has_split)
            .map(|b| SplitEvent::new(ticker.clone(), b.date, b.split_factor))
            .collect()
    }

    pub async fn dividends(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Vec<DividendEvent> {
        let ticker = ticker.trim().to_uppercase();
        self.history_range(&ticker, start, end)
            .await
            .into_iter()
            .filter(HistoryBar::has_dividend)
            .map(|b| DividendEvent::new(ticker.clone(), b.date, b.dividend_per_share))
            .collect()
    }

    /// Forget everything cached about `ticker`, e.g. after new bars are stored.
    pub async fn invalidate(&self, ticker: &str) {
        self.cache.invalidate_ticker(&ticker.trim().to_uppercase()).await;
    }
}
