use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{FxObservation, HistoryBar, MarketDataSource};

/// In-memory source for tests. Can be told to fail or stall for specific
/// tickers, and counts the history requests it serves.
#[derive(Default)]
pub struct MemoryMarketDataSource {
    bars: Mutex<HashMap<String, Vec<HistoryBar>>>,
    fx: Mutex<HashMap<(String, String), Vec<FxObservation>>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    history_calls: AtomicUsize,
    fx_calls: AtomicUsize,
}

impl MemoryMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_bars(&self, ticker: &str, bars: Vec<HistoryBar>) {
        let mut store = self.bars.lock().await;
        store
            .entry(ticker.to_uppercase())
            .or_default()
            .extend(bars);
    }

    pub async fn insert_fx(&self, observations: Vec<FxObservation>) {
        let mut store = self.fx.lock().await;
        for obs in observations {
            store
                .entry((obs.base.clone(), obs.quote.clone()))
                .or_default()
                .push(obs);
        }
    }

    /// Make every history request for `ticker` return an error.
    pub async fn fail_ticker(&self, ticker: &str) {
        self.failing.lock().await.insert(ticker.to_uppercase());
    }

    /// Stall every request for `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn fx_calls(&self) -> usize {
        self.fx_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl MarketDataSource for MemoryMarketDataSource {
    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryBar>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;

        let ticker = ticker.to_uppercase();
        if self.failing.lock().await.contains(&ticker) {
            bail!("simulated provider failure for {ticker}");
        }

        let store = self.bars.lock().await;
        Ok(store
            .get(&ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_fx_history(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FxObservation>> {
        self.fx_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;

        let store = self.fx.lock().await;
        Ok(store
            .get(&(base.to_uppercase(), quote.to_uppercase()))
            .map(|obs| {
                obs.iter()
                    .filter(|o| o.date >= start && o.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
