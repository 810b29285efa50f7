use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use super::{FxObservation, HistoryBar, MarketDataSource};
use crate::models::Market;

/// Routes history lookups to a per-market source (US listings and Canadian
/// listings are typically served by different providers), falling back to a
/// default source when the routed one has nothing.
pub struct SourceRouter {
    routes: HashMap<Market, Arc<dyn MarketDataSource>>,
    fallback: Arc<dyn MarketDataSource>,
    fx: Option<Arc<dyn MarketDataSource>>,
}

impl SourceRouter {
    pub fn new(fallback: Arc<dyn MarketDataSource>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
            fx: None,
        }
    }

    pub fn with_route(mut self, market: Market, source: Arc<dyn MarketDataSource>) -> Self {
        self.routes.insert(market, source);
        self
    }

    pub fn with_fx_source(mut self, source: Arc<dyn MarketDataSource>) -> Self {
        self.fx = Some(source);
        self
    }

    fn candidates(&self, market: Market) -> Vec<&Arc<dyn MarketDataSource>> {
        let mut sources: Vec<&Arc<dyn MarketDataSource>> = Vec::with_capacity(2);
        if let Some(source) = self.routes.get(&market) {
            sources.push(source);
        }
        if !sources
            .iter()
            .any(|s| Arc::ptr_eq(s, &self.fallback))
        {
            sources.push(&self.fallback);
        }
        sources
    }
}

#[async_trait::async_trait]
impl MarketDataSource for SourceRouter {
    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryBar>> {
        let market = Market::from_ticker(ticker);
        for source in self.candidates(market) {
            let bars = source.fetch_history(ticker, start, end).await?;
            if !bars.is_empty() {
                debug!(ticker, market = %market, source = source.name(), "history routed");
                return Ok(bars);
            }
        }
        Ok(Vec::new())
    }

    async fn fetch_fx_history(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FxObservation>> {
        if let Some(fx) = &self.fx {
            let rates = fx.fetch_fx_history(base, quote, start, end).await?;
            if !rates.is_empty() {
                return Ok(rates);
            }
        }
        self.fallback
            .fetch_fx_history(base, quote, start, end)
            .await
    }

    fn name(&self) -> &str {
        "router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::MemoryMarketDataSource;
    use rust_decimal::Decimal;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[tokio::test]
    async fn routes_by_ticker_suffix_then_falls_back() -> Result<()> {
        let us = Arc::new(MemoryMarketDataSource::new());
        us.insert_bars("AAPL", vec![HistoryBar::new(day(2), Decimal::from(150))])
            .await;
        let canada = Arc::new(MemoryMarketDataSource::new());
        canada
            .insert_bars("RY.TO", vec![HistoryBar::new(day(2), Decimal::from(130))])
            .await;

        let router = SourceRouter::new(us.clone()).with_route(Market::Tsx, canada.clone());

        let ry = router.fetch_history("RY.TO", day(1), day(3)).await?;
        assert_eq!(ry[0].close, Decimal::from(130));
        let aapl = router.fetch_history("AAPL", day(1), day(3)).await?;
        assert_eq!(aapl[0].close, Decimal::from(150));
        assert_eq!(canada.history_calls(), 1);

        // The routed source has no SHOP.TO history, so the fallback is asked too.
        assert!(router.fetch_history("SHOP.TO", day(1), day(3)).await?.is_empty());
        assert_eq!(canada.history_calls(), 2);
        assert_eq!(us.history_calls(), 2);
        Ok(())
    }
}
