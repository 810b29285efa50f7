mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use paperfolio::clock::FixedClock;
use paperfolio::market_data::{
    DatedClose, FxObservation, HistoryBar, JsonlMarketDataSource, Lookup, MarketDataGateway,
    MemoryMarketDataCache, MemoryMarketDataSource, SourceRouter,
};
use paperfolio::models::Market;
use tempfile::TempDir;

use support::{day, dec};

async fn weekday_bars() -> Arc<MemoryMarketDataSource> {
    let source = Arc::new(MemoryMarketDataSource::new());
    // 2024-01-06 and 2024-01-07 are a weekend.
    source
        .insert_bars(
            "AAPL",
            vec![
                HistoryBar::new(day(4), dec("181.91")),
                HistoryBar::new(day(5), dec("181.18")),
                HistoryBar::new(day(8), dec("185.56")),
            ],
        )
        .await;
    source
}

#[tokio::test]
async fn weekend_lookups_forward_fill_from_friday() -> Result<()> {
    let source = weekday_bars().await;
    let gateway = MarketDataGateway::new(source.clone());

    assert_eq!(gateway.daily_close("AAPL", day(6)).await, Lookup::NotAvailable);
    assert_eq!(
        gateway.close_on_or_before("AAPL", day(7)).await,
        Lookup::Available(DatedClose {
            date: day(5),
            close: dec("181.18"),
        })
    );
    assert_eq!(gateway.daily_close("aapl", day(8)).await, Lookup::Available(dec("185.56")));
    Ok(())
}

#[tokio::test]
async fn lookback_window_bounds_forward_fill() -> Result<()> {
    let source = weekday_bars().await;
    let gateway = MarketDataGateway::new(source.clone()).with_lookback_days(2);

    assert!(gateway.close_on_or_before("AAPL", day(7)).await.is_available());
    assert_eq!(gateway.close_on_or_before("AAPL", day(20)).await, Lookup::NotAvailable);
    Ok(())
}

#[tokio::test]
async fn history_is_cached_until_ttl_expires() -> Result<()> {
    let source = weekday_bars().await;
    let clock = Arc::new(FixedClock::on_date(day(10)));
    let gateway = MarketDataGateway::new(source.clone())
        .with_clock(clock.clone())
        .with_cache(Arc::new(MemoryMarketDataCache::new(clock.clone())))
        .with_history_ttl(Duration::from_secs(60 * 60));

    gateway.history_range("AAPL", day(1), Some(day(8))).await;
    gateway.history_range("AAPL", day(1), Some(day(8))).await;
    assert_eq!(source.history_calls(), 1);

    clock.advance(chrono::Duration::hours(2));
    let bars = gateway.history_range("AAPL", day(1), Some(day(8))).await;
    assert_eq!(source.history_calls(), 2);
    assert_eq!(bars.len(), 3);

    gateway.invalidate("AAPL").await;
    gateway.history_range("AAPL", day(1), Some(day(8))).await;
    assert_eq!(source.history_calls(), 3);
    Ok(())
}

#[tokio::test]
async fn last_known_close_uses_today() -> Result<()> {
    let source = weekday_bars().await;
    let gateway = MarketDataGateway::new(source.clone())
        .with_clock(Arc::new(FixedClock::on_date(day(9))));

    let close = gateway.last_known_close("AAPL").await.into_option();
    assert_eq!(close.map(|c| c.date), Some(day(8)));
    gateway.last_known_close("AAPL").await;
    assert_eq!(source.history_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn provider_failure_is_not_available() -> Result<()> {
    let source = weekday_bars().await;
    source.fail_ticker("AAPL").await;
    let gateway = MarketDataGateway::new(source.clone());

    assert_eq!(gateway.daily_close("AAPL", day(5)).await, Lookup::NotAvailable);
    assert!(gateway.history_range("AAPL", day(1), Some(day(8))).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn slow_provider_times_out_as_not_available() -> Result<()> {
    let source = weekday_bars().await;
    source.set_delay(Duration::from_millis(500)).await;
    let gateway = MarketDataGateway::new(source.clone())
        .with_request_timeout(Duration::from_millis(20));

    assert_eq!(gateway.daily_close("AAPL", day(5)).await, Lookup::NotAvailable);
    Ok(())
}

#[tokio::test]
async fn reverse_pair_is_inverted() -> Result<()> {
    let source = Arc::new(MemoryMarketDataSource::new());
    source
        .insert_fx(vec![FxObservation::new("USD", "CAD", day(2), dec("1.25"))])
        .await;
    let gateway = MarketDataGateway::new(source.clone());

    assert_eq!(gateway.fx_rate("CAD", "USD", Some(day(3))).await, Lookup::Available(dec("0.8")));
    assert_eq!(gateway.fx_rate("usd", "USD", None).await, Lookup::Available(dec("1")));
    assert_eq!(gateway.fx_rate("EUR", "USD", Some(day(3))).await, Lookup::NotAvailable);
    assert_eq!(
        gateway.convert(dec("100"), "USD", "CAD", Some(day(2))).await,
        Lookup::Available(dec("125"))
    );
    Ok(())
}

#[tokio::test]
async fn splits_and_dividends_come_from_history() -> Result<()> {
    let source = Arc::new(MemoryMarketDataSource::new());
    source
        .insert_bars(
            "NVDA",
            vec![
                HistoryBar::new(day(2), dec("480")),
                HistoryBar::new(day(3), dec("48")).with_split(dec("10")),
                HistoryBar::new(day(4), dec("49")).with_dividend(dec("0.01")),
            ],
        )
        .await;
    let gateway = MarketDataGateway::new(source.clone());

    let splits = gateway.splits("NVDA", day(1), Some(day(10))).await;
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].factor, dec("10"));
    let dividends = gateway.dividends("NVDA", day(1), Some(day(10))).await;
    assert_eq!(dividends.len(), 1);
    assert_eq!(dividends[0].date, day(4));
    Ok(())
}

#[tokio::test]
async fn router_sends_listings_to_their_market_source() -> Result<()> {
    let dir = TempDir::new()?;
    let tsx = Arc::new(JsonlMarketDataSource::new(dir.path()));
    tsx.put_bars("RY.TO", &[HistoryBar::new(day(2), dec("131.4"))]).await?;

    let us = weekday_bars().await;
    let router = SourceRouter::new(us.clone()).with_route(Market::Tsx, tsx);
    let gateway = MarketDataGateway::new(Arc::new(router));

    assert_eq!(gateway.daily_close("RY.TO", day(2)).await, Lookup::Available(dec("131.4")));
    assert_eq!(gateway.daily_close("AAPL", day(4)).await, Lookup::Available(dec("181.91")));
    Ok(())
}
