mod support;

use std::sync::Arc;

use anyhow::Result;
use paperfolio::ledger::RecordFilter;
use paperfolio::market_data::{
    FxObservation, HistoryBar, Lookup, MarketDataGateway, MemoryMarketDataSource,
};
use paperfolio::models::{NewTransaction, RecordId};
use paperfolio::portfolio::{
    check_position_invariant, DividendSource, GapKind, PortfolioReport, PortfolioSummary,
    TOTAL_CURVE,
};
use rust_decimal::Decimal;

use support::{day, dec, harness, Harness};

/// AAPL bought on day 1, a $1 dividend on day 5, a 4:1 split on day 10 and a
/// full sale on day 20.
async fn aapl_lifecycle() -> Result<Harness> {
    let source = MemoryMarketDataSource::new();
    source
        .insert_bars(
            "AAPL",
            vec![
                HistoryBar::new(day(1), dec("150")),
                HistoryBar::new(day(5), dec("150")).with_dividend(dec("1")),
                HistoryBar::new(day(10), dec("37.5")).with_split(dec("4")),
                HistoryBar::new(day(20), dec("45")),
            ],
        )
        .await;
    let h = harness(source, day(31)).await?;

    h.service
        .record_transaction(
            NewTransaction::buy(day(1), "Test", "AAPL", dec("10"), dec("150"))
                .with_fee(Decimal::ZERO),
        )
        .await?;
    h.service
        .record_transaction(
            NewTransaction::sell(day(20), "Test", "AAPL", dec("40"), dec("45"))
                .with_fee(Decimal::ZERO),
        )
        .await?;
    Ok(h)
}

fn test_summary(report: &PortfolioReport) -> &PortfolioSummary {
    report
        .portfolios
        .iter()
        .find(|p| p.name == "Test")
        .expect("Test portfolio in report")
}

#[tokio::test]
async fn scenario_a_buy_reduces_cash() -> Result<()> {
    let h = aapl_lifecycle().await?;
    let report = h.service.report(Some(day(1))).await?;

    let summary = test_summary(&report);
    assert_eq!(summary.cash, dec("8500"));
    assert_eq!(report.holdings.len(), 1);
    assert_eq!(report.holdings[0].shares, dec("10"));
    assert_eq!(summary.total_value, dec("10000"));
    Ok(())
}

#[tokio::test]
async fn scenario_b_dividend_credits_held_shares() -> Result<()> {
    let h = aapl_lifecycle().await?;
    let report = h.service.report(Some(day(5))).await?;

    let summary = test_summary(&report);
    assert_eq!(summary.cash, dec("8510"));
    assert_eq!(summary.dividends_total, dec("10"));
    assert_eq!(report.dividends.len(), 1);
    assert_eq!(report.dividends[0].amount, dec("10"));
    assert_eq!(report.dividends[0].source, DividendSource::Auto);
    Ok(())
}

#[tokio::test]
async fn scenario_c_split_keeps_cost_basis() -> Result<()> {
    let h = aapl_lifecycle().await?;
    let report = h.service.report(Some(day(10))).await?;

    let holding = &report.holdings[0];
    assert_eq!(holding.shares, dec("40"));
    assert_eq!(holding.average_cost, dec("37.5"));
    assert_eq!(holding.cost_basis, dec("1500"));
    assert_eq!(test_summary(&report).cost_basis, dec("1500"));
    Ok(())
}

#[tokio::test]
async fn scenario_d_sell_after_split_realizes_gain() -> Result<()> {
    let h = aapl_lifecycle().await?;
    let report = h.service.report(Some(day(20))).await?;

    let summary = test_summary(&report);
    assert_eq!(summary.cash, dec("10310"));
    assert_eq!(summary.holdings_value, Decimal::ZERO);
    assert_eq!(summary.realized_gain, dec("300"));
    assert_eq!(summary.cost_basis, Decimal::ZERO);
    assert_eq!(summary.total_return, Decimal::ZERO);
    assert!(report.holdings.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_provider_for_a_split_ticker_still_values_the_rest() -> Result<()> {
    let h = aapl_lifecycle().await?;
    h.source
        .insert_bars("MSFT", vec![HistoryBar::new(day(2), dec("400"))])
        .await;
    h.service
        .record_transaction(
            NewTransaction::buy(day(2), "Test", "MSFT", dec("1"), dec("400"))
                .with_fee(Decimal::ZERO),
        )
        .await?;
    h.source.fail_ticker("AAPL").await;

    let report = h.service.report(Some(day(31))).await?;

    let summary = test_summary(&report);
    // Cash still reflects the AAPL trades; only the dividend feed is lost.
    assert_eq!(summary.cash, dec("9900"));
    assert_eq!(summary.holdings_value, dec("400"));
    assert_eq!(report.holdings.len(), 1);
    assert_eq!(report.holdings[0].ticker, "MSFT");
    assert!(report
        .gaps
        .iter()
        .any(|g| g.kind == GapKind::UnreconciledPosition && g.subject == "Test/AAPL"));
    Ok(())
}

#[tokio::test]
async fn scenario_e_benchmark_rebased_to_one_hundred() -> Result<()> {
    let source = MemoryMarketDataSource::new();
    source
        .insert_bars(
            "SPY",
            vec![
                HistoryBar::new(day(1), dec("470")),
                HistoryBar::new(day(2), dec("475")),
                HistoryBar::new(day(5), dec("493.5")),
            ],
        )
        .await;
    let h = harness(source, day(31)).await?;
    h.service
        .update_settings(|s| s.benchmarks = vec!["SPY".to_string()])
        .await?;
    h.service
        .record_transaction(NewTransaction::deposit(day(1), "Test", dec("100"), "USD"))
        .await?;

    let report = h.service.report(Some(day(5))).await?;
    let spy = report
        .curves
        .iter()
        .find(|c| c.name == "SPY")
        .expect("SPY curve");
    assert_eq!(spy.points[0].date, day(1));
    assert_eq!(spy.points[0].value, Decimal::ONE_HUNDRED);
    assert_eq!(spy.points[4].value, dec("493.5") / dec("470") * Decimal::ONE_HUNDRED);
    // Weekend-style gaps carry the last close forward.
    assert_eq!(spy.points[2].value, spy.points[1].value);

    let total = report
        .curves
        .iter()
        .find(|c| c.name == TOTAL_CURVE)
        .expect("total curve");
    assert_eq!(total.points[0].value, Decimal::ONE_HUNDRED);
    Ok(())
}

#[tokio::test]
async fn buy_then_sell_at_same_price_round_trips() -> Result<()> {
    let source = MemoryMarketDataSource::new();
    source
        .insert_bars("MSFT", vec![HistoryBar::new(day(2), dec("400"))])
        .await;
    let h = harness(source, day(31)).await?;
    h.service
        .record_transaction(NewTransaction::buy(day(2), "Test", "MSFT", dec("3"), dec("400")))
        .await?;
    h.service
        .record_transaction(NewTransaction::sell(day(2), "Test", "MSFT", dec("3"), dec("400")))
        .await?;

    let report = h.service.report(Some(day(3))).await?;
    let summary = test_summary(&report);
    assert_eq!(summary.cash, dec("10000"));
    assert_eq!(summary.holdings_value, Decimal::ZERO);
    assert!(report.holdings.is_empty());
    Ok(())
}

#[tokio::test]
async fn every_prefix_of_an_accepted_ledger_is_non_negative() -> Result<()> {
    let h = harness(MemoryMarketDataSource::new(), day(31)).await?;
    let attempts = [
        NewTransaction::buy(day(1), "Test", "AAPL", dec("5"), dec("1")),
        NewTransaction::sell(day(2), "Test", "AAPL", dec("3"), dec("1")),
        NewTransaction::sell(day(3), "Test", "AAPL", dec("3"), dec("1")),
        NewTransaction::buy(day(4), "Test", "AAPL", dec("1"), dec("1")),
        NewTransaction::sell(day(4), "Test", "AAPL", dec("3"), dec("1")),
        NewTransaction::sell(day(1), "Test", "AAPL", dec("1"), dec("1")),
    ];
    let mut accepted = 0;
    for tx in attempts {
        if h.service.record_transaction(tx).await.is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 4);

    let records = h.service.transactions(&RecordFilter::all()).await?;
    for end in 1..=records.len() {
        check_position_invariant(&records[..end], &[])?;
    }
    Ok(())
}

#[tokio::test]
async fn fx_conversion_round_trips() -> Result<()> {
    let source = MemoryMarketDataSource::new();
    source
        .insert_fx(vec![FxObservation::new("USD", "CAD", day(3), dec("1.3571"))])
        .await;
    let gateway = MarketDataGateway::new(Arc::new(source));

    let amount = dec("1234.56");
    let Lookup::Available(cad) = gateway.convert(amount, "USD", "CAD", Some(day(4))).await else {
        panic!("USD/CAD should be available");
    };
    let Lookup::Available(back) = gateway.convert(cad, "CAD", "USD", Some(day(4))).await else {
        panic!("CAD/USD should be available");
    };
    assert!((back - amount).abs() < dec("0.0000001"), "round trip gave {back}");
    Ok(())
}

#[tokio::test]
async fn deleted_ids_are_not_reissued() -> Result<()> {
    let h = harness(MemoryMarketDataSource::new(), day(31)).await?;
    let first = h
        .service
        .record_transaction(NewTransaction::deposit(day(1), "Test", dec("1"), "USD"))
        .await?;
    h.service.delete_transaction(first.id).await?;
    let second = h
        .service
        .record_transaction(NewTransaction::deposit(day(1), "Test", dec("1"), "USD"))
        .await?;
    assert_eq!(second.id, RecordId::new(2));
    Ok(())
}
