mod support;

use anyhow::Result;
use tempfile::TempDir;

use support::{dec, json_dec, run_cli, write_config};

#[test]
fn config_shows_resolved_paths() -> Result<()> {
    let temp = TempDir::new()?;
    let config_path = write_config(temp.path())?;

    let json = run_cli(&config_path, &["config"])?;
    assert_eq!(json["reporting_currency"], "USD");
    assert_eq!(json["valuation"]["grid"], "calendar");
    assert_eq!(json["market_data"]["lookback_days"], 7);
    Ok(())
}

#[test]
fn settings_are_created_with_defaults() -> Result<()> {
    let temp = TempDir::new()?;
    let config_path = write_config(temp.path())?;

    let json = run_cli(&config_path, &["settings", "show"])?;
    let settings = &json["settings"];
    assert_eq!(
        settings["portfolios"],
        serde_json::json!(["Conservative", "Moderate", "Aggressive"])
    );
    assert_eq!(settings["benchmarks"], serde_json::json!(["SPY", "QQQ", "VT"]));
    assert_eq!(json_dec(&settings["initial_cash"]["Moderate"]), dec("10000"));
    assert!(temp.path().join("settings.json").exists());
    Ok(())
}

#[test]
fn rejected_sell_reports_error_and_leaves_ledger_alone() -> Result<()> {
    let temp = TempDir::new()?;
    let config_path = write_config(temp.path())?;

    let buy = run_cli(
        &config_path,
        &[
            "tx", "add", "--portfolio", "Moderate", "--kind", "BUY", "--date", "2024-01-02",
            "--ticker", "AAPL", "--quantity", "10", "--price", "150",
        ],
    )?;
    assert_eq!(buy["success"], true);
    assert_eq!(buy["transaction"]["id"], 1);

    let sell = run_cli(
        &config_path,
        &[
            "tx", "add", "--portfolio", "Moderate", "--kind", "sell", "--date", "2024-01-03",
            "--ticker", "AAPL", "--quantity", "11", "--price", "150",
        ],
    )?;
    assert_eq!(sell["success"], false);
    assert!(sell["error"]
        .as_str()
        .is_some_and(|e| e.contains("Insufficient position")));

    let bad_date = run_cli(
        &config_path,
        &[
            "tx",
            "add",
            "--portfolio",
            "Moderate",
            "--kind",
            "CASH_DEPOSIT",
            "--date",
            "01/03/2024",
            "--quantity",
            "5",
        ],
    )?;
    assert_eq!(bad_date["success"], false);

    let list = run_cli(&config_path, &["tx", "list"])?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn report_values_portfolios_from_stored_market_data() -> Result<()> {
    let temp = TempDir::new()?;
    let config_path = write_config(temp.path())?;

    run_cli(&config_path, &["settings", "set-benchmarks", "SPY"])?;
    run_cli(&config_path, &["market", "add-bar", "AAPL", "2024-01-02", "150"])?;
    run_cli(
        &config_path,
        &["market", "add-bar", "AAPL", "2024-01-05", "160", "--dividend", "1"],
    )?;
    run_cli(&config_path, &["market", "add-bar", "SPY", "2024-01-02", "470"])?;
    run_cli(&config_path, &["market", "add-bar", "SPY", "2024-01-05", "517"])?;
    run_cli(
        &config_path,
        &[
            "tx", "add", "--portfolio", "Moderate", "--kind", "BUY", "--date", "2024-01-02",
            "--ticker", "AAPL", "--quantity", "10", "--price", "150",
        ],
    )?;

    let report = run_cli(&config_path, &["report", "--as-of", "2024-01-05"])?;
    assert_eq!(report["as_of"], "2024-01-05");
    assert_eq!(report["reporting_currency"], "USD");

    let moderate = report["portfolios"]
        .as_array()
        .and_then(|ps| ps.iter().find(|p| p["name"] == "Moderate"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(json_dec(&moderate["cash"]), dec("8510"));
    assert_eq!(json_dec(&moderate["holdings_value"]), dec("1600"));
    assert_eq!(json_dec(&moderate["cost_basis"]), dec("1500"));
    assert_eq!(json_dec(&report["totals"]["initial_cash"]), dec("30000"));
    assert_eq!(report["totals"]["best_portfolio"], "Moderate");

    let spy = report["curves"]
        .as_array()
        .and_then(|cs| cs.iter().find(|c| c["name"] == "SPY"))
        .cloned()
        .unwrap_or_default();
    assert_eq!(json_dec(&spy["points"][0]["value"]), dec("100"));
    assert_eq!(json_dec(&spy["points"][3]["value"]), dec("110"));
    Ok(())
}
