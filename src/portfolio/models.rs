use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DividendCredit, GridFrequency, HoldingSnapshot, NamedSeries, ValuationGap};
use crate::settings::DividendMode;

/// Everything a dashboard needs for one as-of date, in the reporting
/// currency. Percentages are fractions (`0.25` is 25%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub as_of: NaiveDate,
    pub reporting_currency: String,
    pub grid: GridFrequency,
    pub totals: ReportTotals,
    pub portfolios: Vec<PortfolioSummary>,
    pub holdings: Vec<HoldingSnapshot>,
    pub dividends: Vec<DividendCredit>,
    /// Daily value per portfolio.
    pub value_history: Vec<NamedSeries>,
    /// Combined value and each benchmark, rebased to 100 at the grid start.
    pub curves: Vec<NamedSeries>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<ValuationGap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTotals {
    pub total_value: Decimal,
    pub total_cash: Decimal,
    pub holdings_value: Decimal,
    pub initial_cash: Decimal,
    pub pnl_vs_initial_cash: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_portfolio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub name: String,
    pub dividend_mode: DividendMode,
    pub initial_cash: Decimal,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub holdings_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
    pub realized_gain: Decimal,
    /// `(total_value - cost_basis) / cost_basis`, as a fraction.
    pub total_return: Decimal,
    pub cagr: Decimal,
    /// `(holdings_value - cost_basis) / cost_basis`, as a fraction.
    pub holdings_return: Decimal,
    pub holdings_cagr: Decimal,
    pub dividends_total: Decimal,
    /// Date of the earliest ledger record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_activity: Option<NaiveDate>,
}
