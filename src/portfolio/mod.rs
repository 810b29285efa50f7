//! Reconstructing and valuing paper portfolios from the ledger.
//!
//! Data flows ledger records -> positions and cash on a [`DailyGrid`] ->
//! [`Valuation`] -> [`PortfolioReport`].

pub mod benchmark;
mod cash;
mod cost_basis;
mod grid;
mod models;
mod positions;
mod service;
mod valuation;

pub use benchmark::{NamedSeries, SeriesPoint};
pub use cash::{CashMatrix, CashReconstructor, DividendCredit, DividendSource};
pub use cost_basis::{AverageCostBook, CostPosition};
pub use grid::{DailyGrid, GridFrequency};
pub use models::{PortfolioReport, PortfolioSummary, ReportTotals};
pub use positions::{check_position_invariant, PositionKey, PositionMatrix, PositionReconstructor};
pub use service::{PortfolioService, TOTAL_CURVE};
pub use valuation::{GapKind, HoldingSnapshot, Valuation, ValuationGap, ValuationOptions};
