//! Benchmark curves rebased to 100.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DailyGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: Decimal) -> Self {
        Self { date, value }
    }
}

/// A labelled series, e.g. one portfolio's daily value or one benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSeries {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl NamedSeries {
    pub fn new(name: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }
}

/// Rebase `series` so the first point on or after `base_date` is 100.
///
/// Points before the base are dropped. Empty when nothing is on or after
/// `base_date` or the base value is zero.
pub fn normalize(series: &[SeriesPoint], base_date: NaiveDate) -> Vec<SeriesPoint> {
    let mut points: Vec<&SeriesPoint> = series.iter().filter(|p| p.date >= base_date).collect();
    points.sort_by_key(|p| p.date);

    let Some(base) = points.first().map(|p| p.value) else {
        return Vec::new();
    };
    if base.is_zero() {
        return Vec::new();
    }

    let hundred = Decimal::ONE_HUNDRED;
    points
        .into_iter()
        .map(|p| SeriesPoint::new(p.date, p.value / base * hundred))
        .collect()
}

/// Resample `points` onto `grid`, forward-filling days without an
/// observation. Grid days before the first observation are omitted.
pub fn align_to_grid(points: &[SeriesPoint], grid: &DailyGrid) -> Vec<SeriesPoint> {
    let mut observations: Vec<(NaiveDate, Decimal)> =
        points.iter().map(|p| (p.date, p.value)).collect();
    observations.sort_by_key(|(date, _)| *date);
    observations.dedup_by_key(|(date, _)| *date);

    grid.dates()
        .iter()
        .zip(grid.forward_fill(&observations))
        .filter_map(|(date, value)| value.map(|v| SeriesPoint::new(*date, v)))
        .collect()
}
