use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridFrequency {
    /// Every calendar day.
    #[default]
    Calendar,
    /// Monday through Friday. No exchange holiday calendar is applied.
    Business,
}

impl GridFrequency {
    pub fn includes(&self, date: NaiveDate) -> bool {
        match self {
            GridFrequency::Calendar => true,
            GridFrequency::Business => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

impl std::str::FromStr for GridFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "calendar" | "daily" => Ok(GridFrequency::Calendar),
            "business" | "trading" => Ok(GridFrequency::Business),
            other => anyhow::bail!("unknown grid frequency '{other}' (use: calendar, business)"),
        }
    }
}

/// Dense, ascending sequence of dates that positions, cash and value are
/// reconstructed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyGrid {
    dates: Vec<NaiveDate>,
    frequency: GridFrequency,
}

impl DailyGrid {
    /// Grid covering `start..=end`. With business frequency a weekend `start`
    /// rolls forward to Monday. Empty when `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate, frequency: GridFrequency) -> Self {
        let mut dates = Vec::new();
        let mut day = start;
        while day <= end {
            if frequency.includes(day) {
                dates.push(day);
            }
            day += Duration::days(1);
        }
        Self { dates, frequency }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn frequency(&self) -> GridFrequency {
        self.frequency
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// First grid day on or after `date`. An event dated on a non-grid day
    /// takes effect here.
    pub fn index_on_or_after(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.dates.partition_point(|d| *d < date);
        (idx < self.dates.len()).then_some(idx)
    }

    /// Last grid day on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        self.dates.partition_point(|d| *d <= date).checked_sub(1)
    }

    /// Carry the latest observation on or before each grid day forward.
    /// `observations` must be sorted by date. Days before the first
    /// observation are `None`.
    pub fn forward_fill<T: Copy>(&self, observations: &[(NaiveDate, T)]) -> Vec<Option<T>> {
        let mut filled = Vec::with_capacity(self.dates.len());
        let mut next = 0;
        let mut current = None;
        for date in &self.dates {
            while let Some((observed, value)) = observations.get(next) {
                if observed > date {
                    break;
                }
                current = Some(*value);
                next += 1;
            }
            filled.push(current);
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_grid_is_inclusive() {
        let grid = DailyGrid::new(date(2024, 1, 1), date(2024, 1, 10), GridFrequency::Calendar);
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.start(), Some(date(2024, 1, 1)));
        assert_eq!(grid.end(), Some(date(2024, 1, 10)));
    }

    #[test]
    fn business_grid_skips_weekends() {
        // 2024-01-06 and 2024-01-07 are Saturday and Sunday.
        let grid = DailyGrid::new(date(2024, 1, 5), date(2024, 1, 9), GridFrequency::Business);
        assert_eq!(
            grid.dates(),
            &[date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 9)]
        );
        assert_eq!(grid.index_of(date(2024, 1, 6)), None);
        assert_eq!(grid.index_on_or_after(date(2024, 1, 6)), Some(1));
        assert_eq!(grid.index_on_or_before(date(2024, 1, 7)), Some(0));
    }

    #[test]
    fn lookups_outside_the_grid() {
        let grid = DailyGrid::new(date(2024, 1, 2), date(2024, 1, 4), GridFrequency::Calendar);
        assert_eq!(grid.index_on_or_before(date(2024, 1, 1)), None);
        assert_eq!(grid.index_on_or_after(date(2024, 1, 5)), None);
        assert_eq!(grid.index_on_or_after(date(2023, 12, 1)), Some(0));
        assert!(
            DailyGrid::new(date(2024, 1, 4), date(2024, 1, 2), GridFrequency::Calendar).is_empty()
        );
    }

    #[test]
    fn forward_fill_carries_last_observation() {
        let grid = DailyGrid::new(date(2024, 1, 1), date(2024, 1, 6), GridFrequency::Calendar);
        let filled = grid.forward_fill(&[
            (date(2023, 12, 29), 5),
            (date(2024, 1, 3), 7),
            (date(2024, 1, 5), 9),
        ]);
        assert_eq!(filled, vec![Some(5), Some(5), Some(7), Some(7), Some(9), Some(9)]);

        let late = grid.forward_fill(&[(date(2024, 1, 4), 1)]);
        assert_eq!(late, vec![None, None, None, Some(1), Some(1), Some(1)]);
    }
}
