use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::info;

use super::{FxObservation, HistoryBar, MarketDataSource};
use crate::jsonl::{read_jsonl, write_jsonl};

/// Offline history kept as JSONL files, one file per ticker or currency pair.
///
/// Directory structure:
/// ```text
/// data/
///   market/
///     history/
///       AAPL.jsonl
///       RY_TO.jsonl
///     fx/
///       USD-CAD.jsonl
/// ```
pub struct JsonlMarketDataSource {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlMarketDataSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: data_dir.as_ref().join("market"),
            write_lock: Mutex::new(()),
        }
    }

    fn history_file(&self, ticker: &str) -> PathBuf {
        self.base_path
            .join("history")
            .join(format!("{}.jsonl", sanitize_code(ticker)))
    }

    fn fx_file(&self, base: &str, quote: &str) -> PathBuf {
        let pair = format!("{}-{}", sanitize_code(base), sanitize_code(quote));
        self.base_path.join("fx").join(format!("{pair}.jsonl"))
    }

    /// Merge bars into the ticker's file. A bar replaces any existing bar for
    /// the same date; the file is kept in chronological order.
    pub async fn put_bars(&self, ticker: &str, bars: &[HistoryBar]) -> Result<()> {
        if bars.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let path = self.history_file(ticker);

        let mut by_date: BTreeMap<NaiveDate, HistoryBar> = read_jsonl::<HistoryBar>(&path)
            .await?
            .into_iter()
            .map(|bar| (bar.date, bar))
            .collect();
        for bar in bars {
            by_date.insert(bar.date, bar.clone());
        }

        let merged: Vec<HistoryBar> = by_date.into_values().collect();
        write_jsonl(&path, &merged).await?;
        info!(ticker, bars = bars.len(), "Stored price history");
        Ok(())
    }

    pub async fn put_fx(&self, observations: &[FxObservation]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut by_pair: BTreeMap<(String, String), Vec<&FxObservation>> = BTreeMap::new();
        for obs in observations {
            by_pair
                .entry((obs.base.to_uppercase(), obs.quote.to_uppercase()))
                .or_default()
                .push(obs);
        }

        for ((base, quote), new_obs) in by_pair {
            let path = self.fx_file(&base, &quote);
            let mut by_date: BTreeMap<NaiveDate, FxObservation> =
                read_jsonl::<FxObservation>(&path)
                    .await?
                    .into_iter()
                    .map(|o| (o.date, o))
                    .collect();
            for obs in new_obs {
                let mut obs = obs.clone();
                obs.base = base.clone();
                obs.quote = quote.clone();
                by_date.insert(obs.date, obs);
            }
            let merged: Vec<FxObservation> = by_date.into_values().collect();
            write_jsonl(&path, &merged).await?;
            info!(base = %base, quote = %quote, "Stored FX history");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MarketDataSource for JsonlMarketDataSource {
    async fn fetch_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryBar>> {
        let bars: Vec<HistoryBar> = read_jsonl(&self.history_file(ticker)).await?;
        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect())
    }

    async fn fetch_fx_history(
        &self,
        base: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FxObservation>> {
        let rates: Vec<FxObservation> = read_jsonl(&self.fx_file(base, quote)).await?;
        Ok(rates
            .into_iter()
            .filter(|o| o.date >= start && o.date <= end)
            .collect())
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

fn sanitize_code(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_uppercase()
}
