//! Command implementations behind the CLI. Each returns the JSON document
//! the binary prints.

mod config;
mod market;
mod report;
mod settings;
mod transactions;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ResolvedConfig;
use crate::ledger::JsonlLedger;
use crate::market_data::{JsonlMarketDataSource, MarketDataGateway, SourceRouter};
use crate::portfolio::PortfolioService;
use crate::settings::SettingsStore;

pub use config::config_output;
pub use market::{add_bar, add_fx, BarInput};
pub use report::report;
pub use settings::{set_benchmarks, set_cash, set_dividend_mode, set_fee, show_settings};
pub use transactions::{add_transaction, delete_transaction, list_transactions};

/// File-backed ledger, settings and market data under one data directory.
pub struct App {
    pub config: ResolvedConfig,
    pub service: PortfolioService,
    pub market_store: Arc<JsonlMarketDataSource>,
    pub market_data: Arc<MarketDataGateway>,
}

impl App {
    pub async fn open(config: ResolvedConfig) -> Result<Self> {
        let ledger = JsonlLedger::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open ledger in {}", config.data_dir.display()))?;
        let settings = Arc::new(SettingsStore::new(&config.data_dir));

        // Every market is served from the local store; a remote provider
        // would be added here with `with_route`.
        let market_store = Arc::new(JsonlMarketDataSource::new(&config.data_dir));
        let router = SourceRouter::new(market_store.clone());
        let market_data = Arc::new(
            MarketDataGateway::new(Arc::new(router)).with_config(&config.market_data),
        );

        let service = PortfolioService::new(Arc::new(ledger), settings, market_data.clone())
            .with_reporting_currency(&config.reporting_currency)
            .with_grid_frequency(config.valuation.grid);

        Ok(Self {
            config,
            service,
            market_store,
            market_data,
        })
    }
}
