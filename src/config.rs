use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::portfolio::GridFrequency;

/// Default reporting currency.
fn default_reporting_currency() -> String {
    "USD".to_string()
}

/// Valuation grid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Spacing of the daily grid positions and cash are reconstructed on.
    /// `business` skips Saturdays and Sundays; records dated on a weekend take
    /// effect on the following Monday.
    pub grid: GridFrequency,
}

fn default_lookback_days() -> u32 {
    7
}

/// Default TTL for cached price history (6 hours).
fn default_history_ttl() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

/// Default TTL for cached "last close" lookups (30 minutes).
fn default_last_close_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Market data lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// How many days back a close or FX rate may be forward-filled from.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// How long a fetched history range stays cached.
    #[serde(
        default = "default_history_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub history_ttl: Duration,

    /// How long a "last known close" answer stays cached.
    #[serde(
        default = "default_last_close_ttl",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub last_close_ttl: Duration,

    /// Per-request timeout for a market data source. A timed-out request is a
    /// data gap, not an error.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            history_ttl: default_history_ttl(),
            last_close_ttl: default_last_close_ttl(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Currency all cross-currency totals are expressed in (e.g., "USD")
    #[serde(default = "default_reporting_currency")]
    pub reporting_currency: String,

    #[serde(default)]
    pub valuation: ValuationConfig,

    #[serde(default)]
    pub market_data: MarketDataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            reporting_currency: default_reporting_currency(),
            valuation: ValuationConfig::default(),
            market_data: MarketDataConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }

    fn resolve(self, config_dir: &Path) -> ResolvedConfig {
        ResolvedConfig {
            data_dir: self.resolve_data_dir(config_dir),
            reporting_currency: self.reporting_currency.trim().to_uppercase(),
            valuation: self.valuation,
            market_data: self.market_data,
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub reporting_currency: String,
    pub valuation: ValuationConfig,
    pub market_data: MarketDataConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./paperfolio.toml` if it exists in current directory
/// 2. `~/.local/share/paperfolio/paperfolio.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("paperfolio.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("paperfolio").join("paperfolio.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        Ok(Config::load(&config_path)?.resolve(config_dir))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// A missing config file still pins the data directory to the file's
    /// intended parent directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Config::default().resolve(config_dir))
    }
}
