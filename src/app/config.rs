use std::path::Path;

use crate::config::ResolvedConfig;
use crate::duration::format_duration;

pub fn config_output(config_path: &Path, config: &ResolvedConfig) -> serde_json::Value {
    serde_json::json!({
        "config_file": config_path.display().to_string(),
        "data_directory": config.data_dir.display().to_string(),
        "reporting_currency": config.reporting_currency,
        "valuation": {
            "grid": config.valuation.grid,
        },
        "market_data": {
            "lookback_days": config.market_data.lookback_days,
            "history_ttl": format_duration(config.market_data.history_ttl),
            "last_close_ttl": format_duration(config.market_data.last_close_ttl),
            "request_timeout": format_duration(config.market_data.request_timeout),
        }
    })
}
