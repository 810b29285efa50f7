use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Listing venue of a security. Determines the ticker suffix used when
/// querying market data and the default trade currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    #[default]
    Us,
    /// Toronto Stock Exchange (`.TO`)
    Tsx,
    /// TSX Venture Exchange (`.V`)
    TsxVenture,
    /// Cboe Canada, formerly NEO (`.NE`)
    Neo,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Us, Market::Tsx, Market::TsxVenture, Market::Neo];

    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Market::Us => None,
            Market::Tsx => Some(".TO"),
            Market::TsxVenture => Some(".V"),
            Market::Neo => Some(".NE"),
        }
    }

    pub fn default_currency(&self) -> &'static str {
        match self {
            Market::Us => "USD",
            Market::Tsx | Market::TsxVenture | Market::Neo => "CAD",
        }
    }

    /// Whether the listing is served by the US data provider.
    pub fn is_us(&self) -> bool {
        matches!(self, Market::Us)
    }

    /// Infer the market from an already-suffixed ticker (e.g. `RY.TO`).
    pub fn from_ticker(ticker: &str) -> Self {
        let upper = ticker.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|m| m.suffix().is_some_and(|s| upper.ends_with(s)))
            .unwrap_or(Market::Us)
    }

    /// Normalize a user-entered ticker: trimmed, uppercased, with this
    /// market's suffix applied exactly once.
    pub fn normalize_ticker(&self, raw: &str) -> String {
        let upper = raw.trim().to_uppercase();
        match self.suffix() {
            Some(suffix) if !upper.ends_with(suffix) => format!("{upper}{suffix}"),
            _ => upper,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "us",
            Market::Tsx => "tsx",
            Market::TsxVenture => "tsx_venture",
            Market::Neo => "neo",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" | "usa" | "nyse" | "nasdaq" => Ok(Market::Us),
            "tsx" | "to" | "tor" => Ok(Market::Tsx),
            "tsx_venture" | "tsxv" | "v" | "cdnx" => Ok(Market::TsxVenture),
            "neo" | "ne" => Ok(Market::Neo),
            other => Err(LedgerError::validation(format!(
                "unknown market '{other}' (use: us, tsx, tsxv, neo)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_applies_suffix_once() {
        assert_eq!(Market::Tsx.normalize_ticker(" ry "), "RY.TO");
        assert_eq!(Market::Tsx.normalize_ticker("RY.TO"), "RY.TO");
        assert_eq!(Market::Us.normalize_ticker("aapl"), "AAPL");
        assert_eq!(Market::TsxVenture.normalize_ticker("abc"), "ABC.V");
    }

    #[test]
    fn test_from_ticker_infers_suffix() {
        assert_eq!(Market::from_ticker("ry.to"), Market::Tsx);
        assert_eq!(Market::from_ticker("XYZ.NE"), Market::Neo);
        assert_eq!(Market::from_ticker("AAPL"), Market::Us);
    }

    #[test]
    fn test_parse_rejects_unknown_market() {
        assert_eq!("TSX".parse::<Market>().unwrap(), Market::Tsx);
        assert!(matches!(
            "lse".parse::<Market>(),
            Err(LedgerError::Validation(_))
        ));
    }
}
