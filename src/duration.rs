//! Human-readable durations ("6h", "30m", "15s") used for cache TTLs and
//! network timeouts in the config file.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

const UNITS: [(char, u64); 4] = [('d', 24 * 60 * 60), ('h', 60 * 60), ('m', 60), ('s', 1)];

/// Parse a duration string such as `"14d"`, `"6h"`, `"30m"` or `"15s"`.
///
/// Case-insensitive; surrounding whitespace is ignored.
///
/// ```
/// use paperfolio::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(6 * 60 * 60));
/// assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let unit = s
        .chars()
        .last()
        .context("Duration must not be empty")?;
    let multiplier = UNITS
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, secs)| *secs)
        .context("Duration must end with d, h, m, or s")?;

    let num: u64 = s[..s.len() - 1]
        .parse()
        .with_context(|| format!("Invalid number in duration: {s}"))?;
    let secs = num
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Format a duration using the largest unit that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    for (unit, size) in UNITS {
        if secs >= size && secs % size == 0 {
            return format!("{}{unit}", secs / size);
        }
    }
    format!("{secs}s")
}

/// Serde deserializer for duration strings.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Serializer counterpart of [`deserialize_duration`].
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}
