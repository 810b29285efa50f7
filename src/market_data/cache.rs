use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{DatedClose, FxObservation, HistoryBar};
use crate::clock::{Clock, SystemClock};

/// Identifies one gateway operation and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    History {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    LastClose {
        ticker: String,
    },
    FxHistory {
        base: String,
        quote: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl CacheKey {
    pub fn ticker(&self) -> Option<&str> {
        match self {
            CacheKey::History { ticker, .. } | CacheKey::LastClose { ticker } => Some(ticker),
            CacheKey::FxHistory { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    History(Vec<HistoryBar>),
    LastClose(DatedClose),
    FxHistory(Vec<FxObservation>),
}

/// Memoization for gateway lookups: keyed by operation and parameters, each
/// entry living for its own TTL.
#[async_trait::async_trait]
pub trait MarketDataCache: Send + Sync {
    /// A live entry, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    async fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration);

    async fn invalidate(&self, key: &CacheKey);

    /// Drop every entry that concerns `ticker`.
    async fn invalidate_ticker(&self, ticker: &str);

    async fn clear(&self);
}

struct Entry {
    value: CachedValue,
    expires_at: DateTime<Utc>,
}

/// Process-local cache. Expiry is measured against the injected clock.
pub struct MemoryMarketDataCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryMarketDataCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }
}

impl Default for MemoryMarketDataCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait::async_trait]
impl MarketDataCache for MemoryMarketDataCache {
    async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entries = self.entries.lock().await;
        entries.insert(key, Entry { value, expires_at });
    }

    async fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    async fn invalidate_ticker(&self, ticker: &str) {
        let mut entries = self.entries.lock().await;
        entries.retain(|key, _| key.ticker() != Some(ticker));
    }

    async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }
}

/// Cache that never stores anything.
pub struct NullMarketDataCache;

#[async_trait::async_trait]
impl MarketDataCache for NullMarketDataCache {
    async fn get(&self, _key: &CacheKey) -> Option<CachedValue> {
        None
    }

    async fn put(&self, _key: CacheKey, _value: CachedValue, _ttl: Duration) {}

    async fn invalidate(&self, _key: &CacheKey) {}

    async fn invalidate_ticker(&self, _ticker: &str) {}

    async fn clear(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use rust_decimal::Decimal;

    fn last_close_key(ticker: &str) -> CacheKey {
        CacheKey::LastClose {
            ticker: ticker.to_string(),
        }
    }

    fn close() -> CachedValue {
        CachedValue::LastClose(DatedClose {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            close: Decimal::from(100),
        })
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = Arc::new(FixedClock::on_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        let cache = MemoryMarketDataCache::new(clock.clone());

        cache
            .put(last_close_key("AAPL"), close(), Duration::from_secs(30 * 60))
            .await;
        clock.advance(chrono::Duration::minutes(29));
        assert_eq!(cache.get(&last_close_key("AAPL")).await, Some(close()));

        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(cache.get(&last_close_key("AAPL")).await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn invalidation_by_key_and_ticker() {
        let cache = MemoryMarketDataCache::default();
        let ttl = Duration::from_secs(60);
        let history = CacheKey::History {
            ticker: "AAPL".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };

        cache.put(last_close_key("AAPL"), close(), ttl).await;
        cache.put(history.clone(), CachedValue::History(Vec::new()), ttl).await;
        cache.put(last_close_key("MSFT"), close(), ttl).await;

        cache.invalidate(&last_close_key("MSFT")).await;
        assert_eq!(cache.get(&last_close_key("MSFT")).await, None);

        cache.invalidate_ticker("AAPL").await;
        assert_eq!(cache.get(&history).await, None);
        assert_eq!(cache.len().await, 0);

        cache.put(last_close_key("MSFT"), close(), ttl).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
