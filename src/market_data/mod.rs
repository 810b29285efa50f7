mod cache;
mod gateway;
mod jsonl_source;
mod memory_source;
mod models;
mod provider;
mod sources;

pub use cache::{CacheKey, CachedValue, MarketDataCache, MemoryMarketDataCache, NullMarketDataCache};
pub use gateway::MarketDataGateway;
pub use jsonl_source::JsonlMarketDataSource;
pub use memory_source::MemoryMarketDataSource;
pub use models::{DatedClose, DividendEvent, FxObservation, HistoryBar, Lookup, SplitEvent};
pub use provider::{MarketDataSource, NoopSource};
pub use sources::SourceRouter;
