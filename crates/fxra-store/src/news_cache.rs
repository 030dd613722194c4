use std::time::Duration;

use fxra_models::{NewsDigest, Timeframe};
use moka::future::Cache;

/// In-memory news digest cache backed by moka.
///
/// Digests are keyed by `{symbol}:{timeframe}` and evicted after the news
/// refresh interval, so a loop iterating faster than news changes reuses them.
pub struct NewsCache {
    inner: Cache<String, NewsDigest>,
}

impl NewsCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    fn key(symbol: &str, timeframe: Timeframe) -> String {
        format!("{}:{}", symbol.to_uppercase(), timeframe.as_str())
    }

    pub async fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<NewsDigest> {
        self.inner.get(&Self::key(symbol, timeframe)).await
    }

    pub async fn insert(&self, digest: NewsDigest) {
        let key = Self::key(&digest.symbol, digest.timeframe);
        self.inner.insert(key, digest).await;
    }

    pub async fn invalidate(&self, symbol: &str, timeframe: Timeframe) {
        self.inner.invalidate(&Self::key(symbol, timeframe)).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
