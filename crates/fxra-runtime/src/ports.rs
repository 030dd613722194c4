use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxra_models::{Candle, NewsDigest, Timeframe};

use crate::error::RuntimeError;

/// Optional time bounds for a candle fetch. Both ends are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandleRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl CandleRange {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *ts >= from) && self.to.map_or(true, |to| *ts <= to)
    }
}

/// Source of OHLCV candles. Transport failures are returned as errors and
/// retried by the fetch job.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The latest `count` candles within `range`, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        range: CandleRange,
    ) -> Result<Vec<Candle>, RuntimeError>;
}

/// Source of news digests. Implementations never fail: problems are reported
/// as a LOW quality digest carrying the reason.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_news_digest(&self, symbol: &str, timeframe: Timeframe) -> NewsDigest;
}
