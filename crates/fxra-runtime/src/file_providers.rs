use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxra_models::{Candle, NewsArticle, NewsDigest, NewsQuality, Timeframe};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::RuntimeError;
use crate::ports::{CandleRange, MarketDataProvider, NewsProvider};

const HIGH_RELEVANCE: f64 = 0.55;
const MAX_ARTICLES: usize = 10;

/// `{dir}/{SYMBOL}_{timeframe}.json`, e.g. `data/EURUSD_1h.json`.
fn data_file(dir: &Path, symbol: &str, timeframe: Timeframe) -> PathBuf {
    dir.join(format!("{}_{}.json", symbol.to_uppercase(), timeframe.as_str()))
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    #[serde(default)]
    volume: Option<Decimal>,
}

/// Candles stored as a JSON array of `{timestamp, open, high, low, close, volume?}`.
pub struct JsonFileMarketData {
    dir: PathBuf,
}

impl JsonFileMarketData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MarketDataProvider for JsonFileMarketData {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        range: CandleRange,
    ) -> Result<Vec<Candle>, RuntimeError> {
        let path = data_file(&self.dir, symbol, timeframe);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            RuntimeError::MarketData(format!("Failed to read {}: {e}", path.display()))
        })?;
        let rows: Vec<CandleRow> = serde_json::from_str(&raw)?;

        let mut candles: Vec<Candle> = rows
            .into_iter()
            .filter(|row| range.contains(&row.timestamp))
            .map(|row| Candle {
                symbol: symbol.to_uppercase(),
                timeframe,
                timestamp: row.timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        let skip = candles.len().saturating_sub(count);
        Ok(candles.split_off(skip))
    }
}

#[derive(Debug, Deserialize)]
struct NewsFile {
    #[serde(default)]
    articles: Vec<NewsArticle>,
    #[serde(default = "default_window_hours")]
    window_hours: u32,
}

fn default_window_hours() -> u32 {
    24
}

/// Grade a set of articles: five or more highly relevant ones is HIGH, two
/// relevant or two in total is MEDIUM, anything less LOW.
pub fn grade_articles(articles: &[NewsArticle]) -> (NewsQuality, String) {
    let high = articles
        .iter()
        .filter(|a| a.relevance_score >= HIGH_RELEVANCE)
        .count();
    if high >= 5 {
        (
            NewsQuality::High,
            format!("Found {high} highly relevant articles (score >= {HIGH_RELEVANCE})"),
        )
    } else if high >= 2 || articles.len() >= 2 {
        (
            NewsQuality::Medium,
            format!(
                "Found {high} highly relevant articles, {} total after filtering",
                articles.len()
            ),
        )
    } else {
        (
            NewsQuality::Low,
            "Not enough relevant articles after filtering".to_string(),
        )
    }
}

/// Headlines stored as `{"articles": [...], "window_hours": 24}`. A missing
/// or unreadable file yields a LOW digest.
pub struct JsonFileNews {
    dir: PathBuf,
}

impl JsonFileNews {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<NewsDigest, RuntimeError> {
        let path = data_file(&self.dir, symbol, timeframe);
        let raw = tokio::fs::read_to_string(&path).await?;
        let file: NewsFile = serde_json::from_str(&raw)?;

        let mut articles = file.articles;
        articles.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        articles.truncate(MAX_ARTICLES);
        let (quality, quality_reason) = grade_articles(&articles);

        let mut digest = NewsDigest::low_quality(symbol, timeframe, quality_reason);
        digest.window_hours = file.window_hours;
        digest.quality = quality;
        digest.articles = articles;
        digest.provider_used = Some(self.name().to_string());
        Ok(digest)
    }
}

#[async_trait]
impl NewsProvider for JsonFileNews {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn get_news_digest(&self, symbol: &str, timeframe: Timeframe) -> NewsDigest {
        match self.load(symbol, timeframe).await {
            Ok(digest) => digest,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "News file unavailable");
                NewsDigest::low_quality(symbol, timeframe, format!("Provider error: {e}"))
            }
        }
    }
}

/// Always reports LOW quality news, so analysis relies on technicals only.
pub struct NoNews;

#[async_trait]
impl NewsProvider for NoNews {
    fn name(&self) -> &str {
        "none"
    }

    async fn get_news_digest(&self, symbol: &str, timeframe: Timeframe) -> NewsDigest {
        NewsDigest::low_quality(symbol, timeframe, "News provider disabled")
    }
}
