use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use fxra_models::{
    Candle, NewsDigest, NewsQuality, Rationale, Recommendation, Timeframe, VerificationReport,
};
use fxra_store::{NewsCache, Store, StoreError};
use uuid::Uuid;

use crate::features::{validate_candles, FeatureSnapshot, IndicatorEngine, ValidationStatus};
use crate::ports::{CandleRange, MarketDataProvider, NewsProvider};
use crate::retry::RetryPolicy;

/// Outcome of a pipeline stage. Stages report failure as a value so the
/// orchestrator can record it on the run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult<T> {
    pub ok: bool,
    pub value: Option<T>,
    pub error: Option<String>,
}

impl<T> JobResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(error.into()),
        }
    }

    /// `Ok` with the value, or `Err` with the error message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.ok, self.value) {
            (true, Some(value)) => Ok(value),
            (_, _) => Err(self
                .error
                .unwrap_or_else(|| "job returned no value".to_string())),
        }
    }
}

/// Fetch a candle window with retries and cache it in the store.
pub struct FetchMarketDataJob {
    provider: Arc<dyn MarketDataProvider>,
    store: Option<Arc<Mutex<Store>>>,
    retry: RetryPolicy,
    min_candles: usize,
}

impl FetchMarketDataJob {
    pub fn new(provider: Arc<dyn MarketDataProvider>, retry: RetryPolicy, min_candles: usize) -> Self {
        Self {
            provider,
            store: None,
            retry,
            min_candles,
        }
    }

    /// Also upsert fetched candles into `store`.
    pub fn with_store(mut self, store: Arc<Mutex<Store>>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(&self, symbol: &str, timeframe: Timeframe, count: usize) -> JobResult<Vec<Candle>> {
        let provider = self.provider.as_ref();
        let fetched = self
            .retry
            .run("fetch_candles", || {
                provider.fetch_candles(symbol, timeframe, count, CandleRange::default())
            })
            .await;

        let candles = match fetched {
            Ok(candles) => candles,
            Err(e) => return JobResult::failure(format!("Failed to fetch market data: {e}")),
        };
        if candles.len() < self.min_candles {
            return JobResult::failure(format!(
                "Insufficient candles: got {}, need at least {}",
                candles.len(),
                self.min_candles
            ));
        }

        if let Some(store) = &self.store {
            match store.lock() {
                Ok(mut store) => match store.upsert_candles(&candles) {
                    Ok(written) => tracing::debug!(symbol, written, "Candles cached"),
                    Err(e) => tracing::warn!(symbol, error = %e, "Failed to cache candles"),
                },
                Err(e) => tracing::error!(error = %e, "Store lock poisoned"),
            }
        }

        tracing::debug!(
            symbol,
            timeframe = %timeframe,
            provider = provider.name(),
            count = candles.len(),
            "Market data fetched"
        );
        JobResult::success(candles)
    }
}

/// Validate candles and compute the indicator snapshot.
pub struct BuildFeaturesJob {
    engine: Arc<dyn IndicatorEngine>,
    min_candles: usize,
}

impl BuildFeaturesJob {
    pub fn new(engine: Arc<dyn IndicatorEngine>, min_candles: usize) -> Self {
        Self {
            engine,
            min_candles,
        }
    }

    pub fn run(&self, symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> JobResult<FeatureSnapshot> {
        let validation = validate_candles(&candles, self.min_candles);
        if validation.status == ValidationStatus::Invalid {
            return JobResult::failure(format!(
                "Invalid candle data: {}",
                validation.reasons.join("; ")
            ));
        }
        if validation.status == ValidationStatus::Degraded {
            tracing::warn!(symbol, reasons = ?validation.reasons, "Candle data degraded");
        }

        let mut indicators = match self.engine.compute(&candles) {
            Ok(bag) => bag,
            Err(e) => return JobResult::failure(format!("Failed to build features: {e}")),
        };
        indicators.insert("candle_count_used", validation.candle_count);
        indicators.insert("validation_status", validation.status.as_str());

        tracing::debug!(
            symbol,
            engine = self.engine.name(),
            indicators = indicators.len(),
            "Features built"
        );
        JobResult::success(FeatureSnapshot {
            symbol: symbol.to_string(),
            timeframe,
            timestamp: Utc::now(),
            candles,
            indicators,
            validation_status: validation.status,
            validation_reasons: validation.reasons,
        })
    }
}

/// Fetch the news digest, reusing cached digests. Never fails: a provider
/// that does not answer in time yields a LOW quality digest.
pub struct FetchNewsJob {
    provider: Arc<dyn NewsProvider>,
    cache: Option<Arc<NewsCache>>,
    timeout: Duration,
}

impl FetchNewsJob {
    pub fn new(provider: Arc<dyn NewsProvider>) -> Self {
        Self {
            provider,
            cache: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_cache(mut self, cache: Arc<NewsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self, symbol: &str, timeframe: Timeframe) -> JobResult<NewsDigest> {
        if let Some(cache) = &self.cache {
            if let Some(digest) = cache.get(symbol, timeframe).await {
                tracing::debug!(symbol, quality = digest.quality.as_str(), "News digest cache hit");
                return JobResult::success(digest);
            }
        }

        let fetched =
            tokio::time::timeout(self.timeout, self.provider.get_news_digest(symbol, timeframe)).await;
        let digest = match fetched {
            Ok(digest) => {
                // LOW digests are refetched next run rather than pinned for the TTL.
                match &self.cache {
                    Some(cache) if digest.quality != NewsQuality::Low => {
                        cache.insert(digest.clone()).await;
                    }
                    _ => {}
                }
                digest
            }
            Err(_) => {
                tracing::warn!(
                    symbol,
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "News provider timed out"
                );
                NewsDigest::low_quality(
                    symbol,
                    timeframe,
                    format!("Provider error: timed out after {:.1}s", self.timeout.as_secs_f64()),
                )
            }
        };
        JobResult::success(digest)
    }
}

/// Write the recommendation, its rationales and the verification report.
pub struct PersistRecommendationJob {
    store: Arc<Mutex<Store>>,
}

impl PersistRecommendationJob {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self { store }
    }

    pub fn run(
        &self,
        run_id: Uuid,
        recommendation: &mut Recommendation,
        rationales: &mut [Rationale],
        report: Option<&VerificationReport>,
    ) -> JobResult<()> {
        recommendation.run_id = Some(run_id);
        for rationale in rationales.iter_mut() {
            rationale.run_id = run_id;
        }

        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => return JobResult::failure(format!("Failed to persist recommendation: {e}")),
        };
        let saved = persist(&mut store, run_id, recommendation, rationales, report);

        match saved {
            Ok(()) => {
                tracing::debug!(
                    %run_id,
                    recommendation_id = %recommendation.id,
                    rationales = rationales.len(),
                    "Recommendation persisted"
                );
                JobResult::success(())
            }
            Err(e) => JobResult::failure(format!("Failed to persist recommendation: {e}")),
        }
    }
}

fn persist(
    store: &mut Store,
    run_id: Uuid,
    recommendation: &Recommendation,
    rationales: &[Rationale],
    report: Option<&VerificationReport>,
) -> Result<(), StoreError> {
    store.save_recommendation(recommendation)?;
    store.save_rationales(rationales)?;
    if let Some(report) = report {
        store.save_verification_report(run_id, report)?;
    }
    Ok(())
}
