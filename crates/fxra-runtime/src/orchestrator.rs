use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fxra_agents::news::NOT_ENOUGH_NEWS;
use fxra_agents::parser::truncate;
use fxra_agents::{
    LlmRouter, NewsAnalysis, NewsAnalyst, SynthesisInput, Synthesizer, TechnicalAnalysis,
    TechnicalAnalyst, Verifier,
};
use fxra_models::{
    FxraConfig, LlmTask, Rationale, RationaleKind, Recommendation, Run, RunStatus, Timeframe,
    VerificationReport, VerifierConfig, VerifierMode,
};
use fxra_store::{NewsCache, Store, StoreError};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::features::{FeatureSnapshot, IndicatorEngine};
use crate::jobs::{BuildFeaturesJob, FetchMarketDataJob, FetchNewsJob, PersistRecommendationJob};
use crate::ports::{MarketDataProvider, NewsProvider};
use crate::retry::RetryPolicy;

const SUMMARY_MAX_CHARS: usize = 200;
const DEFAULT_NEWS_TIMEOUT: Duration = Duration::from_secs(30);

/// Milliseconds spent per pipeline stage, in execution order.
///
/// The synthesis rationale stores the stages up to verification. Persist
/// writes that rationale, so its own latency only reaches the run log.
#[derive(Debug, Default)]
struct StageTimings {
    stages: Vec<(&'static str, u64)>,
}

impl StageTimings {
    fn record(&mut self, run_id: Uuid, stage: &'static str, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(%run_id, stage, elapsed_ms, "Stage complete");
        self.stages.push((stage, elapsed_ms));
    }

    fn to_json(&self) -> Value {
        let map: BTreeMap<&str, u64> = self.stages.iter().copied().collect();
        json!(map)
    }
}

/// Runs the analysis pipeline for one symbol and records the outcome.
///
/// Stages run strictly in order: market data, features, technical analysis,
/// news, synthesis, optional verification, persistence. The run row is
/// created PENDING up front and finished as SUCCESS or FAILED; no error
/// escapes `run_analysis`.
pub struct RuntimeOrchestrator {
    store: Arc<Mutex<Store>>,
    market_data: Arc<dyn MarketDataProvider>,
    news_provider: Arc<dyn NewsProvider>,
    engine: Arc<dyn IndicatorEngine>,
    news_cache: Arc<NewsCache>,
    technical: TechnicalAnalyst,
    news: NewsAnalyst,
    synthesizer: Synthesizer,
    verifier: Option<Verifier>,
    verifier_config: VerifierConfig,
    retry: RetryPolicy,
    window_candles: usize,
    min_candles: usize,
    news_timeout: Duration,
}

impl RuntimeOrchestrator {
    pub fn new(
        config: &FxraConfig,
        router: Arc<LlmRouter>,
        store: Arc<Mutex<Store>>,
        market_data: Arc<dyn MarketDataProvider>,
        news_provider: Arc<dyn NewsProvider>,
        engine: Arc<dyn IndicatorEngine>,
    ) -> Self {
        let runtime = &config.runtime;
        let news_cache = NewsCache::new(
            runtime.news_cache_capacity,
            Duration::from_secs(runtime.news_refresh_interval_seconds),
        );
        let verifier = config
            .verifier
            .enabled
            .then(|| Verifier::new(router.clone()));

        Self {
            store,
            market_data,
            news_provider,
            engine,
            news_cache: Arc::new(news_cache),
            technical: TechnicalAnalyst::new(router.clone()),
            news: NewsAnalyst::new(router.clone()),
            synthesizer: Synthesizer::new(router, config.decision.clone()),
            verifier,
            verifier_config: config.verifier.clone(),
            retry: RetryPolicy::from_config(runtime),
            window_candles: runtime.market_data_window_candles,
            min_candles: runtime.min_candles,
            news_timeout: Duration::try_from_secs_f64(runtime.news_timeout_seconds.max(1.0))
                .unwrap_or(DEFAULT_NEWS_TIMEOUT),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_news_timeout(mut self, timeout: Duration) -> Self {
        self.news_timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<Mutex<Store>> {
        self.store.clone()
    }

    pub fn news_cache(&self) -> Arc<NewsCache> {
        self.news_cache.clone()
    }

    pub fn news_timeout(&self) -> Duration {
        self.news_timeout
    }

    /// Run the full pipeline once. Returns the run id whether or not the run
    /// succeeded; the outcome is on the stored run.
    pub async fn run_analysis(&self, symbol: &str, timeframe: Timeframe) -> Uuid {
        let run = Run::start(symbol, timeframe);
        let run_id = run.id;
        if let Err(e) = self.with_store(|store| store.create_run(&run)) {
            tracing::error!(%run_id, error = %e, "Failed to create run");
        }

        tracing::info!(%run_id, symbol, timeframe = %timeframe, "Analysis run started");
        let started = Instant::now();

        let outcome = self.execute(run_id, symbol, timeframe).await;
        let total_ms = started.elapsed().as_millis() as u64;

        let finished = match &outcome {
            Ok(recommendation) => {
                tracing::info!(
                    %run_id,
                    symbol,
                    action = %recommendation.action,
                    confidence = recommendation.confidence,
                    total_ms,
                    "Analysis run succeeded"
                );
                self.with_store(|store| store.finish_run(run_id, RunStatus::Success, None))
            }
            Err(message) => {
                tracing::error!(%run_id, symbol, error = %message, total_ms, "Analysis run failed");
                self.with_store(|store| {
                    store.finish_run(run_id, RunStatus::Failed, Some(message.as_str()))
                })
            }
        };
        if let Err(e) = finished {
            tracing::error!(%run_id, error = %e, "Failed to finish run");
        }

        run_id
    }

    async fn execute(
        &self,
        run_id: Uuid,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Recommendation, String> {
        let mut timings = StageTimings::default();

        let stage = Instant::now();
        let candles = FetchMarketDataJob::new(self.market_data.clone(), self.retry, self.min_candles)
            .with_store(self.store.clone())
            .run(symbol, timeframe, self.window_candles)
            .await
            .into_result()?;
        timings.record(run_id, "fetch_market_data", stage);

        let stage = Instant::now();
        let snapshot = BuildFeaturesJob::new(self.engine.clone(), self.min_candles)
            .run(symbol, timeframe, candles)
            .into_result()?;
        timings.record(run_id, "build_features", stage);

        let stage = Instant::now();
        let technical = self
            .technical
            .analyze(&snapshot.to_markdown(), symbol, timeframe)
            .await;
        timings.record(run_id, "tech_analysis", stage);

        let stage = Instant::now();
        let digest = FetchNewsJob::new(self.news_provider.clone())
            .with_cache(self.news_cache.clone())
            .with_timeout(self.news_timeout)
            .run(symbol, timeframe)
            .await
            .into_result()?;
        timings.record(run_id, "fetch_news", stage);

        let stage = Instant::now();
        let news = self.news.analyze(digest).await;
        timings.record(run_id, "news_analysis", stage);

        let stage = Instant::now();
        let outcome = self
            .synthesizer
            .synthesize(SynthesisInput {
                symbol,
                timeframe,
                technical: &technical.result,
                indicators: &snapshot.indicators,
                news: Some(&news.digest),
            })
            .await;
        timings.record(run_id, "synthesis", stage);

        let mut recommendation = outcome.recommendation;
        let report = match &self.verifier {
            Some(verifier) => {
                let stage = Instant::now();
                let report = self
                    .verify(verifier, run_id, &technical, &news, &mut recommendation)
                    .await;
                timings.record(run_id, "verification", stage);
                Some(report)
            }
            None => None,
        };

        // Serialized before persist; see `StageTimings`.
        let mut debug = outcome.debug;
        if let Value::Object(map) = &mut debug {
            map.insert("stage_latency_ms".to_string(), timings.to_json());
        }

        let mut rationales = vec![
            technical_rationale(run_id, &technical, &snapshot),
            news_rationale(run_id, &news),
            Rationale::new(run_id, RationaleKind::Synthesis, synthesis_content(&recommendation))
                .with_llm(Some(&outcome.response))
                .with_raw_data(debug.to_string()),
        ];

        let stage = Instant::now();
        PersistRecommendationJob::new(self.store.clone())
            .run(run_id, &mut recommendation, &mut rationales, report.as_ref())
            .into_result()?;
        timings.record(run_id, "persist", stage);

        Ok(recommendation)
    }

    /// Verify the synthesis. In hard mode a failed report with a suggested
    /// fix triggers brief repairs, each followed by a fresh verification.
    async fn verify(
        &self,
        verifier: &Verifier,
        run_id: Uuid,
        technical: &TechnicalAnalysis,
        news: &NewsAnalysis,
        recommendation: &mut Recommendation,
    ) -> VerificationReport {
        let summary = inputs_summary(technical, news);
        let task = LlmTask::Synthesis.as_str();

        let (mut report, _) = verifier
            .verify(task, &summary, &synthesis_content(recommendation))
            .await;

        if self.verifier_config.mode != VerifierMode::Hard {
            return report;
        }

        let mut repairs = 0;
        while !report.passed
            && report.suggested_fix.is_some()
            && repairs < self.verifier_config.max_repairs
        {
            repairs += 1;
            let (brief, _) = self.synthesizer.repair_brief(recommendation, &report).await;
            let Some(brief) = brief else {
                tracing::warn!(%run_id, repairs, "Brief repair unusable, keeping original");
                break;
            };
            recommendation.brief = brief;

            let (next, _) = verifier
                .verify(task, &summary, &synthesis_content(recommendation))
                .await;
            tracing::info!(%run_id, repairs, passed = next.passed, "Brief repaired and re-verified");
            report = next;
        }
        report
    }

    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut Store) -> Result<T, StoreError>,
    ) -> Result<T, RuntimeError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| RuntimeError::Lock(e.to_string()))?;
        Ok(op(&mut store)?)
    }
}

fn technical_rationale(
    run_id: Uuid,
    technical: &TechnicalAnalysis,
    snapshot: &FeatureSnapshot,
) -> Rationale {
    let raw = serde_json::to_string(&snapshot.indicators).unwrap_or_default();
    Rationale::new(run_id, RationaleKind::Technical, technical.to_json())
        .with_llm(Some(&technical.response))
        .with_raw_data(raw)
}

fn news_rationale(run_id: Uuid, news: &NewsAnalysis) -> Rationale {
    let digest = &news.digest;
    let content = format!(
        "Quality: {}\nSummary: {}\nSentiment: {}",
        digest.quality.as_str(),
        digest.summary.as_deref().unwrap_or(NOT_ENOUGH_NEWS),
        digest.sentiment.map_or("NEU", |s| s.as_str()),
    );
    let raw = serde_json::to_string(digest).unwrap_or_default();
    Rationale::new(run_id, RationaleKind::News, content)
        .with_llm(news.response.as_ref())
        .with_raw_data(raw)
}

fn synthesis_content(recommendation: &Recommendation) -> String {
    format!(
        "Action: {}\nBrief: {}\nConfidence: {:.2}%",
        recommendation.action,
        recommendation.brief,
        recommendation.confidence * 100.0
    )
}

fn inputs_summary(technical: &TechnicalAnalysis, news: &NewsAnalysis) -> String {
    let news_summary = news.digest.summary.as_deref().unwrap_or(NOT_ENOUGH_NEWS);
    format!(
        "Technical: {}\nNews: {}",
        truncate(&technical.to_json(), SUMMARY_MAX_CHARS),
        truncate(news_summary, SUMMARY_MAX_CHARS),
    )
}
