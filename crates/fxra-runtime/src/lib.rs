//! The analysis pipeline around the agents: capability traits for market data
//! and news, the indicator engine, pipeline jobs, the per-run orchestrator and
//! the periodic loop.

pub mod daemon;
pub mod error;
pub mod features;
pub mod file_providers;
pub mod jobs;
pub mod orchestrator;
pub mod ports;
pub mod retry;

pub use daemon::AnalysisLoop;
pub use error::RuntimeError;
pub use features::{BasicIndicatorEngine, FeatureSnapshot, IndicatorEngine};
pub use file_providers::{JsonFileMarketData, JsonFileNews, NoNews};
pub use jobs::{
    BuildFeaturesJob, FetchMarketDataJob, FetchNewsJob, JobResult, PersistRecommendationJob,
};
pub use orchestrator::RuntimeOrchestrator;
pub use ports::{CandleRange, MarketDataProvider, NewsProvider};
pub use retry::RetryPolicy;
