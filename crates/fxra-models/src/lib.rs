pub mod candle;
pub mod config;
pub mod llm;
pub mod news;
pub mod recommendation;
pub mod run;
pub mod storage_schema;
pub mod technical_analysis;
pub mod timeframe;
pub mod verification;

pub use candle::Candle;
pub use config::{
    DecisionConfig, FxraConfig, LastResortConfig, LlmConfig, LlmRouteStep, ProvidersConfig,
    RuntimeConfig, StorageConfig, TaskOverrides, VerifierConfig, VerifierMode,
};
pub use llm::{HealthCheck, LlmRequest, LlmResponse, LlmTask};
pub use news::{NewsArticle, NewsDigest, NewsQuality, Sentiment};
pub use recommendation::{Action, Recommendation};
pub use run::{Rationale, RationaleKind, Run, RunStatus};
pub use technical_analysis::{Bias, TechnicalAnalysisResult};
pub use timeframe::Timeframe;
pub use verification::{Severity, VerificationIssue, VerificationReport};
