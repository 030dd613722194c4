use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::LlmTask;
use crate::timeframe::Timeframe;

/// Top-level configuration. Loaded once at startup and passed down by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FxraConfig {
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl FxraConfig {
    /// Checks that serde can't express.
    pub fn validate(&self) -> Result<(), String> {
        if self.runtime.market_data_window_candles < 50 {
            return Err(format!(
                "runtime.market_data_window_candles must be >= 50, got {}",
                self.runtime.market_data_window_candles
            ));
        }
        if self.runtime.min_candles > self.runtime.market_data_window_candles {
            return Err(format!(
                "runtime.min_candles ({}) exceeds market_data_window_candles ({})",
                self.runtime.min_candles, self.runtime.market_data_window_candles
            ));
        }
        if self.runtime.symbols.is_empty() {
            return Err("runtime.symbols must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.decision.max_confidence_when_news_low) {
            return Err(format!(
                "decision.max_confidence_when_news_low must be within [0, 1], got {}",
                self.decision.max_confidence_when_news_low
            ));
        }
        Ok(())
    }
}

/// Thresholds for the deterministic decision policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionConfig {
    /// Minimum bull/bear score gap required for a directional action.
    #[serde(default = "default_min_trade_edge")]
    pub min_trade_edge: f64,
    /// No-trade score above which the policy always waits.
    #[serde(default = "default_max_no_trade_score")]
    pub max_no_trade_score: f64,
    /// Confidence ceiling applied when news quality is LOW.
    #[serde(default = "default_max_confidence_when_news_low")]
    pub max_confidence_when_news_low: f64,
    #[serde(default = "default_crossover_max_age_bars")]
    pub crossover_max_age_bars: i64,
    #[serde(default = "default_atr_pct_low_threshold")]
    pub atr_pct_low_threshold: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_trade_edge: default_min_trade_edge(),
            max_no_trade_score: default_max_no_trade_score(),
            max_confidence_when_news_low: default_max_confidence_when_news_low(),
            crossover_max_age_bars: default_crossover_max_age_bars(),
            atr_pct_low_threshold: default_atr_pct_low_threshold(),
        }
    }
}

/// One (provider, model) entry in a task's routing chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmRouteStep {
    pub provider: String,
    pub model: String,
}

impl LlmRouteStep {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastResortConfig {
    #[serde(default = "default_last_resort_provider")]
    pub provider: String,
    #[serde(default = "default_last_resort_model")]
    pub model: String,
}

impl Default for LastResortConfig {
    fn default() -> Self {
        Self {
            provider: default_last_resort_provider(),
            model: default_last_resort_model(),
        }
    }
}

/// Per-task overrides of the global LLM defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskOverrides {
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Router configuration: modes, defaults, routing table and timeout overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// `sequential` or `strict`.
    #[serde(default = "default_router_mode")]
    pub router_mode: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_health_ttl")]
    pub health_ttl_seconds: u64,
    #[serde(default)]
    pub last_resort: LastResortConfig,
    /// Task name to ordered steps; the first step is the primary.
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, Vec<LlmRouteStep>>,
    /// Keyed by task name (`tech_analysis`, `synthesis`, ...).
    #[serde(default)]
    pub task_overrides: BTreeMap<String, TaskOverrides>,
    /// `<provider>_timeout_seconds` or `<provider>_<prefix>_timeout_seconds` to seconds.
    #[serde(default)]
    pub provider_timeouts: BTreeMap<String, f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            router_mode: default_router_mode(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_max_retries(),
            health_ttl_seconds: default_health_ttl(),
            last_resort: LastResortConfig::default(),
            routes: default_routes(),
            task_overrides: BTreeMap::new(),
            provider_timeouts: BTreeMap::new(),
        }
    }
}

impl LlmConfig {
    /// Routing table with every known task present. Tasks missing from
    /// `routes` get the single local default step.
    pub fn routing_table(&self) -> BTreeMap<String, Vec<LlmRouteStep>> {
        let mut table = self.routes.clone();
        for task in LlmTask::ALL {
            table
                .entry(task.as_str().to_string())
                .or_insert_with(default_route);
        }
        table
    }
}

/// Endpoints and switches for the concrete LLM providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default = "default_ollama_local_url")]
    pub ollama_local_url: String,
    /// Registered as `ollama_server` when set.
    #[serde(default)]
    pub ollama_server_url: Option<String>,
    #[serde(default = "default_deepseek_base_url")]
    pub deepseek_base_url: String,
    /// Name of the environment variable holding the DeepSeek API key.
    #[serde(default = "default_deepseek_api_key_env")]
    pub deepseek_api_key_env: String,
    #[serde(default)]
    pub claude_cli_enabled: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama_local_url: default_ollama_local_url(),
            ollama_server_url: None,
            deepseek_base_url: default_deepseek_base_url(),
            deepseek_api_key_env: default_deepseek_api_key_env(),
            claude_cli_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerifierMode {
    /// Record the report only.
    #[default]
    Soft,
    /// Attempt brief repairs when verification fails.
    Hard,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: VerifierMode,
    #[serde(default = "default_max_repairs")]
    pub max_repairs: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: VerifierMode::Soft,
            max_repairs: default_max_repairs(),
        }
    }
}

/// Pipeline and loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
    /// Candles requested per analysis.
    #[serde(default = "default_window_candles")]
    pub market_data_window_candles: usize,
    /// Fewer candles than this fails the run.
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    #[serde(default = "default_loop_interval")]
    pub loop_interval_seconds: u64,
    /// Loop stops after this many iterations when set.
    #[serde(default)]
    pub max_iterations: Option<u64>,
    /// TTL of cached news digests.
    #[serde(default = "default_news_refresh_interval")]
    pub news_refresh_interval_seconds: u64,
    #[serde(default = "default_news_cache_capacity")]
    pub news_cache_capacity: u64,
    /// A news fetch slower than this yields a LOW digest.
    #[serde(default = "default_news_timeout")]
    pub news_timeout_seconds: f64,
    #[serde(default = "default_retry_attempts")]
    pub fetch_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub fetch_retry_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub fetch_retry_max_backoff_ms: u64,
    /// Directory with `{SYMBOL}_{timeframe}.json` candle files.
    #[serde(default = "default_market_data_dir")]
    pub market_data_dir: String,
    /// Directory with `{SYMBOL}_{timeframe}.json` news digests. No news when unset.
    #[serde(default)]
    pub news_dir: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframe: default_timeframe(),
            market_data_window_candles: default_window_candles(),
            min_candles: default_min_candles(),
            loop_interval_seconds: default_loop_interval(),
            max_iterations: None,
            news_refresh_interval_seconds: default_news_refresh_interval(),
            news_cache_capacity: default_news_cache_capacity(),
            news_timeout_seconds: default_news_timeout(),
            fetch_retry_attempts: default_retry_attempts(),
            fetch_retry_backoff_ms: default_retry_backoff_ms(),
            fetch_retry_max_backoff_ms: default_retry_max_backoff_ms(),
            market_data_dir: default_market_data_dir(),
            news_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

fn default_min_trade_edge() -> f64 {
    15.0
}
fn default_max_no_trade_score() -> f64 {
    40.0
}
fn default_max_confidence_when_news_low() -> f64 {
    0.65
}
fn default_crossover_max_age_bars() -> i64 {
    10
}
fn default_atr_pct_low_threshold() -> f64 {
    0.08
}
fn default_last_resort_provider() -> String {
    "ollama_local".to_string()
}
fn default_last_resort_model() -> String {
    "llama3:latest".to_string()
}
fn default_route() -> Vec<LlmRouteStep> {
    vec![LlmRouteStep::new("ollama_local", "llama3:latest")]
}
fn default_routes() -> BTreeMap<String, Vec<LlmRouteStep>> {
    LlmTask::ALL
        .into_iter()
        .map(|task| (task.as_str().to_string(), default_route()))
        .collect()
}
fn default_router_mode() -> String {
    "sequential".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_llm_timeout() -> f64 {
    60.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_health_ttl() -> u64 {
    30
}
fn default_ollama_local_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_deepseek_base_url() -> String {
    "https://api.deepseek.com".to_string()
}
fn default_deepseek_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}
fn default_max_repairs() -> u32 {
    1
}
fn default_symbols() -> Vec<String> {
    vec![
        "EURUSD".to_string(),
        "GBPUSD".to_string(),
        "USDJPY".to_string(),
    ]
}
fn default_timeframe() -> Timeframe {
    Timeframe::M1
}
fn default_window_candles() -> usize {
    300
}
fn default_min_candles() -> usize {
    200
}
fn default_loop_interval() -> u64 {
    60
}
fn default_news_refresh_interval() -> u64 {
    300
}
fn default_news_timeout() -> f64 {
    30.0
}
fn default_news_cache_capacity() -> u64 {
    256
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    2_000
}
fn default_retry_max_backoff_ms() -> u64 {
    10_000
}
fn default_market_data_dir() -> String {
    "data/candles".to_string()
}
fn default_sqlite_path() -> String {
    "data/fxra.db".to_string()
}
