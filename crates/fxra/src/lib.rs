//! fxra - forex research assistant
//!
//! Analyses currency pairs with a deterministic decision policy and LLM
//! agents that explain it, storing every run, recommendation and rationale
//! in SQLite.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use fxra::models::{FxraConfig, Timeframe};
//! use fxra::runtime::RuntimeOrchestrator;
//!
//! # async fn run(config: FxraConfig) -> anyhow::Result<()> {
//! let orchestrator = fxra::build_orchestrator(&config)?;
//! let run_id = orchestrator.run_analysis("EURUSD", Timeframe::H1).await;
//! # let _ = run_id;
//! # Ok(())
//! # }
//! ```

pub use fxra_agents as agents;
pub use fxra_decision as decision;
pub use fxra_models as models;
pub use fxra_runtime as runtime;
pub use fxra_store as store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use fxra_agents::claude_cli::CLAUDE_CLI_PROVIDER;
use fxra_agents::deepseek::DEEPSEEK_PROVIDER;
use fxra_agents::{ClaudeCliProvider, DeepSeekProvider, LlmProvider, LlmRouter, OllamaProvider};
use fxra_models::FxraConfig;
use fxra_runtime::{
    BasicIndicatorEngine, JsonFileMarketData, JsonFileNews, NewsProvider, NoNews,
    RuntimeOrchestrator,
};
use fxra_store::Store;

const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";

/// Read, parse and validate a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FxraConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: FxraConfig = toml::from_str(&raw).context("Failed to parse config")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {e}"))?;
    Ok(config)
}

/// Register the configured LLM providers and build the router.
pub fn build_router(config: &FxraConfig) -> Result<LlmRouter> {
    let providers_config = &config.providers;
    let default_model = config.llm.last_resort.model.clone();
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

    let local = OllamaProvider::new(
        "ollama_local",
        &providers_config.ollama_local_url,
        default_model.clone(),
    )
    .context("Failed to build ollama_local provider")?;
    providers.insert("ollama_local".to_string(), Arc::new(local));

    if let Some(url) = &providers_config.ollama_server_url {
        let server = OllamaProvider::new("ollama_server", url, default_model)
            .context("Failed to build ollama_server provider")?;
        providers.insert("ollama_server".to_string(), Arc::new(server));
    }

    let deepseek = DeepSeekProvider::from_env(
        &providers_config.deepseek_base_url,
        &providers_config.deepseek_api_key_env,
        DEEPSEEK_DEFAULT_MODEL,
    )
    .context("Failed to build deepseek provider")?;
    if !deepseek.has_api_key() {
        tracing::debug!(
            env = %providers_config.deepseek_api_key_env,
            "DeepSeek API key not set, provider will report unhealthy"
        );
    }
    providers.insert(DEEPSEEK_PROVIDER.to_string(), Arc::new(deepseek));

    if providers_config.claude_cli_enabled {
        providers.insert(
            CLAUDE_CLI_PROVIDER.to_string(),
            Arc::new(ClaudeCliProvider::default()),
        );
    }

    let router = LlmRouter::new(&config.llm, providers);
    tracing::info!(providers = ?router.provider_names(), mode = router.mode(), "LLM router ready");
    Ok(router)
}

/// Build an orchestrator from configuration: SQLite store, router, file
/// backed market data and news, and the basic indicator engine.
pub fn build_orchestrator(config: &FxraConfig) -> Result<RuntimeOrchestrator> {
    let sqlite_path = Path::new(&config.storage.sqlite_path);
    if let Some(parent) = sqlite_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let store = Store::open(&config.storage.sqlite_path)
        .with_context(|| format!("Failed to open store: {}", config.storage.sqlite_path))?;

    let router = Arc::new(build_router(config)?);
    let market_data = Arc::new(JsonFileMarketData::new(&config.runtime.market_data_dir));
    let news: Arc<dyn NewsProvider> = match &config.runtime.news_dir {
        Some(dir) => Arc::new(JsonFileNews::new(dir)),
        None => Arc::new(NoNews),
    };

    Ok(RuntimeOrchestrator::new(
        config,
        router,
        Arc::new(Mutex::new(store)),
        market_data,
        news,
        Arc::new(BasicIndicatorEngine::default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_sample_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/fxra.toml");
        let config = load_config(path).unwrap();
        assert_eq!(config.runtime.symbols[0], "EURUSD");
        assert!(config.llm.routes.contains_key("synthesis"));
    }

    #[test]
    fn rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fxra.toml");
        std::fs::write(&path, "[runtime]\nmarket_data_window_candles = 10\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("market_data_window_candles"));

        assert!(load_config(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn router_registers_configured_providers() {
        let mut config = FxraConfig::default();
        config.providers.ollama_server_url = Some("http://10.0.0.5:11434".to_string());
        config.providers.claude_cli_enabled = true;

        let router = build_router(&config).unwrap();
        let mut names = router.provider_names();
        names.sort();
        assert_eq!(
            names,
            vec!["claude_cli", "deepseek", "ollama_local", "ollama_server"]
        );
    }

    #[test]
    fn orchestrator_creates_store_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FxraConfig::default();
        config.storage.sqlite_path = dir
            .path()
            .join("nested/fxra.db")
            .to_string_lossy()
            .into_owned();

        build_orchestrator(&config).unwrap();
        assert!(dir.path().join("nested/fxra.db").exists());
    }
}
