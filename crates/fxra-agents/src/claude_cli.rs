use std::time::{Duration, Instant};

use async_trait::async_trait;
use fxra_models::{HealthCheck, LlmRequest, LlmResponse};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::provider::{into_response, request_timeout, LlmProvider};

pub const CLAUDE_CLI_PROVIDER: &str = "claude_cli";

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(45),
        }
    }
}

/// Invoke the `claude` CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(model = %config.model, "Invoking claude CLI");

    let result = tokio::time::timeout(config.timeout, async {
        Command::new("claude")
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                &config.model,
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs_f64()))?
    .map_err(|e| AgentError::Cli(format!("Failed to spawn claude: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            result.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&result.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli(
            "Claude returned empty response".to_string(),
        ));
    }

    Ok(stdout)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// `LlmProvider` backed by the local `claude` CLI.
pub struct ClaudeCliProvider {
    default_model: String,
}

impl ClaudeCliProvider {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
        }
    }
}

impl Default for ClaudeCliProvider {
    fn default() -> Self {
        Self::new(ClaudeCliConfig::default().model)
    }
}

#[async_trait]
impl LlmProvider for ClaudeCliProvider {
    fn name(&self) -> &str {
        CLAUDE_CLI_PROVIDER
    }

    async fn health_check(&self) -> HealthCheck {
        if check_cli_available().await {
            HealthCheck::healthy("claude CLI available")
        } else {
            HealthCheck::unhealthy("claude CLI not found on PATH")
        }
    }

    async fn generate_with_request(&self, request: &LlmRequest) -> LlmResponse {
        let config = ClaudeCliConfig {
            model: request
                .model_name
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            timeout: request_timeout(request.timeout_seconds),
        };
        let started = Instant::now();
        let result = invoke_claude(&request.system_prompt, &request.user_prompt, &config).await;
        into_response(CLAUDE_CLI_PROVIDER, &config.model, started, result)
    }
}
