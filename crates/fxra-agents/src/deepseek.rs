use std::time::{Duration, Instant};

use async_trait::async_trait;
use fxra_models::{HealthCheck, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AgentError;
use crate::ollama::{chat_messages, timeout_or_http, ChatMessage};
use crate::provider::{into_response, request_timeout, LlmProvider};

pub const DEEPSEEK_PROVIDER: &str = "deepseek";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// DeepSeek's OpenAI-compatible chat completions API.
pub struct DeepSeekProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl DeepSeekProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            default_model: default_model.into(),
            client,
        })
    }

    /// Read the API key from the named environment variable.
    pub fn from_env(
        base_url: impl Into<String>,
        api_key_env: &str,
        default_model: impl Into<String>,
    ) -> Result<Self, AgentError> {
        Self::new(base_url, std::env::var(api_key_env).ok(), default_model)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &LlmRequest, model: &str) -> Result<String, AgentError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AgentError::Provider("DeepSeek API key not configured".to_string()))?;

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = CompletionRequest {
            model,
            messages: chat_messages(request),
            temperature: request.temperature,
            stream: false,
            response_format: request
                .response_format
                .as_deref()
                .filter(|f| *f == "json")
                .map(|_| ResponseFormat {
                    kind: "json_object",
                }),
        };

        debug!(provider = DEEPSEEK_PROVIDER, model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(request_timeout(request.timeout_seconds))
            .json(&body)
            .send()
            .await
            .map_err(|e| timeout_or_http(e, request.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status { status, body });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| timeout_or_http(e, request.timeout_seconds))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AgentError::Provider(
                "DeepSeek returned empty content".to_string(),
            ));
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        DEEPSEEK_PROVIDER
    }

    async fn health_check(&self) -> HealthCheck {
        let Some(api_key) = self.api_key.as_deref() else {
            return HealthCheck::unhealthy("API key not set");
        };
        let url = format!("{}/v1/models", self.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => HealthCheck::healthy("ok"),
            Ok(resp) => HealthCheck::unhealthy(format!("status {}", resp.status().as_u16())),
            Err(e) => HealthCheck::unhealthy(e.to_string()),
        }
    }

    async fn generate_with_request(&self, request: &LlmRequest) -> LlmResponse {
        let model = request
            .model_name
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let started = Instant::now();
        let result = self.complete(request, &model).await;
        into_response(DEEPSEEK_PROVIDER, &model, started, result)
    }
}
