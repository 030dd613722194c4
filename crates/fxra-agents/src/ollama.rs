use std::time::{Duration, Instant};

use async_trait::async_trait;
use fxra_models::{HealthCheck, LlmRequest, LlmResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AgentError;
use crate::provider::{into_response, request_timeout, LlmProvider};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

pub(crate) fn chat_messages(request: &LlmRequest) -> [ChatMessage<'_>; 2] {
    [
        ChatMessage {
            role: "system",
            content: &request.system_prompt,
        },
        ChatMessage {
            role: "user",
            content: &request.user_prompt,
        },
    ]
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama server speaking the `/api/chat` protocol. The same type serves the
/// local daemon and a remote server under different registry names.
pub struct OllamaProvider {
    name: String,
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn chat(&self, request: &LlmRequest, model: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model,
            messages: chat_messages(request),
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
            },
            format: request.response_format.as_deref().filter(|f| *f == "json"),
        };

        debug!(provider = %self.name, model, url = %url, "Sending chat request");

        let response = self
            .client
            .post(&url)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| timeout_or_http(e, request.timeout_seconds))?;
        let content = parsed.message.map(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AgentError::Provider(
                "Ollama returned empty content".to_string(),
            ));
        }
        Ok(content)
    }
}

/// reqwest reports timeouts as generic errors; surface them as `Timeout` so
/// the router can tell them apart in its logs.
pub(crate) fn timeout_or_http(err: reqwest::Error, timeout_seconds: f64) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout(timeout_seconds)
    } else {
        AgentError::Http(err)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> HealthCheck {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
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
        let result = self.chat(request, &model).await;
        into_response(&self.name, &model, started, result)
    }
}
