use std::fmt;

use serde::{Deserialize, Serialize};

/// The pipeline stages that call an LLM. Each has its own routing table entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LlmTask {
    TechAnalysis,
    NewsAnalysis,
    Synthesis,
    Verification,
}

impl LlmTask {
    pub const ALL: [LlmTask; 4] = [
        LlmTask::TechAnalysis,
        LlmTask::NewsAnalysis,
        LlmTask::Synthesis,
        LlmTask::Verification,
    ];

    /// Task name as used in the routing table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmTask::TechAnalysis => "tech_analysis",
            LlmTask::NewsAnalysis => "news_analysis",
            LlmTask::Synthesis => "synthesis",
            LlmTask::Verification => "verification",
        }
    }

    /// Short key used in `<provider>_<prefix>_timeout_seconds` overrides.
    pub fn timeout_prefix(&self) -> &'static str {
        match self {
            LlmTask::TechAnalysis => "tech",
            LlmTask::NewsAnalysis => "news",
            LlmTask::Synthesis => "synthesis",
            LlmTask::Verification => "verifier",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        LlmTask::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for LlmTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved call to a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmRequest {
    pub task: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub timeout_seconds: f64,
    pub max_retries: u32,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
}

/// Provider output. When `error` is set the text must be treated as unusable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub provider_name: String,
    pub model_name: String,
    pub latency_ms: u64,
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
}

impl LlmResponse {
    pub fn success(
        text: impl Into<String>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            text: text.into(),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
            latency_ms,
            attempts: 1,
            error: None,
        }
    }

    /// An error-bearing response. Text is always empty.
    pub fn failure(
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
        error: impl Into<String>,
        latency_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            text: String::new(),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
            latency_ms,
            attempts,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Output text, or `None` when the call failed.
    pub fn usable_text(&self) -> Option<&str> {
        match self.error {
            Some(_) => None,
            None => Some(self.text.as_str()),
        }
    }
}

/// Result of a provider's cheap availability probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    pub ok: bool,
    pub reason: String,
}

impl HealthCheck {
    pub fn healthy(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            reason: reason.into(),
        }
    }

    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: reason.into(),
        }
    }
}
