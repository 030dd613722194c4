use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::LlmResponse;
use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(RunStatus::Pending),
            "SUCCESS" => Some(RunStatus::Success),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One pass of the analysis pipeline for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

impl Run {
    pub fn start(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timeframe,
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Pending,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RationaleKind {
    Technical,
    News,
    Synthesis,
}

impl RationaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RationaleKind::Technical => "TECHNICAL",
            RationaleKind::News => "NEWS",
            RationaleKind::Synthesis => "SYNTHESIS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TECHNICAL" => Some(RationaleKind::Technical),
            "NEWS" => Some(RationaleKind::News),
            "SYNTHESIS" => Some(RationaleKind::Synthesis),
            _ => None,
        }
    }
}

/// Audit record for one agent stage, with the LLM call that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rationale {
    pub run_id: Uuid,
    pub kind: RationaleKind,
    pub content: String,
    #[serde(default)]
    pub raw_data: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Rationale {
    pub fn new(run_id: Uuid, kind: RationaleKind, content: impl Into<String>) -> Self {
        Self {
            run_id,
            kind,
            content: content.into(),
            raw_data: None,
            provider_name: None,
            model_name: None,
            latency_ms: None,
            attempts: None,
            error: None,
        }
    }

    /// Attach provider/model/latency from the call that produced this rationale.
    pub fn with_llm(mut self, response: Option<&LlmResponse>) -> Self {
        if let Some(resp) = response {
            self.provider_name = Some(resp.provider_name.clone());
            self.model_name = Some(resp.model_name.clone());
            self.latency_ms = Some(resp.latency_ms);
            self.attempts = Some(resp.attempts);
            self.error = resp.error.clone();
        }
        self
    }

    pub fn with_raw_data(mut self, raw: impl Into<String>) -> Self {
        self.raw_data = Some(raw.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_is_pending() {
        let run = Run::start("USDJPY", Timeframe::M5);
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.end_time.is_none());
    }

    #[test]
    fn rationale_copies_llm_metadata() {
        let resp = LlmResponse::failure("deepseek", "deepseek-chat", "HTTP 503", 120, 2);
        let rationale =
            Rationale::new(Uuid::nil(), RationaleKind::News, "no news").with_llm(Some(&resp));
        assert_eq!(rationale.provider_name.as_deref(), Some("deepseek"));
        assert_eq!(rationale.attempts, Some(2));
        assert_eq!(rationale.error.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn status_strings() {
        for status in [RunStatus::Pending, RunStatus::Success, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
    }
}
