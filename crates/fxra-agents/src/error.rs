use thiserror::Error;

/// Failures inside a provider call. Providers convert these into an
/// error-bearing `LlmResponse` before returning to the router.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Agent response parse error: {0}")]
    Parse(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(f64),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        match self {
            AgentError::Timeout(_) => true,
            AgentError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
