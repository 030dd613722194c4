use std::time::{Duration, Instant};

use async_trait::async_trait;
use fxra_models::{HealthCheck, LlmRequest, LlmResponse};

use crate::error::AgentError;

const FALLBACK_TIMEOUT_SECS: f64 = 60.0;

/// A text-generation backend. Mockable for testing.
///
/// Implementations never fail at the type level: transport, status and
/// decoding errors are reported through `LlmResponse::error`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap availability probe. May touch the network.
    async fn health_check(&self) -> HealthCheck;

    async fn generate_with_request(&self, request: &LlmRequest) -> LlmResponse;
}

/// Request timeout as a `Duration`. Non-finite or non-positive values fall
/// back to 60 seconds so a bad override can't panic the client.
pub fn request_timeout(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::from_secs_f64(FALLBACK_TIMEOUT_SECS)
    }
}

/// Fold a provider call result into an `LlmResponse`.
pub(crate) fn into_response(
    provider: &str,
    model: &str,
    started: Instant,
    result: Result<String, AgentError>,
) -> LlmResponse {
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(text) => LlmResponse::success(text, provider, model, latency_ms),
        Err(e) => LlmResponse::failure(provider, model, e.to_string(), latency_ms, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_timeouts_fall_back() {
        assert_eq!(request_timeout(2.5), Duration::from_millis(2500));
        assert_eq!(request_timeout(0.0), Duration::from_secs(60));
        assert_eq!(request_timeout(-3.0), Duration::from_secs(60));
        assert_eq!(request_timeout(f64::NAN), Duration::from_secs(60));
    }

    #[test]
    fn errors_become_failure_responses() {
        let resp = into_response(
            "ollama_local",
            "llama3",
            Instant::now(),
            Err(AgentError::Timeout(5.0)),
        );
        assert_eq!(resp.error.as_deref(), Some("Request timed out after 5 seconds"));
        assert!(resp.text.is_empty());
        assert_eq!(resp.attempts, 1);
    }
}
