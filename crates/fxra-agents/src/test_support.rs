//! Mock providers for exercising the router and agents without a model.
//!
//! `MockProvider` answers every call the same way and counts health checks
//! and generations. `ScriptedProvider` replays a fixed sequence of replies,
//! which is what the synthesizer repair path and the pipeline tests need.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fxra_models::{HealthCheck, LlmRequest, LlmResponse};
use tokio::sync::Mutex;

use crate::provider::LlmProvider;

const MOCK_LATENCY_MS: u64 = 5;

pub struct MockProvider {
    name: String,
    healthy: bool,
    reply: Result<String, String>,
    health_checks: AtomicUsize,
    calls: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    fn build(name: &str, healthy: bool, reply: Result<String, String>) -> Self {
        Self {
            name: name.to_string(),
            healthy,
            reply,
            health_checks: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Healthy, always answers `reply`.
    pub fn healthy(name: &str, reply: &str) -> Self {
        Self::build(name, true, Ok(reply.to_string()))
    }

    /// Healthy, but every generation fails with `error`.
    pub fn failing(name: &str, error: &str) -> Self {
        Self::build(name, true, Err(error.to_string()))
    }

    /// Fails its health check. Generation would succeed if called.
    pub fn unhealthy(name: &str) -> Self {
        Self::build(name, false, Ok("{}".to_string()))
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> HealthCheck {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            HealthCheck::healthy("mock ok")
        } else {
            HealthCheck::unhealthy("mock unhealthy")
        }
    }

    async fn generate_with_request(&self, request: &LlmRequest) -> LlmResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        let model = request.model_name.clone().unwrap_or_else(|| "mock".to_string());
        match &self.reply {
            Ok(text) => LlmResponse::success(text.as_str(), self.name.as_str(), model, MOCK_LATENCY_MS),
            Err(e) => LlmResponse::failure(self.name.as_str(), model, e.as_str(), MOCK_LATENCY_MS, 1),
        }
    }
}

/// Replays replies in order. Once the script runs out every call fails.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: Vec<Result<String, String>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for scripts made only of successful replies.
    pub fn replies(name: &str, replies: &[&str]) -> Self {
        Self::new(name, replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> HealthCheck {
        HealthCheck::healthy("scripted")
    }

    async fn generate_with_request(&self, request: &LlmRequest) -> LlmResponse {
        self.requests.lock().await.push(request.clone());
        let model = request.model_name.clone().unwrap_or_else(|| "scripted".to_string());
        match self.script.lock().await.pop_front() {
            Some(Ok(text)) => LlmResponse::success(text, self.name.as_str(), model, MOCK_LATENCY_MS),
            Some(Err(e)) => LlmResponse::failure(self.name.as_str(), model, e, MOCK_LATENCY_MS, 1),
            None => LlmResponse::failure(
                self.name.as_str(),
                model,
                "script exhausted",
                MOCK_LATENCY_MS,
                1,
            ),
        }
    }
}
