use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use fxra_models::{LlmConfig, LlmRequest, LlmResponse, LlmRouteStep, LlmTask};
use tracing::{debug, error, info, warn};

use crate::provider::LlmProvider;

pub const MODE_SEQUENTIAL: &str = "sequential";
pub const MODE_STRICT: &str = "strict";

/// Provider health results with the instant they were taken.
struct HealthCache {
    ttl: Duration,
    entries: HashMap<String, (bool, Instant)>,
}

impl HealthCache {
    fn fresh(&self, provider: &str) -> Option<bool> {
        self.entries
            .get(provider)
            .filter(|(_, checked)| checked.elapsed() < self.ttl)
            .map(|(ok, _)| *ok)
    }
}

/// Routes each task to its configured chain of providers.
///
/// The health cache is the only mutable state. Its lock is never held across
/// an await, so two concurrent calls may both probe a stale provider; that
/// costs one extra health check and nothing else.
pub struct LlmRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    config: LlmConfig,
    routes: BTreeMap<String, Vec<LlmRouteStep>>,
    health: Mutex<HealthCache>,
}

impl LlmRouter {
    pub fn new(config: &LlmConfig, providers: HashMap<String, Arc<dyn LlmProvider>>) -> Self {
        Self {
            providers,
            routes: config.routing_table(),
            health: Mutex::new(HealthCache {
                ttl: Duration::from_secs(config.health_ttl_seconds),
                entries: HashMap::new(),
            }),
            config: config.clone(),
        }
    }

    /// Register (or replace) a provider under `name`.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn routes(&self) -> &BTreeMap<String, Vec<LlmRouteStep>> {
        &self.routes
    }

    pub fn mode(&self) -> &str {
        &self.config.router_mode
    }

    /// Change the health cache TTL. Zero forces a probe on every lookup.
    pub fn set_health_ttl(&self, ttl: Duration) {
        self.health_cache().ttl = ttl;
    }

    fn health_cache(&self) -> MutexGuard<'_, HealthCache> {
        match self.health.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registered and passing its (possibly cached) health check.
    pub async fn is_provider_available(&self, name: &str) -> bool {
        let Some(provider) = self.providers.get(name) else {
            return false;
        };

        if let Some(ok) = self.health_cache().fresh(name) {
            debug!(provider = name, ok, "Health check cache hit");
            return ok;
        }

        let check = provider.health_check().await;
        if !check.ok {
            warn!(provider = name, reason = %check.reason, "Provider health check failed");
        }
        self.health_cache()
            .entries
            .insert(name.to_string(), (check.ok, Instant::now()));
        check.ok
    }

    /// Effective timeout for `provider` on `task`, most specific override first:
    /// `<provider>_<prefix>_timeout_seconds`, then `<provider>_timeout_seconds`,
    /// then `default`. Tasks without an `LlmTask` mapping skip the first tier.
    pub fn resolve_timeout(&self, provider: &str, task: &str, default: f64) -> f64 {
        let normalized = provider.replace(['-', '.'], "_");
        let timeouts = &self.config.provider_timeouts;

        LlmTask::from_name(task)
            .and_then(|t| {
                timeouts.get(&format!("{normalized}_{}_timeout_seconds", t.timeout_prefix()))
            })
            .or_else(|| timeouts.get(&format!("{normalized}_timeout_seconds")))
            .copied()
            .unwrap_or(default)
    }

    fn base_request(&self, task: &str, system_prompt: &str, user_prompt: &str) -> LlmRequest {
        let overrides = self.config.task_overrides.get(task);
        LlmRequest {
            task: task.to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature: overrides
                .and_then(|o| o.temperature)
                .unwrap_or(self.config.temperature),
            timeout_seconds: overrides
                .and_then(|o| o.timeout_seconds)
                .unwrap_or(self.config.timeout_seconds),
            max_retries: self.config.max_retries,
            model_name: None,
            response_format: None,
        }
    }

    /// Generate text for `task`. Never fails: every failure path yields a
    /// response with `error` set and empty `text`.
    pub async fn generate(&self, task: &str, system_prompt: &str, user_prompt: &str) -> LlmResponse {
        let Some(steps) = self.routes.get(task) else {
            error!(task, "Unknown LLM task");
            return LlmResponse::failure("unknown", "unknown", format!("Unknown task: {task}"), 0, 1);
        };

        let request = self.base_request(task, system_prompt, user_prompt);
        debug!(
            task,
            mode = %self.config.router_mode,
            steps = steps.len(),
            system_prompt_chars = system_prompt.len(),
            user_prompt_chars = user_prompt.len(),
            "Routing LLM request"
        );

        match self.config.router_mode.as_str() {
            MODE_SEQUENTIAL => self.generate_sequential(steps, request).await,
            MODE_STRICT => self.generate_strict(steps, request).await,
            other => {
                error!(task, mode = other, "Unsupported router mode");
                LlmResponse::failure(
                    "unknown",
                    "unknown",
                    format!("Unsupported router mode: {other}"),
                    0,
                    1,
                )
            }
        }
    }

    async fn call_step(&self, step: &LlmRouteStep, base: &LlmRequest) -> Option<LlmResponse> {
        let provider = self.providers.get(&step.provider)?;
        let mut request = base.clone();
        request.model_name = Some(step.model.clone());
        request.timeout_seconds =
            self.resolve_timeout(&step.provider, &base.task, base.timeout_seconds);
        Some(provider.generate_with_request(&request).await)
    }

    async fn generate_sequential(&self, steps: &[LlmRouteStep], request: LlmRequest) -> LlmResponse {
        let task = request.task.as_str();
        let mut attempts = 0u32;
        let mut failures = Vec::new();

        for (idx, step) in steps.iter().enumerate() {
            if !self.providers.contains_key(&step.provider) {
                debug!(task, provider = %step.provider, "Provider not registered, skipping");
                continue;
            }
            if !self.is_provider_available(&step.provider).await {
                debug!(task, provider = %step.provider, "Provider unavailable, skipping");
                continue;
            }

            attempts += 1;
            let Some(mut response) = self.call_step(step, &request).await else {
                continue;
            };

            if response.is_ok() {
                response.attempts = attempts;
                info!(
                    task,
                    provider = %response.provider_name,
                    model = %response.model_name,
                    attempts,
                    latency_ms = response.latency_ms,
                    "LLM call succeeded"
                );
                return response;
            }

            let reason = response.error.unwrap_or_default();
            failures.push(format!("{}/{}: {reason}", step.provider, step.model));
            if is_timeout(&reason) {
                error!(
                    task,
                    provider = %step.provider,
                    model = %step.model,
                    attempt = attempts,
                    latency_ms = response.latency_ms,
                    error = %reason,
                    "LLM call timed out"
                );
            } else {
                warn!(
                    task,
                    provider = %step.provider,
                    model = %step.model,
                    attempt = attempts,
                    latency_ms = response.latency_ms,
                    error = %reason,
                    "LLM call failed"
                );
            }

            if let Some(next) = steps.get(idx + 1) {
                info!(
                    task,
                    reason = %reason,
                    next_provider = %next.provider,
                    next_model = %next.model,
                    "Switching to fallback"
                );
            }
        }

        error!(task, attempts, "All configured providers failed, trying last resort");
        self.last_resort(request, attempts, &failures).await
    }

    /// Final attempt once the chain is exhausted. On failure the error lists
    /// every earlier `provider/model: error` before the last resort's own.
    async fn last_resort(
        &self,
        mut request: LlmRequest,
        attempts: u32,
        failures: &[String],
    ) -> LlmResponse {
        let last = &self.config.last_resort;
        let task = request.task.clone();
        let exhausted = |err: &str| {
            let mut all = failures.to_vec();
            all.push(format!("last resort {}/{}: {err}", last.provider, last.model));
            format!(
                "All providers failed for task={task}, including last resort (provider={}, model={}): {}",
                last.provider,
                last.model,
                all.join("; ")
            )
        };

        let Some(provider) = self.providers.get(&last.provider) else {
            let err = format!("Last resort provider not available: {}", last.provider);
            error!(task = %task, provider = %last.provider, "Last resort provider not registered");
            return LlmResponse::failure(
                last.provider.as_str(),
                last.model.as_str(),
                exhausted(&err),
                0,
                attempts + 1,
            );
        };

        request.model_name = Some(last.model.clone());
        let mut response = provider.generate_with_request(&request).await;
        response.attempts = attempts + 1;

        match response.error.take() {
            None => {
                warn!(
                    task = %task,
                    provider = %last.provider,
                    model = %last.model,
                    attempts = response.attempts,
                    "Last resort provider answered"
                );
                response
            }
            Some(err) => {
                error!(
                    task = %task,
                    provider = %last.provider,
                    model = %last.model,
                    attempts = response.attempts,
                    error = %err,
                    "Last resort provider failed"
                );
                LlmResponse::failure(
                    last.provider.as_str(),
                    last.model.as_str(),
                    exhausted(&err),
                    0,
                    attempts + 1,
                )
            }
        }
    }

    async fn generate_strict(&self, steps: &[LlmRouteStep], request: LlmRequest) -> LlmResponse {
        let task = request.task.as_str();
        let Some(primary) = steps.first() else {
            error!(task, "No routing steps configured");
            return LlmResponse::failure(
                "unknown",
                "unknown",
                format!("No routing steps configured for task={task}"),
                0,
                1,
            );
        };

        if !self.is_provider_available(&primary.provider).await {
            error!(task, provider = %primary.provider, model = %primary.model, "Primary provider unavailable in strict mode");
            return LlmResponse::failure(
                primary.provider.as_str(),
                primary.model.as_str(),
                format!(
                    "Primary provider unavailable in strict mode: task={task}, provider={}, model={}",
                    primary.provider, primary.model
                ),
                0,
                1,
            );
        }

        let Some(mut response) = self.call_step(primary, &request).await else {
            return LlmResponse::failure(
                primary.provider.as_str(),
                primary.model.as_str(),
                format!("Provider not registered: {}", primary.provider),
                0,
                1,
            );
        };

        match response.error.take() {
            None => {
                response.attempts = 1;
                response
            }
            Some(err) => {
                error!(task, provider = %primary.provider, model = %primary.model, error = %err, "Primary provider failed in strict mode");
                LlmResponse::failure(
                    primary.provider.as_str(),
                    primary.model.as_str(),
                    format!(
                        "Primary provider failed in strict mode: task={task}, provider={}, model={}, error={err}",
                        primary.provider, primary.model
                    ),
                    response.latency_ms,
                    1,
                )
            }
        }
    }
}

fn is_timeout(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    lower.contains("timeout") || lower.contains("timed out")
}
