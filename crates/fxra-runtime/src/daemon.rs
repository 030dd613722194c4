use std::sync::Arc;
use std::time::Duration;

use fxra_models::{RuntimeConfig, Timeframe};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::RuntimeOrchestrator;

/// Periodic analysis over a fixed symbol list. Runs one pass immediately,
/// then one per interval until cancelled or `max_iterations` passes are done.
pub struct AnalysisLoop {
    orchestrator: Arc<RuntimeOrchestrator>,
    symbols: Vec<String>,
    timeframe: Timeframe,
    interval: Duration,
    max_iterations: Option<u64>,
    cancel: CancellationToken,
}

impl AnalysisLoop {
    pub fn new(orchestrator: Arc<RuntimeOrchestrator>, config: &RuntimeConfig) -> Self {
        Self {
            orchestrator,
            symbols: config.symbols.clone(),
            timeframe: config.timeframe,
            interval: Duration::from_secs(config.loop_interval_seconds),
            max_iterations: config.max_iterations,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled or the iteration limit is reached. Returns the
    /// number of completed passes.
    pub async fn run(&self) -> u64 {
        tracing::info!(
            symbols = ?self.symbols,
            timeframe = %self.timeframe,
            interval_secs = self.interval.as_secs(),
            max_iterations = ?self.max_iterations,
            "Analysis loop starting"
        );

        let mut iterations = 0;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.run_pass(iterations + 1).await;
            iterations += 1;

            if self.max_iterations.is_some_and(|max| iterations >= max) {
                tracing::info!(iterations, "Iteration limit reached");
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Analysis loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(iterations, "Analysis loop stopped");
        iterations
    }

    async fn run_pass(&self, iteration: u64) {
        for symbol in &self.symbols {
            if self.cancel.is_cancelled() {
                return;
            }
            let run_id = self.orchestrator.run_analysis(symbol, self.timeframe).await;
            tracing::debug!(iteration, symbol = %symbol, %run_id, "Symbol analysed");
        }
    }
}
