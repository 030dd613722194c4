use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fxra_models::Timeframe;
use fxra_runtime::AnalysisLoop;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fxra", about = "Forex research assistant - LLM-explained trade recommendations")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/fxra.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one analysis and print the recommendation
    Analyze {
        #[arg(short, long, default_value = "EURUSD")]
        symbol: String,

        /// One of 1m, 5m, 15m, 30m, 1h, 4h, 1d. Defaults to the configured timeframe.
        #[arg(short, long)]
        timeframe: Option<Timeframe>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Analyse the configured symbols periodically until Ctrl-C
    Loop {
        /// Stop after this many passes
        #[arg(long)]
        max_iterations: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (respects RUST_LOG env var)
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = fxra::load_config(&cli.config)?;
    let orchestrator =
        fxra::build_orchestrator(&config).context("Failed to build orchestrator")?;

    match cli.command {
        Command::Analyze {
            symbol,
            timeframe,
            pretty,
        } => {
            let timeframe = timeframe.unwrap_or(config.runtime.timeframe);
            let run_id = orchestrator.run_analysis(&symbol, timeframe).await;

            let store = orchestrator.store();
            let (run, recommendations) = {
                let store = store
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Store lock poisoned: {e}"))?;
                (store.get_run(run_id)?, store.recommendations_for_run(run_id)?)
            };

            let output = serde_json::json!({
                "run_id": run_id,
                "status": run.as_ref().map(|r| r.status),
                "error": run.and_then(|r| r.error_message),
                "recommendation": recommendations.into_iter().next(),
            });
            let output = if pretty {
                serde_json::to_string_pretty(&output)?
            } else {
                serde_json::to_string(&output)?
            };
            println!("{output}");
        }
        Command::Loop { max_iterations } => {
            let analysis_loop = AnalysisLoop::new(Arc::new(orchestrator), &config.runtime)
                .with_max_iterations(max_iterations.or(config.runtime.max_iterations));

            let cancel = analysis_loop.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, shutting down");
                    cancel.cancel();
                }
            });

            let iterations = analysis_loop.run().await;
            tracing::info!(iterations, "fxra loop exited");
        }
    }

    Ok(())
}
