//! LLM access and the agents built on it.
//!
//! Providers implement [`LlmProvider`] and are registered by name with the
//! [`LlmRouter`], which walks each task's routing chain. The agents turn
//! router output into typed results and fall back to safe defaults when the
//! model output can't be used.

pub mod claude_cli;
pub mod deepseek;
pub mod error;
pub mod news;
pub mod ollama;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod router;
pub mod safety;
pub mod synthesizer;
pub mod technical;
pub mod verifier;

pub mod test_support;

pub use claude_cli::ClaudeCliProvider;
pub use deepseek::DeepSeekProvider;
pub use error::AgentError;
pub use news::{NewsAnalysis, NewsAnalyst};
pub use ollama::OllamaProvider;
pub use provider::LlmProvider;
pub use router::LlmRouter;
pub use safety::{SafetyPolicy, SafetyViolation};
pub use synthesizer::{SynthesisInput, SynthesisOutcome, Synthesizer};
pub use technical::{TechnicalAnalysis, TechnicalAnalyst};
pub use verifier::Verifier;
