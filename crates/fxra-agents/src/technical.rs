use std::sync::Arc;

use fxra_models::{LlmResponse, LlmTask, TechnicalAnalysisResult, Timeframe};
use tracing::{debug, warn};

use crate::parser::extract_json;
use crate::prompts::technical_system_prompt;
use crate::router::LlmRouter;

/// Output of one technical analysis call.
#[derive(Debug, Clone)]
pub struct TechnicalAnalysis {
    pub result: TechnicalAnalysisResult,
    pub response: LlmResponse,
}

impl TechnicalAnalysis {
    /// The result as compact JSON, as fed to the synthesizer and stored.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.result).unwrap_or_default()
    }
}

/// Turns a feature snapshot into a structured technical view.
pub struct TechnicalAnalyst {
    router: Arc<LlmRouter>,
}

impl TechnicalAnalyst {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self { router }
    }

    pub async fn analyze(
        &self,
        snapshot_markdown: &str,
        symbol: &str,
        timeframe: Timeframe,
    ) -> TechnicalAnalysis {
        let display = display_symbol(symbol);
        let system_prompt = technical_system_prompt(&display, timeframe);

        debug!(
            symbol,
            timeframe = %timeframe,
            system_prompt_chars = system_prompt.len(),
            user_prompt_chars = snapshot_markdown.len(),
            "Tech analysis prompt built"
        );

        let response = self
            .router
            .generate(LlmTask::TechAnalysis.as_str(), &system_prompt, snapshot_markdown)
            .await;

        let result = match parse_technical(&response) {
            Ok(result) => result,
            Err(reason) => {
                warn!(
                    symbol,
                    provider = %response.provider_name,
                    reason = %reason,
                    "Technical analysis unusable, using neutral fallback"
                );
                TechnicalAnalysisResult::parsing_failed(response.error.is_some())
            }
        };

        TechnicalAnalysis { result, response }
    }
}

/// `EURUSD` becomes `EUR/USD`; anything not six letters is only uppercased.
pub fn display_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.len() == 6 && upper.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("{}/{}", &upper[..3], &upper[3..])
    } else {
        upper
    }
}

/// Strictly validate the model output. Any problem is reported as a string;
/// the caller decides on the fallback.
pub fn parse_technical(response: &LlmResponse) -> Result<TechnicalAnalysisResult, String> {
    let text = match (&response.error, response.usable_text()) {
        (Some(err), _) => return Err(format!("LLM error: {err}")),
        (None, Some(text)) => text,
        (None, None) => return Err("empty response".to_string()),
    };
    let json = extract_json(text).map_err(|e| e.to_string())?;
    let result: TechnicalAnalysisResult =
        serde_json::from_str(&json).map_err(|e| format!("schema violation: {e}"))?;
    result.validate()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxra_models::Bias;

    fn ok(text: &str) -> LlmResponse {
        LlmResponse::success(text, "mock", "m", 1)
    }

    #[test]
    fn display_symbols() {
        assert_eq!(display_symbol("eurusd"), "EUR/USD");
        assert_eq!(display_symbol(" USDJPY "), "USD/JPY");
        assert_eq!(display_symbol("XAUUSD.m"), "XAUUSD.M");
        assert_eq!(display_symbol("BTC"), "BTC");
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"bias\":\"BEARISH\",\"confidence\":0.62,\"evidence\":[\"RSI falling\"]}\n```";
        let result = parse_technical(&ok(text)).unwrap();
        assert_eq!(result.bias, Bias::Bearish);
        assert_eq!(result.evidence, vec!["RSI falling"]);
    }

    #[test]
    fn rejects_bad_outputs() {
        assert!(parse_technical(&ok("The market looks bullish.")).is_err());
        assert!(parse_technical(&ok(r#"{"bias":"UP","confidence":0.5}"#)).is_err());
        assert!(parse_technical(&ok(r#"{"bias":"BULLISH","confidence":1.5}"#)).is_err());
        assert!(parse_technical(&ok(r#"{"bias":"BULLISH","confidence":0.5,"extra":1}"#)).is_err());
        let failed = LlmResponse::failure("mock", "m", "timed out", 1, 1);
        assert!(parse_technical(&failed).unwrap_err().contains("LLM error"));
    }
}
