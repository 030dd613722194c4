use serde::{Deserialize, Serialize};

/// Directional view returned by the technical analyst.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "BULLISH",
            Bias::Bearish => "BEARISH",
            Bias::Neutral => "NEUTRAL",
        }
    }
}

pub const PARSING_FAILED_FLAG: &str = "PARSING_FAILED";
pub const LLM_ERROR_FLAG: &str = "LLM_ERROR";

/// Structured technical view. Unknown fields are rejected so that a model
/// drifting from the contract is caught as a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TechnicalAnalysisResult {
    pub bias: Bias,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub setup_type: Option<String>,
    #[serde(default)]
    pub no_trade_flags: Vec<String>,
    /// Set only by `parsing_failed`; never read from model output.
    #[serde(skip)]
    pub fallback: bool,
}

impl TechnicalAnalysisResult {
    /// Canonical value used whenever the model output can't be trusted.
    pub fn parsing_failed(llm_error: bool) -> Self {
        let mut no_trade_flags = vec![PARSING_FAILED_FLAG.to_string()];
        if llm_error {
            no_trade_flags.push(LLM_ERROR_FLAG.to_string());
        }
        Self {
            bias: Bias::Neutral,
            confidence: 0.0,
            evidence: vec![],
            contradictions: vec![],
            setup_type: None,
            no_trade_flags,
            fallback: true,
        }
    }

    pub fn is_parsing_failed(&self) -> bool {
        self.fallback
    }

    /// Range checks serde can't express.
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal() {
        let json = r#"{"bias":"BULLISH","confidence":0.7}"#;
        let result: TechnicalAnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.bias, Bias::Bullish);
        assert!(result.evidence.is_empty());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        let json = r#"{"bias":"BULLISH","confidence":0.7,"action":"CALL"}"#;
        assert!(serde_json::from_str::<TechnicalAnalysisResult>(json).is_err());
    }

    #[test]
    fn lowercase_bias_rejected() {
        let json = r#"{"bias":"bullish","confidence":0.7}"#;
        assert!(serde_json::from_str::<TechnicalAnalysisResult>(json).is_err());
    }

    #[test]
    fn confidence_out_of_range_fails_validation() {
        let json = r#"{"bias":"BEARISH","confidence":1.4}"#;
        let result: TechnicalAnalysisResult = serde_json::from_str(json).unwrap();
        assert!(result.validate().is_err());
    }

    #[test]
    fn parsing_failed_flags() {
        let plain = TechnicalAnalysisResult::parsing_failed(false);
        assert_eq!(plain.no_trade_flags, vec!["PARSING_FAILED"]);
        assert!(plain.is_parsing_failed());

        let with_error = TechnicalAnalysisResult::parsing_failed(true);
        assert_eq!(with_error.no_trade_flags, vec!["PARSING_FAILED", "LLM_ERROR"]);
        assert_eq!(with_error.bias, Bias::Neutral);
        assert_eq!(with_error.confidence, 0.0);
        assert!(with_error.is_parsing_failed());
    }

    #[test]
    fn model_flags_do_not_mark_parse_failure() {
        let json = r#"{"bias":"NEUTRAL","confidence":0.2,"no_trade_flags":["PARSING_FAILED"]}"#;
        let result: TechnicalAnalysisResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_parsing_failed());
        assert_eq!(result.no_trade_flags, vec!["PARSING_FAILED"]);
    }

    #[test]
    fn fallback_marker_is_not_serialized() {
        let json = serde_json::to_string(&TechnicalAnalysisResult::parsing_failed(false)).unwrap();
        assert!(!json.contains("fallback"));
        let back: TechnicalAnalysisResult = serde_json::from_str(&json).unwrap();
        assert!(!back.is_parsing_failed());
    }
}
