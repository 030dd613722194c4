use std::sync::Arc;

use fxra_decision::reason_codes::{push_once, PARSING_FAILED};
use fxra_decision::{build_reason_codes, calculate_scores, decide_action, DecisionScores, IndicatorBag};
use fxra_models::{
    Action, DecisionConfig, LlmResponse, LlmTask, NewsDigest, Recommendation,
    TechnicalAnalysisResult, Timeframe, VerificationReport,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::parser::{extract_json, try_parse_object, truncate};
use crate::prompts::{
    brief_repair_prompt, synthesis_repair_prompt, synthesis_repair_system_prompt, synthesis_system_prompt,
    synthesis_user_prompt, SynthesisPromptInput,
};
use crate::router::LlmRouter;
use crate::safety::SafetyPolicy;
use crate::technical::display_symbol;

const RAW_OUTPUT_MAX_CHARS: usize = 6000;
const EXTRACTED_JSON_MAX_CHARS: usize = 2000;
const REPAIR_INPUT_MAX_CHARS: usize = 1500;

pub const FALLBACK_BRIEF: &str =
    "Synthesis failed: the model did not return valid JSON after one repair attempt. \
     No recommendation is made.";

/// Everything the synthesizer needs for one recommendation.
pub struct SynthesisInput<'a> {
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    pub technical: &'a TechnicalAnalysisResult,
    /// Indicator bag from the feature snapshot.
    pub indicators: &'a IndicatorBag,
    pub news: Option<&'a NewsDigest>,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub recommendation: Recommendation,
    pub scores: DecisionScores,
    /// Parse status, raw and repair outputs, the decision and LLM metadata.
    pub debug: Value,
    /// The last LLM response: the repair response if a repair was attempted.
    pub response: LlmResponse,
}

/// A brief that passed validation, plus what the model proposed.
#[derive(Debug, Clone, PartialEq)]
struct ParsedSynthesis {
    suggested_action: Action,
    suggested_confidence: f64,
    brief: String,
    brief_warning: Option<&'static str>,
}

/// Explains a decision made by the deterministic policy.
///
/// Action and confidence always come from `decide_action`; the model only
/// writes the brief. Whatever action it proposes is recorded in the debug
/// payload and otherwise ignored.
pub struct Synthesizer {
    router: Arc<LlmRouter>,
    decision: DecisionConfig,
}

impl Synthesizer {
    pub fn new(router: Arc<LlmRouter>, decision: DecisionConfig) -> Self {
        Self { router, decision }
    }

    pub async fn synthesize(&self, input: SynthesisInput<'_>) -> SynthesisOutcome {
        let technical = input.technical;
        let technical_bag = IndicatorBag::new()
            .with("trend_direction", technical.bias.as_str())
            .with("trend_strength", technical.confidence * 100.0);

        let scores = calculate_scores(input.indicators, Some(&technical_bag));
        let mut reason_codes = build_reason_codes(input.indicators, &scores, Some(&self.decision));
        if technical.is_parsing_failed() {
            push_once(&mut reason_codes, PARSING_FAILED);
        }

        let (action, confidence) = decide_action(
            &scores,
            &reason_codes,
            &self.decision,
            technical.confidence,
            input.news.map(|n| n.quality),
        );

        debug!(
            symbol = input.symbol,
            action = %action,
            confidence,
            bull = scores.bull_score,
            bear = scores.bear_score,
            no_trade = scores.no_trade_score,
            reason_codes = ?reason_codes,
            "Decision fixed before synthesis"
        );

        let technical_json = serde_json::to_string(technical).unwrap_or_default();
        let display = display_symbol(input.symbol);
        let user_prompt = synthesis_user_prompt(&SynthesisPromptInput {
            display_symbol: &display,
            timeframe: input.timeframe,
            action,
            confidence,
            scores: &scores,
            reason_codes: &reason_codes,
            technical_json: &technical_json,
            news: input.news,
        });

        let response = self
            .router
            .generate(LlmTask::Synthesis.as_str(), &synthesis_system_prompt(), &user_prompt)
            .await;

        let mut debug = json!({
            "parse_ok": false,
            "parse_error": null,
            "raw_output": truncate(&response.text, RAW_OUTPUT_MAX_CHARS),
            "extracted_json": null,
            "repair_attempts": 0,
            "repair_output_1": null,
            "brief_warning": null,
            "retry_used": false,
            "technical_parse_ok": !technical.is_parsing_failed(),
            "technical_parse_error": technical
                .is_parsing_failed()
                .then_some("technical analysis fell back to neutral"),
            "decision": {
                "action": action,
                "confidence": confidence,
                "scores": scores,
                "reason_codes": reason_codes,
            },
            "llm_metadata": llm_metadata(&response),
        });
        if let Ok(extracted) = extract_json(&response.text) {
            debug["extracted_json"] = json!(truncate(&extracted, EXTRACTED_JSON_MAX_CHARS));
        }

        let (parsed, last_response) = match parse_synthesis(&response) {
            Ok(parsed) => (Some(parsed), response),
            Err(initial_error) => {
                debug["parse_error"] = json!(initial_error);
                if response.error.is_some() {
                    warn!(
                        symbol = input.symbol,
                        error = %initial_error,
                        "Synthesis LLM call failed, skipping repair"
                    );
                    (None, response)
                } else {
                    self.repair(&response, &initial_error, &mut debug).await
                }
            }
        };

        let mut recommendation = match parsed {
            Some(parsed) => {
                debug["parse_ok"] = json!(true);
                debug["brief_warning"] = json!(parsed.brief_warning);
                debug["llm_suggested_action"] = json!(parsed.suggested_action);
                debug["llm_suggested_confidence"] = json!(parsed.suggested_confidence);
                if parsed.suggested_action != action {
                    info!(
                        symbol = input.symbol,
                        decided = %action,
                        suggested = %parsed.suggested_action,
                        "Discarding model-proposed action"
                    );
                }
                Recommendation::new(input.symbol, input.timeframe, action, confidence, parsed.brief)
            }
            None => {
                warn!(symbol = input.symbol, "Synthesis unusable, recommending WAIT");
                Recommendation::new(input.symbol, input.timeframe, Action::Wait, 0.0, FALLBACK_BRIEF)
            }
        };
        recommendation.reason_codes = reason_codes;

        if let Some(violation) = SafetyPolicy::enforce(&mut recommendation) {
            warn!(symbol = input.symbol, violation = %violation, "Safety policy adjusted recommendation");
            debug["safety_violation"] = json!(violation.to_string());
        }

        SynthesisOutcome {
            recommendation,
            scores,
            debug,
            response: last_response,
        }
    }

    /// One repair round with a stricter prompt.
    async fn repair(
        &self,
        original: &LlmResponse,
        initial_error: &str,
        debug: &mut Value,
    ) -> (Option<ParsedSynthesis>, LlmResponse) {
        debug["repair_attempts"] = json!(1);
        debug["retry_used"] = json!(true);

        let prompt = synthesis_repair_prompt(&truncate(&original.text, REPAIR_INPUT_MAX_CHARS));
        let repaired = self
            .router
            .generate(
                LlmTask::Synthesis.as_str(),
                &synthesis_repair_system_prompt(),
                &prompt,
            )
            .await;
        debug["repair_output_1"] = json!(truncate(&repaired.text, RAW_OUTPUT_MAX_CHARS));
        debug["llm_metadata"] = llm_metadata(&repaired);

        match parse_synthesis(&repaired) {
            Ok(parsed) => (Some(parsed), repaired),
            Err(repair_error) => {
                debug["parse_error"] = json!(format!("Initial: {initial_error}; Repair 1: {repair_error}"));
                (None, repaired)
            }
        }
    }

    /// Rewrite the brief of a recommendation that failed verification.
    ///
    /// Action and confidence stay as decided; whatever the model proposes
    /// for them is ignored. Returns the sanitized brief when the output was
    /// usable and free of forbidden phrases.
    pub async fn repair_brief(
        &self,
        recommendation: &Recommendation,
        report: &VerificationReport,
    ) -> (Option<String>, LlmResponse) {
        let issues: Vec<Value> = report
            .issues
            .iter()
            .map(|issue| json!({"code": issue.code, "message": issue.message}))
            .collect();
        let issues_json = serde_json::to_string_pretty(&issues).unwrap_or_default();
        let prompt = brief_repair_prompt(
            recommendation.action,
            recommendation.confidence,
            &recommendation.brief,
            &issues_json,
            report.suggested_fix.as_deref(),
        );

        let response = self
            .router
            .generate(
                LlmTask::Synthesis.as_str(),
                &synthesis_repair_system_prompt(),
                &prompt,
            )
            .await;

        match parse_synthesis(&response) {
            Ok(parsed) => {
                if let Some(phrase) = SafetyPolicy::find_forbidden_phrase(&parsed.brief) {
                    warn!(symbol = %recommendation.symbol, phrase, "Repaired brief rejected by safety policy");
                    return (None, response);
                }
                (Some(SafetyPolicy::sanitize(&parsed.brief)), response)
            }
            Err(e) => {
                warn!(symbol = %recommendation.symbol, error = %e, "Brief repair unusable");
                (None, response)
            }
        }
    }
}

fn llm_metadata(response: &LlmResponse) -> Value {
    json!({
        "provider_name": response.provider_name,
        "model_name": response.model_name,
        "latency_ms": response.latency_ms,
        "attempts": response.attempts,
        "error": response.error,
    })
}

fn parse_synthesis(response: &LlmResponse) -> Result<ParsedSynthesis, String> {
    if let Some(err) = &response.error {
        return Err(format!("LLM error: {err}"));
    }
    let data = try_parse_object(&response.text).map_err(|e| e.to_string())?;

    let action_raw = data
        .get("action")
        .and_then(Value::as_str)
        .ok_or("missing 'action' field")?;
    let suggested_action =
        Action::parse(action_raw).ok_or_else(|| format!("Invalid action: {action_raw}"))?;

    let suggested_confidence = data
        .get("confidence")
        .and_then(confidence_value)
        .ok_or("missing or non-numeric 'confidence' field")?;
    if !(0.0..=1.0).contains(&suggested_confidence) {
        return Err(format!("confidence out of range: {suggested_confidence}"));
    }

    let brief_raw = data
        .get("brief")
        .and_then(Value::as_str)
        .ok_or("missing 'brief' field")?;
    let (brief, brief_warning) = normalize_brief(brief_raw);
    if brief.is_empty() {
        return Err("empty 'brief' field".to_string());
    }

    Ok(ParsedSynthesis {
        suggested_action,
        suggested_confidence,
        brief,
        brief_warning,
    })
}

/// Numbers, or numeric strings such as `"0.65"`.
fn confidence_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Strip wrapping quotes, flatten newlines and collapse runs of spaces.
fn normalize_brief(brief: &str) -> (String, Option<&'static str>) {
    let mut normalized = brief.trim();
    if normalized.len() >= 2 && normalized.starts_with('"') && normalized.ends_with('"') {
        normalized = &normalized[1..normalized.len() - 1];
    }
    let mut normalized = normalized.replace(['\n', '\r'], " ");
    while normalized.contains("  ") {
        normalized = normalized.replace("  ", " ");
    }
    let normalized = normalized.trim().to_string();

    let warning = (normalized.contains('{') || normalized.contains('}'))
        .then_some("Brief contains curly braces (possible nested JSON)");
    (normalized, warning)
}
