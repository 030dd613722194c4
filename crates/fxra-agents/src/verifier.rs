use std::sync::Arc;

use fxra_models::verification::POLICY_VERSION;
use fxra_models::{LlmResponse, LlmTask, Severity, VerificationIssue, VerificationReport};
use serde_json::Value;
use tracing::{debug, warn};

use crate::parser::try_parse_object;
use crate::prompts::{verifier_system_prompt, verifier_user_prompt};
use crate::router::LlmRouter;

const EVIDENCE_MAX_CHARS: usize = 200;

/// Second-opinion check of another agent's output.
pub struct Verifier {
    router: Arc<LlmRouter>,
}

impl Verifier {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self { router }
    }

    pub async fn verify(
        &self,
        task: &str,
        inputs_summary: &str,
        author_output: &str,
    ) -> (VerificationReport, LlmResponse) {
        let user_prompt = verifier_user_prompt(task, inputs_summary, author_output);
        let response = self
            .router
            .generate(
                LlmTask::Verification.as_str(),
                &verifier_system_prompt(),
                &user_prompt,
            )
            .await;

        let report = parse_report(&response);
        if report.passed {
            debug!(task, provider = %response.provider_name, "Verification passed");
        } else {
            warn!(
                task,
                provider = %response.provider_name,
                issues = report.issues.len(),
                "Verification failed"
            );
        }
        (report, response)
    }
}

/// Build a report from the verifier's output. Never fails: unusable output
/// becomes a failed report with an `invalid_json` issue.
pub fn parse_report(response: &LlmResponse) -> VerificationReport {
    let mut report = match &response.error {
        Some(err) => VerificationReport::invalid_json(
            "Verifier LLM call failed",
            Some(evidence(err)),
            "Check verifier provider availability and routing.",
        ),
        None => report_from_text(&response.text),
    };
    report.provider_name = Some(response.provider_name.clone());
    report.model_name = Some(response.model_name.clone());
    report
}

fn report_from_text(text: &str) -> VerificationReport {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if !value.is_object() {
            return VerificationReport::invalid_json(
                "LLM response is not a JSON object",
                Some(evidence(text)),
                "Verifier must return a JSON object",
            );
        }
    }

    let data = match try_parse_object(text) {
        Ok(data) => data,
        Err(_) => {
            return VerificationReport::invalid_json(
                "Failed to parse LLM response as JSON",
                Some(evidence(text)),
                "LLM verifier returned invalid JSON. Check verifier prompts and model capabilities.",
            )
        }
    };

    let issues = data
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(issue_from_value).collect())
        .unwrap_or_default();

    VerificationReport {
        passed: data.get("passed").and_then(Value::as_bool).unwrap_or(false),
        issues,
        suggested_fix: data
            .get("suggested_fix")
            .and_then(Value::as_str)
            .map(str::to_string),
        policy_version: data
            .get("policy_version")
            .and_then(Value::as_str)
            .unwrap_or(POLICY_VERSION)
            .to_string(),
        provider_name: None,
        model_name: None,
    }
}

fn issue_from_value(value: &Value) -> Option<VerificationIssue> {
    let issue = value.as_object()?;
    let text = |key: &str| issue.get(key).and_then(Value::as_str);
    Some(VerificationIssue {
        code: text("code").unwrap_or("unknown").to_string(),
        message: text("message").unwrap_or_default().to_string(),
        severity: text("severity").map_or(Severity::Low, Severity::parse_lenient),
        evidence: text("evidence").map(str::to_string),
    })
}

fn evidence(text: &str) -> String {
    text.chars().take(EVIDENCE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> LlmResponse {
        LlmResponse::success(text, "deepseek", "deepseek-chat", 12)
    }

    #[test]
    fn parses_report_with_defaults() {
        let text = r#"{"passed": false, "issues": [
            {"code": "unsupported_claim", "message": "Mentions CPI", "severity": "HIGH"},
            {"message": "odd", "severity": "catastrophic"},
            "not an object"
        ], "suggested_fix": "Remove CPI reference"}"#;
        let report = parse_report(&ok(text));
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].severity, Severity::High);
        assert_eq!(report.issues[1].code, "unknown");
        assert_eq!(report.issues[1].severity, Severity::Low);
        assert_eq!(report.policy_version, "1.0");
        assert_eq!(report.provider_name.as_deref(), Some("deepseek"));
        assert_eq!(report.model_name.as_deref(), Some("deepseek-chat"));
    }

    #[test]
    fn invalid_json_report() {
        let report = parse_report(&ok("Looks fine to me!"));
        assert!(!report.passed);
        assert_eq!(report.issues[0].code, "invalid_json");
        assert_eq!(report.issues[0].message, "Failed to parse LLM response as JSON");
        assert_eq!(report.issues[0].evidence.as_deref(), Some("Looks fine to me!"));
    }

    #[test]
    fn non_object_report() {
        let report = parse_report(&ok("[true]"));
        assert_eq!(report.issues[0].message, "LLM response is not a JSON object");
        assert_eq!(
            report.suggested_fix.as_deref(),
            Some("Verifier must return a JSON object")
        );
    }

    #[test]
    fn passed_report() {
        let report = parse_report(&ok(r#"{"passed": true, "issues": [], "policy_version": "1.1"}"#));
        assert!(report.passed);
        assert!(report.issues.is_empty());
        assert_eq!(report.policy_version, "1.1");
    }

    #[test]
    fn llm_error_fails_report() {
        let resp = LlmResponse::failure("ollama_local", "llama3", "connection refused", 3, 2);
        let report = parse_report(&resp);
        assert!(!report.passed);
        assert_eq!(report.issues[0].evidence.as_deref(), Some("connection refused"));
    }
}
