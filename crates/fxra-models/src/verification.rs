use serde::{Deserialize, Serialize};

pub const POLICY_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Case-insensitive; anything unrecognised is `Low`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationIssue {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationReport {
    pub passed: bool,
    pub issues: Vec<VerificationIssue>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
    pub policy_version: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl VerificationReport {
    /// A failed report carrying a single `invalid_json` issue.
    pub fn invalid_json(
        message: impl Into<String>,
        evidence: Option<String>,
        suggested_fix: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            issues: vec![VerificationIssue {
                code: "invalid_json".to_string(),
                message: message.into(),
                severity: Severity::High,
                evidence,
            }],
            suggested_fix: Some(suggested_fix.into()),
            policy_version: POLICY_VERSION.to_string(),
            provider_name: None,
            model_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_lenient_parse() {
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::High);
        assert_eq!(Severity::parse_lenient("Medium"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("critical"), Severity::Low);
    }

    #[test]
    fn invalid_json_report() {
        let report = VerificationReport::invalid_json("bad", None, "fix prompts");
        assert!(!report.passed);
        assert_eq!(report.issues[0].code, "invalid_json");
        assert_eq!(report.issues[0].severity, Severity::High);
        assert_eq!(report.policy_version, "1.0");
    }
}
