use fxra_models::{Action, Recommendation};
use thiserror::Error;

pub const DISCLAIMER: &str = "Research output only. Not financial advice. Manual execution required.";

/// Matched case-insensitively.
pub const FORBIDDEN_PHRASES: [&str; 3] = ["guaranteed profit", "sure win", "risk-free"];

const FORBIDDEN_CONFIDENCE_CAP: f64 = 0.3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafetyViolation {
    #[error("Invalid action: {0}. Only CALL, PUT, or WAIT are allowed.")]
    InvalidAction(String),

    #[error("Confidence out of range: {0}")]
    ConfidenceOutOfRange(f64),

    #[error("Brief contains forbidden phrase: {0}")]
    ForbiddenPhrase(&'static str),
}

/// Output guard for recommendations. The system only advises; it never
/// promises outcomes.
pub struct SafetyPolicy;

impl SafetyPolicy {
    pub fn validate_action(action: &str) -> Result<Action, SafetyViolation> {
        Action::parse(action).ok_or_else(|| SafetyViolation::InvalidAction(action.to_string()))
    }

    pub fn find_forbidden_phrase(text: &str) -> Option<&'static str> {
        let lower = text.to_ascii_lowercase();
        FORBIDDEN_PHRASES
            .into_iter()
            .find(|phrase| lower.contains(phrase))
    }

    pub fn validate(recommendation: &Recommendation) -> Result<(), SafetyViolation> {
        let confidence = recommendation.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SafetyViolation::ConfidenceOutOfRange(confidence));
        }
        if let Some(phrase) = Self::find_forbidden_phrase(&recommendation.brief) {
            return Err(SafetyViolation::ForbiddenPhrase(phrase));
        }
        Ok(())
    }

    /// Remove forbidden phrases and make sure the disclaimer is present.
    pub fn sanitize(text: &str) -> String {
        let mut sanitized = text.to_string();
        for phrase in FORBIDDEN_PHRASES {
            while let Some(pos) = sanitized.to_ascii_lowercase().find(phrase) {
                sanitized.replace_range(pos..pos + phrase.len(), "");
            }
        }
        while sanitized.contains("  ") {
            sanitized = sanitized.replace("  ", " ");
        }
        let mut sanitized = sanitized.trim().to_string();

        if !sanitized.contains(DISCLAIMER) {
            if !sanitized.is_empty() {
                sanitized.push_str("\n\n");
            }
            sanitized.push_str(DISCLAIMER);
        }
        sanitized
    }

    /// Apply the policy in place. A forbidden phrase forces WAIT with capped
    /// confidence; returns the violation that triggered changes, if any.
    pub fn enforce(recommendation: &mut Recommendation) -> Option<SafetyViolation> {
        let violation = Self::validate(recommendation).err();
        match &violation {
            Some(SafetyViolation::ForbiddenPhrase(_)) => {
                recommendation.action = Action::Wait;
                recommendation.confidence =
                    recommendation.confidence.min(FORBIDDEN_CONFIDENCE_CAP);
            }
            Some(SafetyViolation::ConfidenceOutOfRange(c)) => {
                recommendation.confidence = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
            }
            Some(SafetyViolation::InvalidAction(_)) | None => {}
        }
        recommendation.brief = Self::sanitize(&recommendation.brief);
        violation
    }
}
