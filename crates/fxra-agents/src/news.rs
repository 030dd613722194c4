use std::sync::Arc;

use fxra_models::{LlmResponse, LlmTask, NewsDigest, NewsQuality, Sentiment};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::parser::try_parse_object;
use crate::prompts::{news_system_prompt, news_user_prompt};
use crate::router::LlmRouter;

pub const NOT_ENOUGH_NEWS: &str = "Not enough relevant news";

/// The digest with summary, sentiment and impact filled in.
#[derive(Debug, Clone)]
pub struct NewsAnalysis {
    pub digest: NewsDigest,
    /// `None` when the LLM was skipped.
    pub response: Option<LlmResponse>,
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedNews {
    summary: String,
    sentiment: Sentiment,
    impact_score: f64,
    evidence_titles: Vec<String>,
}

pub struct NewsAnalyst {
    router: Arc<LlmRouter>,
}

impl NewsAnalyst {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self { router }
    }

    pub async fn analyze(&self, mut digest: NewsDigest) -> NewsAnalysis {
        if digest.quality == NewsQuality::Low || digest.articles.is_empty() {
            debug!(
                symbol = %digest.symbol,
                quality = digest.quality.as_str(),
                articles = digest.articles.len(),
                "Skipping news analysis"
            );
            apply_fallback(&mut digest);
            return NewsAnalysis {
                digest,
                response: None,
            };
        }

        let user_prompt = news_user_prompt(&digest.symbol, &digest.articles);
        let response = self
            .router
            .generate(
                LlmTask::NewsAnalysis.as_str(),
                &news_system_prompt(),
                &user_prompt,
            )
            .await;

        let titles: Vec<&str> = digest.titles();
        match parse_news(&response, &titles) {
            Ok(parsed) => {
                digest.summary = Some(parsed.summary);
                digest.sentiment = Some(parsed.sentiment);
                digest.impact_score = Some(parsed.impact_score);
                digest.evidence_titles = parsed.evidence_titles;
                digest.provider_used = Some(response.provider_name.clone());
            }
            Err(reason) => {
                warn!(
                    symbol = %digest.symbol,
                    provider = %response.provider_name,
                    reason = %reason,
                    "News analysis unusable, treating news as absent"
                );
                apply_fallback(&mut digest);
            }
        }

        NewsAnalysis {
            digest,
            response: Some(response),
        }
    }
}

fn apply_fallback(digest: &mut NewsDigest) {
    digest.summary = Some(NOT_ENOUGH_NEWS.to_string());
    digest.sentiment = Some(Sentiment::Neu);
    digest.impact_score = Some(0.0);
    digest.evidence_titles.clear();
}

fn parse_news(response: &LlmResponse, available_titles: &[&str]) -> Result<ParsedNews, String> {
    if let Some(err) = &response.error {
        return Err(format!("LLM error: {err}"));
    }
    let data = try_parse_object(&response.text).map_err(|e| e.to_string())?;

    let summary = match required(&data, "summary")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let sentiment = required(&data, "sentiment")?
        .as_str()
        .and_then(Sentiment::parse)
        .unwrap_or(Sentiment::Neu);
    let impact_score = required(&data, "impact_score")?
        .as_f64()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let evidence_titles = data
        .get("evidence_titles")
        .and_then(Value::as_array)
        .map(|titles| {
            titles
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| available_titles.contains(t))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ParsedNews {
        summary,
        sentiment,
        impact_score,
        evidence_titles,
    })
}

fn required<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a Value, String> {
    data.get(field)
        .ok_or_else(|| format!("LLM response missing '{field}' field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> LlmResponse {
        LlmResponse::success(text, "mock", "m", 1)
    }

    #[test]
    fn parses_and_filters_evidence() {
        let text = r#"{"summary":"ECB on hold","sentiment":"NEG","impact_score":1.7,
            "evidence_titles":["ECB holds rates","Invented headline"]}"#;
        let parsed = parse_news(&ok(text), &["ECB holds rates", "Fed minutes"]).unwrap();
        assert_eq!(parsed.sentiment, Sentiment::Neg);
        assert_eq!(parsed.impact_score, 1.0);
        assert_eq!(parsed.evidence_titles, vec!["ECB holds rates"]);
    }

    #[test]
    fn unknown_sentiment_is_neutral() {
        let text = r#"{"summary":"mixed","sentiment":"bullish","impact_score":0.4}"#;
        let parsed = parse_news(&ok(text), &[]).unwrap();
        assert_eq!(parsed.sentiment, Sentiment::Neu);
        assert!(parsed.evidence_titles.is_empty());
    }

    #[test]
    fn missing_fields_fail() {
        let text = r#"{"summary":"no sentiment","impact_score":0.4}"#;
        assert!(parse_news(&ok(text), &[]).unwrap_err().contains("sentiment"));
        assert!(parse_news(&ok("not json"), &[]).is_err());
    }

    #[test]
    fn fallback_values() {
        let mut digest = NewsDigest::low_quality("EURUSD", fxra_models::Timeframe::H1, "none");
        digest.evidence_titles = vec!["x".into()];
        apply_fallback(&mut digest);
        assert_eq!(digest.summary.as_deref(), Some(NOT_ENOUGH_NEWS));
        assert_eq!(digest.sentiment, Some(Sentiment::Neu));
        assert_eq!(digest.impact_score, Some(0.0));
        assert!(digest.evidence_titles.is_empty());
    }
}
