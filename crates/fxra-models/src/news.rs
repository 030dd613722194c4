use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeframe::Timeframe;

/// How much relevant, deduplicated news a provider found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsQuality {
    High,
    Medium,
    Low,
}

impl NewsQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsQuality::High => "HIGH",
            NewsQuality::Medium => "MEDIUM",
            NewsQuality::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Pos,
    Neg,
    Neu,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Pos => "POS",
            Sentiment::Neg => "NEG",
            Sentiment::Neu => "NEU",
        }
    }

    /// Exact-match parse; anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "POS" => Some(Sentiment::Pos),
            "NEG" => Some(Sentiment::Neg),
            "NEU" => Some(Sentiment::Neu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub relevance_score: f64,
    pub query_tag: String,
}

/// Headlines for a symbol plus the analyst's reading of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsDigest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub window_hours: u32,
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
    pub quality: NewsQuality,
    pub quality_reason: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub impact_score: Option<f64>,
    #[serde(default)]
    pub evidence_titles: Vec<String>,
    #[serde(default)]
    pub provider_used: Option<String>,
}

impl NewsDigest {
    /// An empty LOW-quality digest. Providers return this instead of failing.
    pub fn low_quality(symbol: &str, timeframe: Timeframe, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            window_hours: 24,
            articles: vec![],
            quality: NewsQuality::Low,
            quality_reason: reason.into(),
            summary: None,
            sentiment: None,
            impact_score: None,
            evidence_titles: vec![],
            provider_used: None,
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.articles.iter().map(|a| a.title.as_str()).collect()
    }
}
