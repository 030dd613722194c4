use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timeframe::Timeframe;

/// Terminal trading action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Call,
    Put,
    Wait,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Call => "CALL",
            Action::Put => "PUT",
            Action::Wait => "WAIT",
        }
    }

    /// Case-insensitive parse of `CALL`/`PUT`/`WAIT`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CALL" => Some(Action::Call),
            "PUT" => Some(Action::Put),
            "WAIT" => Some(Action::Wait),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: Uuid,
    pub run_id: Option<Uuid>,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub action: Action,
    pub confidence: f64,
    pub brief: String,
    /// Ordered diagnostic tags from the decision policy.
    #[serde(default)]
    pub reason_codes: Vec<String>,
}

impl Recommendation {
    pub fn new(
        symbol: &str,
        timeframe: Timeframe,
        action: Action,
        confidence: f64,
        brief: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: None,
            symbol: symbol.to_string(),
            timestamp: Utc::now(),
            timeframe,
            action,
            confidence,
            brief: brief.into(),
            reason_codes: vec![],
        }
    }
}
