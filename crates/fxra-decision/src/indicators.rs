use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A loosely typed indicator value: a number, a short enum string, or a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl IndicatorValue {
    /// Numeric coercion. Flags become 0/1, numeric strings are parsed, and
    /// NaN/infinite values are treated as absent.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            IndicatorValue::Bool(b) => return Some(if *b { 1.0 } else { 0.0 }),
            IndicatorValue::Number(n) => *n,
            IndicatorValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// Trimmed, uppercased text. Non-text values yield `None`.
    pub fn as_upper(&self) -> Option<String> {
        match self {
            IndicatorValue::Text(s) => Some(s.trim().to_uppercase()),
            _ => None,
        }
    }
}

impl From<f64> for IndicatorValue {
    fn from(v: f64) -> Self {
        IndicatorValue::Number(v)
    }
}

impl From<i64> for IndicatorValue {
    fn from(v: i64) -> Self {
        IndicatorValue::Number(v as f64)
    }
}

impl From<usize> for IndicatorValue {
    fn from(v: usize) -> Self {
        IndicatorValue::Number(v as f64)
    }
}

impl From<bool> for IndicatorValue {
    fn from(v: bool) -> Self {
        IndicatorValue::Bool(v)
    }
}

impl From<&str> for IndicatorValue {
    fn from(v: &str) -> Self {
        IndicatorValue::Text(v.to_string())
    }
}

impl From<String> for IndicatorValue {
    fn from(v: String) -> Self {
        IndicatorValue::Text(v)
    }
}

/// Schema-free mapping of indicator names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorBag(BTreeMap<String, IndicatorValue>);

impl IndicatorBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<IndicatorValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<IndicatorValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&IndicatorValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(IndicatorValue::as_f64)
    }

    pub fn get_upper(&self, key: &str) -> Option<String> {
        self.get(key).and_then(IndicatorValue::as_upper)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndicatorValue)> {
        self.0.iter()
    }

    /// Build from a JSON object. Nulls, arrays and nested objects are skipped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut bag = Self::new();
        if let Some(map) = value.as_object() {
            for (key, v) in map {
                let converted = match v {
                    serde_json::Value::Bool(b) => Some(IndicatorValue::Bool(*b)),
                    serde_json::Value::Number(n) => n.as_f64().map(IndicatorValue::Number),
                    serde_json::Value::String(s) => Some(IndicatorValue::Text(s.clone())),
                    _ => None,
                };
                if let Some(converted) = converted {
                    bag.0.insert(key.clone(), converted);
                }
            }
        }
        bag
    }
}

/// Two-level lookup: a key present in the primary bag always wins, even when
/// its value doesn't coerce; otherwise the secondary bag is consulted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lookup<'a> {
    primary: &'a IndicatorBag,
    secondary: Option<&'a IndicatorBag>,
}

impl<'a> Lookup<'a> {
    pub(crate) fn new(primary: &'a IndicatorBag, secondary: Option<&'a IndicatorBag>) -> Self {
        Self { primary, secondary }
    }

    fn get(&self, key: &str) -> Option<&'a IndicatorValue> {
        match self.primary.get(key) {
            Some(v) => Some(v),
            None => self.secondary.and_then(|bag| bag.get(key)),
        }
    }

    pub(crate) fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(IndicatorValue::as_f64)
    }

    pub(crate) fn upper(&self, key: &str) -> Option<String> {
        self.get(key).and_then(IndicatorValue::as_upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(IndicatorValue::from(true).as_f64(), Some(1.0));
        assert_eq!(IndicatorValue::from(false).as_f64(), Some(0.0));
        assert_eq!(IndicatorValue::from(" 0.25 ").as_f64(), Some(0.25));
        assert_eq!(IndicatorValue::from("abc").as_f64(), None);
        assert_eq!(IndicatorValue::from(f64::NAN).as_f64(), None);
        assert_eq!(IndicatorValue::from(f64::INFINITY).as_f64(), None);
        assert_eq!(IndicatorValue::from("NaN").as_f64(), None);
    }

    #[test]
    fn text_coercion() {
        assert_eq!(
            IndicatorValue::from(" bullish ").as_upper().as_deref(),
            Some("BULLISH")
        );
        assert_eq!(IndicatorValue::from(1.0).as_upper(), None);
    }

    #[test]
    fn primary_key_shadows_secondary_even_when_unusable() {
        let primary = IndicatorBag::new().with("trend_strength", "n/a");
        let secondary = IndicatorBag::new()
            .with("trend_strength", 80.0)
            .with("trend_direction", "BULLISH");
        let lookup = Lookup::new(&primary, Some(&secondary));
        assert_eq!(lookup.f64("trend_strength"), None);
        assert_eq!(lookup.upper("trend_direction").as_deref(), Some("BULLISH"));
    }

    #[test]
    fn from_json_keeps_scalars() {
        let json = serde_json::json!({
            "rsi_14": 55.2,
            "structure": "RANGE",
            "bb_squeeze_flag": false,
            "nested": {"a": 1},
            "missing": null
        });
        let bag = IndicatorBag::from_json(&json);
        assert_eq!(bag.len(), 3);
        assert_eq!(bag.get_f64("rsi_14"), Some(55.2));
        assert_eq!(bag.get_f64("bb_squeeze_flag"), Some(0.0));
        assert!(!bag.contains("nested"));
    }
}
