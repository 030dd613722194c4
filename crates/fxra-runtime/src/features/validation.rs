use std::collections::HashSet;
use std::fmt;

use fxra_models::Candle;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Ok,
    Degraded,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "OK",
            ValidationStatus::Degraded => "DEGRADED",
            ValidationStatus::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub reasons: Vec<String>,
    pub candle_count: usize,
}

/// Check a candle window before computing features.
///
/// INVALID: too few candles, non-positive prices, inconsistent OHLC or
/// timestamps going backwards. DEGRADED: duplicate timestamps, gaps wider
/// than 1.5x the smallest step, or no volume at all.
pub fn validate_candles(candles: &[Candle], min_count: usize) -> ValidationResult {
    let candle_count = candles.len();
    let mut invalid = Vec::new();
    let mut degraded = Vec::new();

    if candle_count < min_count {
        invalid.push(format!(
            "insufficient_candles: expected>={min_count} got={candle_count}"
        ));
    }
    if candle_count == 0 {
        if invalid.is_empty() {
            invalid.push("no_candles".to_string());
        }
        return ValidationResult {
            status: ValidationStatus::Invalid,
            reasons: invalid,
            candle_count,
        };
    }

    let non_positive = candles.iter().any(|c| {
        [c.open, c.high, c.low, c.close]
            .iter()
            .any(|p| *p <= Decimal::ZERO)
    });
    if non_positive {
        invalid.push("non_positive_prices".to_string());
    }
    if candles.iter().any(|c| c.high < c.low) {
        invalid.push("high_less_than_low".to_string());
    }
    if candles.iter().any(|c| c.open < c.low || c.open > c.high) {
        invalid.push("open_outside_range".to_string());
    }
    if candles.iter().any(|c| c.close < c.low || c.close > c.high) {
        invalid.push("close_outside_range".to_string());
    }

    let backwards = candles
        .windows(2)
        .any(|w| w[1].timestamp < w[0].timestamp);
    if backwards {
        invalid.push("timestamps_not_monotonic_non_decreasing".to_string());
    } else {
        let unique: HashSet<_> = candles.iter().map(|c| c.timestamp).collect();
        if unique.len() < candle_count {
            degraded.push("duplicate_timestamps".to_string());
        }

        let steps: Vec<i64> = candles
            .windows(2)
            .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
            .filter(|s| *s > 0)
            .collect();
        if let Some(&expected) = steps.iter().min() {
            if steps.iter().any(|s| *s as f64 > expected as f64 * 1.5) {
                degraded.push("timestamp_gaps_detected".to_string());
            }
        }
    }

    let has_volume = candles
        .iter()
        .any(|c| c.volume.is_some_and(|v| !v.is_zero()));
    if !has_volume {
        degraded.push("volume_missing_or_all_zero".to_string());
    }

    let (status, reasons) = if !invalid.is_empty() {
        (ValidationStatus::Invalid, invalid)
    } else if !degraded.is_empty() {
        (ValidationStatus::Degraded, degraded)
    } else {
        (ValidationStatus::Ok, vec![])
    };
    ValidationResult {
        status,
        reasons,
        candle_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::synthetic_candles;
    use rust_decimal_macros::dec;

    #[test]
    fn clean_series_is_ok() {
        let candles = synthetic_candles(250, 0.0001);
        let result = validate_candles(&candles, 200);
        assert_eq!(result.status, ValidationStatus::Ok, "{:?}", result.reasons);
        assert_eq!(result.candle_count, 250);
    }

    #[test]
    fn too_few_is_invalid() {
        let result = validate_candles(&synthetic_candles(10, 0.0), 200);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.reasons, vec!["insufficient_candles: expected>=200 got=10"]);

        let empty = validate_candles(&[], 0);
        assert_eq!(empty.reasons, vec!["no_candles"]);
    }

    #[test]
    fn broken_ohlc_is_invalid() {
        let mut candles = synthetic_candles(5, 0.0);
        candles[2].high = dec!(0.5);
        let result = validate_candles(&candles, 1);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert!(result.reasons.contains(&"high_less_than_low".to_string()));
        assert!(result.reasons.contains(&"close_outside_range".to_string()));
    }

    #[test]
    fn gaps_and_missing_volume_degrade() {
        let mut candles = synthetic_candles(5, 0.0);
        candles[4].timestamp += chrono::Duration::hours(3);
        for c in &mut candles {
            c.volume = None;
        }
        let result = validate_candles(&candles, 1);
        assert_eq!(result.status, ValidationStatus::Degraded);
        assert_eq!(
            result.reasons,
            vec!["timestamp_gaps_detected", "volume_missing_or_all_zero"]
        );
    }

    #[test]
    fn backwards_timestamps_are_invalid() {
        let mut candles = synthetic_candles(5, 0.0);
        candles.swap(1, 3);
        let result = validate_candles(&candles, 1);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.reasons, vec!["timestamps_not_monotonic_non_decreasing"]);
    }
}
