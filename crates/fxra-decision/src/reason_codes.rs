use fxra_models::DecisionConfig;

use crate::indicators::IndicatorBag;
use crate::scoring::{DecisionScores, FRESH_CROSSOVER_MAX_AGE_BARS, LOW_ATR_PCT};

pub const LOW_VOLATILITY_NO_SQUEEZE: &str = "LOW_VOLATILITY_NO_SQUEEZE";
pub const NO_FRESH_CROSSOVER: &str = "NO_FRESH_CROSSOVER";
pub const WEAK_MOMENTUM: &str = "WEAK_MOMENTUM";
pub const RANGE_STRUCTURE: &str = "RANGE_STRUCTURE";
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT_DATA";
pub const CONFLICT_TREND_STRUCTURE: &str = "CONFLICT_TREND_STRUCTURE";
/// Part of the vocabulary but never emitted; no trigger condition is defined.
pub const BB_MIDZONE: &str = "BB_MIDZONE";
/// Added by the synthesizer when the technical view could not be parsed.
pub const PARSING_FAILED: &str = "PARSING_FAILED";

const MIN_CANDLES: f64 = 200.0;

/// Diagnostic tags explaining a decision, in a fixed order without duplicates.
///
/// Only `indicators` is consulted; `scores` is accepted so callers can pass
/// the pair produced together, but no code is re-derived from it. Thresholds
/// come from `config` when given, else the scoring defaults.
pub fn build_reason_codes(
    indicators: &IndicatorBag,
    _scores: &DecisionScores,
    config: Option<&DecisionConfig>,
) -> Vec<String> {
    let atr_threshold = config.map_or(LOW_ATR_PCT, |c| c.atr_pct_low_threshold);
    let max_age = config.map_or(FRESH_CROSSOVER_MAX_AGE_BARS, |c| {
        c.crossover_max_age_bars as f64
    });

    let mut codes = Vec::new();

    if is_low_volatility_no_squeeze(indicators, atr_threshold) {
        push_once(&mut codes, LOW_VOLATILITY_NO_SQUEEZE);
    }
    let ema_fresh = has_fresh_crossover(
        indicators,
        "ema9_sma50_crossover_type",
        "ema9_sma50_crossover_age_bars",
        max_age,
    );
    let sma_fresh = has_fresh_crossover(
        indicators,
        "sma50_sma200_crossover_type",
        "sma50_sma200_crossover_age_bars",
        max_age,
    );
    if !ema_fresh && !sma_fresh {
        push_once(&mut codes, NO_FRESH_CROSSOVER);
    }
    if is_weak_momentum(indicators) {
        push_once(&mut codes, WEAK_MOMENTUM);
    }
    if indicators.get_upper("structure").as_deref() == Some("RANGE") {
        push_once(&mut codes, RANGE_STRUCTURE);
    }
    if is_insufficient_data(indicators) {
        push_once(&mut codes, INSUFFICIENT_DATA);
    }
    if has_trend_structure_conflict(indicators) {
        push_once(&mut codes, CONFLICT_TREND_STRUCTURE);
    }

    codes
}

/// Append `code` unless it is already present.
pub fn push_once(codes: &mut Vec<String>, code: &str) {
    if !codes.iter().any(|c| c == code) {
        codes.push(code.to_string());
    }
}

fn is_low_volatility_no_squeeze(indicators: &IndicatorBag, threshold: f64) -> bool {
    match (
        indicators.get_f64("atr_pct"),
        indicators.get_f64("bb_squeeze_flag"),
    ) {
        (Some(atr_pct), Some(squeeze)) => atr_pct < threshold && squeeze == 0.0,
        _ => false,
    }
}

fn has_fresh_crossover(
    indicators: &IndicatorBag,
    type_key: &str,
    age_key: &str,
    max_age: f64,
) -> bool {
    match (indicators.get_upper(type_key), indicators.get_f64(age_key)) {
        (Some(kind), Some(age)) if kind != "NONE" => age <= max_age,
        _ => false,
    }
}

fn is_weak_momentum(indicators: &IndicatorBag) -> bool {
    match (indicators.get_f64("roc_5"), indicators.get_f64("roc_20")) {
        (Some(roc_5), Some(roc_20)) => roc_5.abs() < 0.02 && roc_20.abs() < 0.05,
        _ => true,
    }
}

fn is_insufficient_data(indicators: &IndicatorBag) -> bool {
    if indicators
        .get_f64("candle_count_used")
        .is_some_and(|count| count < MIN_CANDLES)
    {
        return true;
    }

    let status = match indicators.get("validation_status") {
        Some(crate::IndicatorValue::Text(s)) => s.trim().to_uppercase(),
        Some(crate::IndicatorValue::Number(n)) => n.to_string(),
        Some(crate::IndicatorValue::Bool(b)) => b.to_string().to_uppercase(),
        None => String::new(),
    };
    matches!(status.as_str(), "DEGRADED" | "INVALID")
        || status.ends_with(".DEGRADED")
        || status.ends_with(".INVALID")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Bullish,
    Bearish,
}

fn direction(value: Option<&str>) -> Option<Direction> {
    match value {
        Some("BULLISH") | Some("GOLDEN") => Some(Direction::Bullish),
        Some("BEARISH") | Some("DEATH") => Some(Direction::Bearish),
        _ => None,
    }
}

fn opposed(a: Option<Direction>, b: Option<Direction>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x != y)
}

/// Trend disagrees with either crossover, the crossovers disagree with each
/// other, or trend disagrees with a non-range structure.
fn has_trend_structure_conflict(indicators: &IndicatorBag) -> bool {
    let trend = direction(indicators.get_upper("trend_direction").as_deref());
    let ema = direction(indicators.get_upper("ema9_sma50_crossover_type").as_deref());
    let sma = direction(indicators.get_upper("sma50_sma200_crossover_type").as_deref());
    let structure = direction(indicators.get_upper("structure").as_deref());

    opposed(trend, ema) || opposed(trend, sma) || opposed(ema, sma) || opposed(trend, structure)
}
