use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorBag, Lookup};

/// Crossovers older than this many bars are not considered fresh.
pub const FRESH_CROSSOVER_MAX_AGE_BARS: f64 = 10.0;
/// ATR as a percentage of price below which the market is considered quiet.
pub const LOW_ATR_PCT: f64 = 0.08;

const MAX_SCORE: f64 = 100.0;

/// Three independent evidence accumulators, each clamped to `[0, 100]`.
/// They are not normalized and need not sum to anything in particular.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionScores {
    pub bull_score: f64,
    pub bear_score: f64,
    pub no_trade_score: f64,
}

/// Additive point scoring over an indicator bag.
///
/// `technical` is a fallback source for the same keys (typically the
/// technical analyst's `trend_direction`/`trend_strength`). Keys present in
/// `indicators` always win. Values that fail coercion contribute nothing.
pub fn calculate_scores(
    indicators: &IndicatorBag,
    technical: Option<&IndicatorBag>,
) -> DecisionScores {
    let lookup = Lookup::new(indicators, technical);
    let mut bull = 0.0;
    let mut bear = 0.0;
    let mut no_trade = 0.0;

    let strength_bonus = || {
        let strength = lookup.f64("trend_strength").unwrap_or(0.0).max(0.0);
        (strength * 0.2).min(20.0)
    };
    match lookup.upper("trend_direction").as_deref() {
        Some("BULLISH") => bull += 20.0 + strength_bonus(),
        Some("BEARISH") => bear += 20.0 + strength_bonus(),
        Some("NEUTRAL") => no_trade += 10.0,
        _ => {}
    }

    match lookup.upper("structure").as_deref() {
        Some("BULLISH") => bull += 15.0,
        Some("BEARISH") => bear += 15.0,
        Some("RANGE") => no_trade += 10.0,
        _ => {}
    }

    if let Some(dist) = lookup.f64("dist_sma200_pct") {
        if dist > 0.0 {
            bull += 10.0;
        } else {
            bear += 10.0;
        }
    }

    let crossover_age = lookup.f64("ema9_sma50_crossover_age_bars");
    let fresh = crossover_age.is_some_and(|age| age <= FRESH_CROSSOVER_MAX_AGE_BARS);
    match lookup.upper("ema9_sma50_crossover_type").as_deref() {
        Some("NONE") => no_trade += 5.0,
        Some("BULLISH") if fresh => bull += 10.0,
        Some("BEARISH") if fresh => bear += 10.0,
        _ => {}
    }

    if let Some(roc_5) = lookup.f64("roc_5") {
        if roc_5 > 0.0 {
            bull += 5.0;
        } else if roc_5 < 0.0 {
            bear += 5.0;
        }
    }

    if let (Some(d1), Some(d5)) = (lookup.f64("rsi_delta_1"), lookup.f64("rsi_delta_5")) {
        if d1 > 0.0 && d5 > 0.0 {
            bull += 5.0;
        } else if d1 < 0.0 && d5 < 0.0 {
            bear += 5.0;
        } else {
            no_trade += 5.0;
        }
    }

    if let (Some(atr_pct), Some(squeeze)) = (lookup.f64("atr_pct"), lookup.f64("bb_squeeze_flag"))
    {
        if atr_pct < LOW_ATR_PCT && squeeze == 0.0 {
            no_trade += 20.0;
        }
    }

    DecisionScores {
        bull_score: clamp_score(bull),
        bear_score: clamp_score(bear),
        no_trade_score: clamp_score(no_trade),
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, MAX_SCORE)
}
