use fxra_models::{Action, DecisionConfig, NewsQuality};

use crate::reason_codes::CONFLICT_TREND_STRUCTURE;
use crate::scoring::DecisionScores;

const NO_TRADE_CONFIDENCE_CAP: f64 = 0.4;
const UNDECIDED_MULTIPLIER: f64 = 0.7;
const CONFLICT_MULTIPLIER: f64 = 0.8;
const WAIT_CONFIDENCE_CAP: f64 = 0.5;

/// Map scores to an action and a calibrated confidence.
///
/// Guards, first match wins:
/// 1. no-trade score above `max_no_trade_score`: WAIT, `min(0.4, c)`
/// 2. bull leads bear by `min_trade_edge`: CALL, `c`
/// 3. bear leads bull by `min_trade_edge`: PUT, `c`
/// 4. otherwise WAIT, `c * 0.7`
///
/// Calibration is then applied in this order: LOW news caps at
/// `max_confidence_when_news_low`, a trend/structure conflict multiplies by
/// 0.8, WAIT caps at 0.5, and the result is clamped to `[0, 1]`.
pub fn decide_action(
    scores: &DecisionScores,
    reason_codes: &[String],
    config: &DecisionConfig,
    technical_confidence: f64,
    news_quality: Option<NewsQuality>,
) -> (Action, f64) {
    let (action, confidence) = if scores.no_trade_score > config.max_no_trade_score {
        (
            Action::Wait,
            NO_TRADE_CONFIDENCE_CAP.min(technical_confidence),
        )
    } else if scores.bull_score - scores.bear_score >= config.min_trade_edge {
        (Action::Call, technical_confidence)
    } else if scores.bear_score - scores.bull_score >= config.min_trade_edge {
        (Action::Put, technical_confidence)
    } else {
        (Action::Wait, technical_confidence * UNDECIDED_MULTIPLIER)
    };

    let calibrated = calibrate(action, confidence, reason_codes, config, news_quality);
    (action, calibrated)
}

fn calibrate(
    action: Action,
    confidence: f64,
    reason_codes: &[String],
    config: &DecisionConfig,
    news_quality: Option<NewsQuality>,
) -> f64 {
    let mut calibrated = confidence;

    if news_quality == Some(NewsQuality::Low) {
        calibrated = calibrated.min(config.max_confidence_when_news_low);
    }
    if reason_codes.iter().any(|c| c == CONFLICT_TREND_STRUCTURE) {
        calibrated *= CONFLICT_MULTIPLIER;
    }
    if action == Action::Wait {
        calibrated = calibrated.min(WAIT_CONFIDENCE_CAP);
    }

    clamp_confidence(calibrated)
}

/// Clamp to `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorBag;
    use crate::reason_codes::build_reason_codes;
    use crate::scoring::calculate_scores;
    use crate::scoring::tests::{bearish_indicators, bullish_indicators};

    fn run_policy(
        indicators: &IndicatorBag,
        direction: &str,
        confidence: f64,
        news: Option<NewsQuality>,
    ) -> (Action, f64) {
        let technical = IndicatorBag::new()
            .with("trend_direction", direction)
            .with("trend_strength", confidence * 100.0);
        let scores = calculate_scores(indicators, Some(&technical));
        let codes = build_reason_codes(indicators, &scores, None);
        decide_action(
            &scores,
            &codes,
            &DecisionConfig::default(),
            confidence,
            news,
        )
    }

    fn scores(bull: f64, bear: f64, no_trade: f64) -> DecisionScores {
        DecisionScores {
            bull_score: bull,
            bear_score: bear,
            no_trade_score: no_trade,
        }
    }

    #[test]
    fn strong_bullish_is_call() {
        let (action, confidence) = run_policy(&bullish_indicators(), "BULLISH", 0.85, None);
        assert_eq!(action, Action::Call);
        assert_eq!(confidence, 0.85);
    }

    #[test]
    fn strong_bearish_is_put() {
        let (action, confidence) = run_policy(&bearish_indicators(), "BEARISH", 0.8, None);
        assert_eq!(action, Action::Put);
        assert_eq!(confidence, 0.8);
    }

    #[test]
    fn quiet_range_waits_at_point_four() {
        let indicators = IndicatorBag::new()
            .with("structure", "RANGE")
            .with("ema9_sma50_crossover_type", "NONE")
            .with("atr_pct", 0.05)
            .with("bb_squeeze_flag", 0.0);
        let (action, confidence) = run_policy(&indicators, "NEUTRAL", 0.9, None);
        assert_eq!(action, Action::Wait);
        assert_eq!(confidence, 0.4);
    }

    #[test]
    fn low_news_caps_but_never_changes_action() {
        let (action, confidence) = run_policy(
            &bullish_indicators(),
            "BULLISH",
            0.85,
            Some(NewsQuality::Low),
        );
        assert_eq!(action, Action::Call);
        assert_eq!(confidence, 0.65);

        let (_, high) = run_policy(
            &bullish_indicators(),
            "BULLISH",
            0.85,
            Some(NewsQuality::High),
        );
        assert_eq!(high, 0.85);
    }

    #[test]
    fn undecided_wait_uses_multiplier_then_cap() {
        let config = DecisionConfig::default();
        let (action, confidence) = decide_action(&scores(30.0, 20.0, 0.0), &[], &config, 0.5, None);
        assert_eq!(action, Action::Wait);
        assert!((confidence - 0.35).abs() < 1e-12);

        let (_, capped) = decide_action(&scores(30.0, 20.0, 0.0), &[], &config, 0.9, None);
        assert_eq!(capped, 0.5);
    }

    #[test]
    fn no_trade_guard_wins_over_edge() {
        let config = DecisionConfig::default();
        let (action, confidence) =
            decide_action(&scores(90.0, 0.0, 41.0), &[], &config, 0.3, None);
        assert_eq!(action, Action::Wait);
        assert_eq!(confidence, 0.3);
    }

    #[test]
    fn edge_is_inclusive() {
        let config = DecisionConfig::default();
        let (action, _) = decide_action(&scores(35.0, 20.0, 40.0), &[], &config, 0.6, None);
        assert_eq!(action, Action::Call);
    }

    #[test]
    fn conflict_dampens_after_news_cap() {
        let config = DecisionConfig::default();
        let codes = vec![CONFLICT_TREND_STRUCTURE.to_string()];
        let (action, confidence) = decide_action(
            &scores(60.0, 10.0, 0.0),
            &codes,
            &config,
            0.9,
            Some(NewsQuality::Low),
        );
        assert_eq!(action, Action::Call);
        assert!((confidence - 0.65 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn thresholds_are_configurable() {
        let config = DecisionConfig {
            min_trade_edge: 50.0,
            ..DecisionConfig::default()
        };
        let (action, _) = decide_action(&scores(60.0, 20.0, 0.0), &[], &config, 0.7, None);
        assert_eq!(action, Action::Wait);

        let strict = DecisionConfig {
            max_no_trade_score: 5.0,
            ..DecisionConfig::default()
        };
        let (action, _) = decide_action(&scores(60.0, 0.0, 10.0), &[], &strict, 0.7, None);
        assert_eq!(action, Action::Wait);
    }

    #[test]
    fn confidence_is_clamped() {
        let config = DecisionConfig::default();
        let (_, high) = decide_action(&scores(60.0, 0.0, 0.0), &[], &config, 1.7, None);
        assert_eq!(high, 1.0);
        let (_, low) = decide_action(&scores(60.0, 0.0, 0.0), &[], &config, -0.2, None);
        assert_eq!(low, 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }
}
