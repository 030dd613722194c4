use fxra_decision::IndicatorBag;
use fxra_models::Candle;

use super::math::{
    atr, ema, finite_or_zero, last, last_delta, normalized_slope, pct_change, rolling_std, rsi,
    sma,
};
use crate::error::RuntimeError;

/// Percent bandwidth below which the Bollinger bands count as squeezed.
pub const BB_SQUEEZE_BANDWIDTH_PCT: f64 = 0.2;

/// Turns a candle window into an indicator bag.
pub trait IndicatorEngine: Send + Sync {
    fn name(&self) -> &str;

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorBag, RuntimeError>;
}

/// Moving averages, RSI, Bollinger bands, ATR, crossovers, trend and swing
/// structure computed from closes, highs and lows.
#[derive(Debug, Clone)]
pub struct BasicIndicatorEngine {
    pub min_candles: usize,
    pub crossover_lookback: usize,
    pub swing_depth: usize,
    pub slope_window: usize,
}

impl Default for BasicIndicatorEngine {
    fn default() -> Self {
        Self {
            min_candles: 200,
            crossover_lookback: 50,
            swing_depth: 5,
            slope_window: 10,
        }
    }
}

struct Series {
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

impl Series {
    fn from_candles(candles: &[Candle]) -> Self {
        Self {
            open: candles.iter().map(Candle::open_f64).collect(),
            high: candles.iter().map(Candle::high_f64).collect(),
            low: candles.iter().map(Candle::low_f64).collect(),
            close: candles.iter().map(Candle::close_f64).collect(),
        }
    }
}

impl IndicatorEngine for BasicIndicatorEngine {
    fn name(&self) -> &str {
        "basic"
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorBag, RuntimeError> {
        if candles.len() < self.min_candles {
            return Err(RuntimeError::Features(format!(
                "Need at least {} candles to calculate all indicators, got {}",
                self.min_candles,
                candles.len()
            )));
        }
        let s = Series::from_candles(candles);
        let close = last(&s.close)
            .ok_or_else(|| RuntimeError::Features("last close is not a number".to_string()))?;

        let sma_50 = sma(&s.close, 50);
        let sma_200 = sma(&s.close, 200);
        let ema_9 = ema(&s.close, 9);
        let rsi_14 = rsi(&s.close, 14);
        let bb_middle = sma(&s.close, 20);
        let bb_std = rolling_std(&s.close, 20);
        let atr_14 = atr(&s.high, &s.low, &s.close, 14);

        let mut bag = IndicatorBag::new();
        let base = [
            ("sma_50", last(&sma_50)),
            ("sma_200", last(&sma_200)),
            ("ema_9", last(&ema_9)),
            ("rsi", last(&rsi_14)),
            ("bb_middle", last(&bb_middle)),
            ("atr", last(&atr_14)),
        ];
        for (key, value) in base {
            let value = value.ok_or_else(|| {
                RuntimeError::Features(format!("indicator {key} is undefined"))
            })?;
            bag.insert(key, value);
        }
        let middle = last(&bb_middle).unwrap_or(0.0);
        let dev = last(&bb_std).unwrap_or(0.0);
        let (bb_upper, bb_lower) = (middle + 2.0 * dev, middle - 2.0 * dev);
        bag.insert("bb_upper", bb_upper);
        bag.insert("bb_lower", bb_lower);

        let open = s.open[s.open.len() - 1];
        let high = s.high[s.high.len() - 1];
        let low = s.low[s.low.len() - 1];
        bag.insert("price_change_pct_1", pct_change(&s.close, 1));
        bag.insert("price_change_pct_5", pct_change(&s.close, 5));
        bag.insert("price_change_pct_20", pct_change(&s.close, 20));
        bag.insert("range_pct", finite_or_zero((high - low) / close * 100.0));
        bag.insert("body_pct", finite_or_zero((open - close).abs() / close * 100.0));

        bag.insert("roc_5", pct_change(&s.close, 5));
        bag.insert("roc_20", pct_change(&s.close, 20));
        bag.insert("rsi_delta_1", last_delta(&rsi_14, 1));
        bag.insert("rsi_delta_5", last_delta(&rsi_14, 5));

        let sma50_slope = normalized_slope(&sma_50, self.slope_window);
        let sma200_slope = normalized_slope(&sma_200, self.slope_window);
        bag.insert("sma50_slope_pct", sma50_slope);
        bag.insert("sma200_slope_pct", sma200_slope);
        bag.insert("ema9_slope_pct", normalized_slope(&ema_9, self.slope_window));

        let (kind, age) = last_crossover(&ema_9, &sma_50, self.crossover_lookback, ("BULLISH", "BEARISH"));
        bag.insert("ema9_sma50_crossover_type", kind);
        bag.insert("ema9_sma50_crossover_age_bars", age);
        let (kind, age) = last_crossover(&sma_50, &sma_200, self.crossover_lookback, ("GOLDEN", "DEATH"));
        bag.insert("sma50_sma200_crossover_type", kind);
        bag.insert("sma50_sma200_crossover_age_bars", age);

        let sma_50_last = last(&sma_50).unwrap_or(0.0);
        let sma_200_last = last(&sma_200).unwrap_or(0.0);
        let (direction, strength) =
            detect_trend(close, sma_50_last, sma_200_last, sma50_slope, sma200_slope);
        bag.insert("trend_direction", direction);
        bag.insert("trend_strength", strength);

        let swings = swing_points(&s.high, &s.low, self.swing_depth);
        let (structure, structure_confidence) = classify_structure(&swings);
        bag.insert("structure", structure);
        bag.insert("structure_confidence", structure_confidence);

        bag.insert("dist_sma50_pct", distance_pct(close, sma_50_last));
        bag.insert("dist_sma200_pct", distance_pct(close, sma_200_last));
        bag.insert("dist_ema9_pct", distance_pct(close, last(&ema_9).unwrap_or(0.0)));

        for (key, value) in band_metrics(close, bb_upper, middle, bb_lower, last(&atr_14)) {
            bag.insert(key, value);
        }

        Ok(bag)
    }
}

fn distance_pct(close: f64, average: f64) -> f64 {
    if average == 0.0 {
        return 0.0;
    }
    finite_or_zero((close - average) / average * 100.0)
}

/// `bb_position` (alias `bb_percent_b`), bandwidth, squeeze flag and ATR as a
/// percentage of price.
fn band_metrics(
    close: f64,
    upper: f64,
    middle: f64,
    lower: f64,
    atr: Option<f64>,
) -> [(&'static str, f64); 5] {
    let position = if upper > lower {
        ((close - lower) / (upper - lower)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bandwidth = if middle != 0.0 {
        finite_or_zero((upper - lower) / middle * 100.0)
    } else {
        0.0
    };
    let atr_pct = match atr {
        Some(a) if a > 0.0 && close != 0.0 => finite_or_zero(a / close * 100.0),
        _ => 0.0,
    };
    let squeeze = if bandwidth < BB_SQUEEZE_BANDWIDTH_PCT { 1.0 } else { 0.0 };
    [
        ("bb_position", position),
        ("bb_percent_b", position),
        ("bb_bandwidth_pct", bandwidth),
        ("bb_squeeze_flag", squeeze),
        ("atr_pct", atr_pct),
    ]
}

/// The most recent sign change of `a - b` within the last `lookback` defined
/// bars, and its age in bars. `("NONE", -1)` when there is none.
pub fn last_crossover(
    a: &[f64],
    b: &[f64],
    lookback: usize,
    labels: (&'static str, &'static str),
) -> (&'static str, i64) {
    const NONE: (&str, i64) = ("NONE", -1);
    if lookback == 0 {
        return NONE;
    }
    let diff: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let Some(last_valid) = diff.iter().rposition(|d| d.is_finite()) else {
        return NONE;
    };
    let start = (last_valid + 1).saturating_sub(lookback);

    let mut prev_sign: Option<f64> = None;
    let mut latest: Option<(usize, &'static str)> = None;
    for (i, d) in diff.iter().enumerate().take(last_valid + 1).skip(start) {
        let sign = if d.is_finite() && *d != 0.0 {
            Some(d.signum())
        } else {
            prev_sign
        };
        match (prev_sign, sign) {
            (Some(p), Some(c)) if p < 0.0 && c > 0.0 => latest = Some((i, labels.0)),
            (Some(p), Some(c)) if p > 0.0 && c < 0.0 => latest = Some((i, labels.1)),
            _ => {}
        }
        prev_sign = sign;
    }

    match latest {
        Some((index, kind)) => (kind, (last_valid - index) as i64),
        None => NONE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub kind: SwingKind,
    pub price: f64,
}

/// Bars whose high (low) is strictly above (below) every neighbour within
/// `depth` bars on both sides. Returned in index order.
pub fn swing_points(high: &[f64], low: &[f64], depth: usize) -> Vec<SwingPoint> {
    let n = high.len().min(low.len());
    let mut swings = Vec::new();
    if depth == 0 || n < 2 * depth + 1 {
        return swings;
    }
    for i in depth..n - depth {
        let neighbours = (i - depth..=i + depth).filter(|j| *j != i);
        if neighbours.clone().all(|j| high[i] > high[j]) {
            swings.push(SwingPoint {
                index: i,
                kind: SwingKind::High,
                price: high[i],
            });
        }
        if neighbours.clone().all(|j| low[i] < low[j]) {
            swings.push(SwingPoint {
                index: i,
                kind: SwingKind::Low,
                price: low[i],
            });
        }
    }
    swings
}

/// Higher highs and higher lows are BULLISH, lower highs and lower lows
/// BEARISH, anything else RANGE. Confidence is 0 without two swings of each
/// kind, 40 for RANGE, else 60 plus up to 40 from the swing deltas.
pub fn classify_structure(swings: &[SwingPoint]) -> (&'static str, f64) {
    let highs: Vec<f64> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::High)
        .map(|s| s.price)
        .collect();
    let lows: Vec<f64> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::Low)
        .map(|s| s.price)
        .collect();
    if highs.len() < 2 || lows.len() < 2 {
        return ("RANGE", 0.0);
    }
    let (prev_high, last_high) = (highs[highs.len() - 2], highs[highs.len() - 1]);
    let (prev_low, last_low) = (lows[lows.len() - 2], lows[lows.len() - 1]);
    if ![prev_high, last_high, prev_low, last_low]
        .iter()
        .all(|v| v.is_finite())
    {
        return ("RANGE", 0.0);
    }

    let structure = if last_high > prev_high && last_low > prev_low {
        "BULLISH"
    } else if last_high < prev_high && last_low < prev_low {
        "BEARISH"
    } else {
        return ("RANGE", 40.0);
    };

    let delta = |prev: f64, last: f64| {
        if prev == 0.0 {
            0.0
        } else {
            (last - prev).abs() / prev.abs() * 100.0
        }
    };
    let score = (delta(prev_high, last_high) + delta(prev_low, last_low)) * 2.0;
    (structure, (60.0 + score.min(40.0)).clamp(0.0, 100.0))
}

/// Direction from price and MA alignment plus MA slopes; strength from the
/// slope magnitudes, capped at 40 when NEUTRAL.
pub fn detect_trend(
    close: f64,
    sma_50: f64,
    sma_200: f64,
    sma50_slope_pct: f64,
    sma200_slope_pct: f64,
) -> (&'static str, f64) {
    let inputs = [close, sma_50, sma_200, sma50_slope_pct, sma200_slope_pct];
    if sma_50 == 0.0 || sma_200 == 0.0 || !inputs.iter().all(|v| v.is_finite()) {
        return ("NEUTRAL", 0.0);
    }

    let direction = if close > sma_200 && sma_50 > sma_200 && sma50_slope_pct > 0.0 && sma200_slope_pct > 0.0 {
        "BULLISH"
    } else if close < sma_200 && sma_50 < sma_200 && sma50_slope_pct < 0.0 && sma200_slope_pct < 0.0 {
        "BEARISH"
    } else {
        "NEUTRAL"
    };

    let mut strength = ((sma50_slope_pct.abs() + sma200_slope_pct.abs()) * 100.0).min(100.0);
    if direction == "NEUTRAL" {
        strength = strength.min(40.0);
    }
    (direction, strength.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::synthetic_candles;

    #[test]
    fn rejects_short_windows() {
        let engine = BasicIndicatorEngine::default();
        let err = engine.compute(&synthetic_candles(150, 0.0001)).unwrap_err();
        assert!(err.to_string().contains("Need at least 200 candles"));
    }

    #[test]
    fn uptrend_produces_bullish_bag() {
        let engine = BasicIndicatorEngine::default();
        let bag = engine.compute(&synthetic_candles(300, 0.0002)).unwrap();

        assert_eq!(bag.get_upper("trend_direction").as_deref(), Some("BULLISH"));
        assert!(bag.get_f64("trend_strength").unwrap() > 0.0);
        assert!(bag.get_f64("dist_sma200_pct").unwrap() > 0.0);
        assert!(bag.get_f64("roc_20").unwrap() > 0.0);
        let rsi = bag.get_f64("rsi").unwrap();
        assert!((0.0..=100.0).contains(&rsi));
        assert!(bag.get_f64("atr_pct").unwrap() > 0.0);
        for key in [
            "sma_50",
            "sma_200",
            "ema_9",
            "bb_upper",
            "bb_lower",
            "bb_bandwidth_pct",
            "bb_squeeze_flag",
            "rsi_delta_1",
            "rsi_delta_5",
            "roc_5",
            "ema9_sma50_crossover_age_bars",
            "sma50_sma200_crossover_age_bars",
            "structure_confidence",
        ] {
            assert!(bag.get_f64(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn downtrend_is_bearish() {
        let engine = BasicIndicatorEngine::default();
        let bag = engine.compute(&synthetic_candles(300, -0.0002)).unwrap();
        assert_eq!(bag.get_upper("trend_direction").as_deref(), Some("BEARISH"));
        assert!(bag.get_f64("dist_sma200_pct").unwrap() < 0.0);
    }

    #[test]
    fn crossover_type_and_age() {
        let a = [1.0, 1.0, 3.0, 3.0, 3.0];
        let b = [2.0, 2.0, 2.0, 2.0, 2.0];
        assert_eq!(last_crossover(&a, &b, 50, ("BULLISH", "BEARISH")), ("BULLISH", 2));

        let a = [3.0, 2.0, 2.0, 1.0];
        let b = [2.0; 4];
        // The touch at zero carries the previous sign forward.
        assert_eq!(last_crossover(&a, &b, 50, ("GOLDEN", "DEATH")), ("DEATH", 0));

        assert_eq!(last_crossover(&a, &b, 2, ("GOLDEN", "DEATH")), ("NONE", -1));
        assert_eq!(
            last_crossover(&[f64::NAN; 3], &[1.0; 3], 50, ("GOLDEN", "DEATH")),
            ("NONE", -1)
        );
    }

    #[test]
    fn swings_are_strict_extremes() {
        let high = [1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 2.0];
        let low = [0.5, 0.4, 0.6, 0.3, 0.5, 0.6, 0.6];
        let swings = swing_points(&high, &low, 2);
        assert_eq!(
            swings,
            vec![
                SwingPoint { index: 2, kind: SwingKind::High, price: 5.0 },
                SwingPoint { index: 3, kind: SwingKind::Low, price: 0.3 },
            ]
        );
    }

    #[test]
    fn structure_classification() {
        let swing = |index, kind, price| SwingPoint { index, kind, price };
        let bullish = [
            swing(1, SwingKind::High, 1.10),
            swing(2, SwingKind::Low, 1.00),
            swing(3, SwingKind::High, 1.12),
            swing(4, SwingKind::Low, 1.02),
        ];
        let (kind, confidence) = classify_structure(&bullish);
        assert_eq!(kind, "BULLISH");
        assert!(confidence > 60.0 && confidence <= 100.0);

        let mixed = [
            swing(1, SwingKind::High, 1.10),
            swing(2, SwingKind::Low, 1.00),
            swing(3, SwingKind::High, 1.12),
            swing(4, SwingKind::Low, 0.98),
        ];
        assert_eq!(classify_structure(&mixed), ("RANGE", 40.0));
        assert_eq!(classify_structure(&bullish[..3]), ("RANGE", 0.0));
    }

    #[test]
    fn trend_rules() {
        assert_eq!(detect_trend(1.2, 1.1, 1.0, 0.1, 0.05).0, "BULLISH");
        assert_eq!(detect_trend(0.9, 0.95, 1.0, -0.1, -0.05).0, "BEARISH");
        let (direction, strength) = detect_trend(1.2, 1.1, 1.0, 0.5, -0.5);
        assert_eq!(direction, "NEUTRAL");
        assert_eq!(strength, 40.0);
        assert_eq!(detect_trend(1.0, 0.0, 1.0, 0.1, 0.1), ("NEUTRAL", 0.0));
    }

    #[test]
    fn band_metrics_squeeze() {
        let metrics = band_metrics(1.0, 1.0005, 1.0, 0.9995, Some(0.001));
        let get = |k: &str| metrics.iter().find(|(key, _)| *key == k).map(|(_, v)| *v);
        assert_eq!(get("bb_squeeze_flag"), Some(1.0));
        assert!((get("bb_position").unwrap() - 0.5).abs() < 1e-9);
        assert!((get("atr_pct").unwrap() - 0.1).abs() < 1e-9);
    }
}
