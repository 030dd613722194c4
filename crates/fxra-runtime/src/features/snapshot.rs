use chrono::{DateTime, Utc};
use fxra_decision::IndicatorBag;
use fxra_models::{Candle, Timeframe};

use super::validation::ValidationStatus;

/// Candles plus the indicators computed from them, as handed to the agents.
#[derive(Debug, Clone)]
pub struct FeatureSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub candles: Vec<Candle>,
    pub indicators: IndicatorBag,
    pub validation_status: ValidationStatus,
    pub validation_reasons: Vec<String>,
}

impl FeatureSnapshot {
    pub fn last_close(&self) -> f64 {
        self.candles.last().map(Candle::close_f64).unwrap_or(0.0)
    }

    fn number(&self, key: &str) -> f64 {
        self.indicators.get_f64(key).unwrap_or(0.0)
    }

    fn label(&self, key: &str) -> String {
        self.indicators
            .get_upper(key)
            .unwrap_or_else(|| "N/A".to_string())
    }

    /// Markdown summary used as the technical analyst's user prompt.
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("**Current Price:** {:.5}", self.last_close()));

        let rsi = self.number("rsi");
        let rsi_status = if rsi > 70.0 {
            "Overbought"
        } else if rsi < 30.0 {
            "Oversold"
        } else {
            "Neutral"
        };
        lines.push(format!("**RSI:** {rsi:.2} ({rsi_status})"));
        lines.push(format!("**SMA 50:** {:.5}", self.number("sma_50")));
        lines.push(format!("**SMA 200:** {:.5}", self.number("sma_200")));
        lines.push(format!("**EMA 9:** {:.5}", self.number("ema_9")));
        lines.push(format!(
            "**Bollinger Bands:** Upper={:.5}, Middle={:.5}, Lower={:.5}",
            self.number("bb_upper"),
            self.number("bb_middle"),
            self.number("bb_lower"),
        ));
        lines.push(format!("**ATR:** {:.5}", self.number("atr")));

        if self.indicators.contains("trend_direction") {
            lines.push(format!(
                "**Trend:** {} (strength {:.1})",
                self.label("trend_direction"),
                self.number("trend_strength"),
            ));
        }
        if self.indicators.contains("structure") {
            lines.push(format!("**Market Structure:** {}", self.label("structure")));
        }
        for (title, prefix) in [
            ("EMA9/SMA50 Crossover", "ema9_sma50"),
            ("SMA50/SMA200 Crossover", "sma50_sma200"),
        ] {
            let type_key = format!("{prefix}_crossover_type");
            if self.indicators.contains(&type_key) {
                let kind = self.label(&type_key);
                let age = self.number(&format!("{prefix}_crossover_age_bars"));
                if kind == "NONE" {
                    lines.push(format!("**{title}:** NONE"));
                } else {
                    lines.push(format!("**{title}:** {kind} ({age:.0} bars ago)"));
                }
            }
        }

        if self.validation_status != ValidationStatus::Ok {
            lines.push(format!(
                "**Data Quality:** {} ({})",
                self.validation_status,
                self.validation_reasons.join(", ")
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::synthetic_candles;

    fn snapshot(indicators: IndicatorBag) -> FeatureSnapshot {
        FeatureSnapshot {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            timestamp: Utc::now(),
            candles: synthetic_candles(3, 0.0),
            indicators,
            validation_status: ValidationStatus::Ok,
            validation_reasons: vec![],
        }
    }

    #[test]
    fn markdown_core_lines() {
        let snap = snapshot(
            IndicatorBag::new()
                .with("rsi", 75.0)
                .with("sma_50", 1.08)
                .with("atr", 0.0012),
        );
        let md = snap.to_markdown();
        assert!(md.starts_with("**Current Price:** "));
        assert!(md.contains("**RSI:** 75.00 (Overbought)"));
        assert!(md.contains("**SMA 50:** 1.08000"));
        assert!(md.contains("**ATR:** 0.00120"));
        assert!(!md.contains("Trend"));
        assert!(!md.contains("Data Quality"));
    }

    #[test]
    fn markdown_signals_and_quality() {
        let mut snap = snapshot(
            IndicatorBag::new()
                .with("trend_direction", "BULLISH")
                .with("trend_strength", 55.0)
                .with("structure", "RANGE")
                .with("ema9_sma50_crossover_type", "BULLISH")
                .with("ema9_sma50_crossover_age_bars", 3.0)
                .with("sma50_sma200_crossover_type", "NONE")
                .with("sma50_sma200_crossover_age_bars", -1.0),
        );
        snap.validation_status = ValidationStatus::Degraded;
        snap.validation_reasons = vec!["volume_missing_or_all_zero".to_string()];

        let md = snap.to_markdown();
        assert!(md.contains("**Trend:** BULLISH (strength 55.0)"));
        assert!(md.contains("**Market Structure:** RANGE"));
        assert!(md.contains("**EMA9/SMA50 Crossover:** BULLISH (3 bars ago)"));
        assert!(md.contains("**SMA50/SMA200 Crossover:** NONE"));
        assert!(md.contains("**Data Quality:** DEGRADED (volume_missing_or_all_zero)"));
    }
}
