//! Feature building: candle validation, indicator computation and the
//! snapshot handed to the agents.

pub mod engine;
pub mod math;
pub mod snapshot;
pub mod validation;

pub use engine::{BasicIndicatorEngine, IndicatorEngine};
pub use snapshot::FeatureSnapshot;
pub use validation::{validate_candles, ValidationResult, ValidationStatus};

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{DateTime, Duration, Utc};
    use fxra_models::{Candle, Timeframe};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn price(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap().round_dp(5)
    }

    /// Hourly EURUSD candles drifting by `drift` per bar around a small wave.
    pub fn synthetic_candles(count: usize, drift: f64) -> Vec<Candle> {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut prev_close = 1.08;
        (0..count)
            .map(|i| {
                let close = 1.08 + drift * i as f64 + 0.0005 * (i as f64 / 5.0).sin();
                let open = prev_close;
                prev_close = close;
                Candle {
                    symbol: "EURUSD".to_string(),
                    timeframe: Timeframe::H1,
                    timestamp: start + Duration::hours(i as i64),
                    open: price(open),
                    high: price(open.max(close) + 0.0002),
                    low: price(open.min(close) - 0.0002),
                    close: price(close),
                    volume: Some(dec!(1000)),
                }
            })
            .collect()
    }
}
