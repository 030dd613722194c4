use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::timeframe::Timeframe;

/// One OHLCV bar for a symbol/timeframe/timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

impl Candle {
    pub fn open_f64(&self) -> f64 {
        self.open.to_f64().unwrap_or(f64::NAN)
    }

    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(f64::NAN)
    }

    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(f64::NAN)
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn sample_candle() -> Candle {
        Candle {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            timestamp: "2024-03-01T10:00:00Z".parse().unwrap(),
            open: dec!(1.08410),
            high: dec!(1.08520),
            low: dec!(1.08390),
            close: dec!(1.08500),
            volume: None,
        }
    }

    #[test]
    fn prices_convert_to_f64() {
        let candle = sample_candle();
        assert!((candle.close_f64() - 1.085).abs() < 1e-12);
        assert!(candle.high_f64() > candle.low_f64());
    }

    #[test]
    fn decimal_prices_serialize_as_strings() {
        let json = serde_json::to_value(sample_candle()).unwrap();
        assert_eq!(json["close"], "1.08500");
        assert_eq!(json["timeframe"], "1h");
        let back: Candle = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_candle());
    }
}
