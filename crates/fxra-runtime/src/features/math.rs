//! Rolling-window series helpers. Undefined points are `NaN`, so every
//! output has the same length as its input.

pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = sum / window as f64;
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = sum / window as f64;
    }
    out
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first value (no bias adjustment).
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            Some(p) => p + alpha * (v - p),
            None => v,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Population standard deviation over a rolling window.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let means = sma(values, window);
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window.saturating_sub(1))..values.len() {
        let mean = means[i];
        if mean.is_nan() {
            continue;
        }
        let var = values[i + 1 - window..=i]
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / window as f64;
        out[i] = var.sqrt();
    }
    out
}

/// Wilder RSI: gains and losses smoothed with `alpha = 1 / window`.
/// Defined once `window` price changes have been seen.
pub fn rsi(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || values.len() < 2 {
        return out;
    }
    let alpha = 1.0 / window as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain += alpha * (gain - avg_gain);
            avg_loss += alpha * (loss - avg_loss);
        }
        if i >= window {
            out[i] = if avg_loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
            };
        }
    }
    out
}

/// Average true range with Wilder smoothing, seeded by the mean of the first
/// `window` true ranges.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<f64> {
    let n = close.len().min(high.len()).min(low.len());
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    let true_range: Vec<f64> = (0..n)
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                range
            } else {
                let prev = close[i - 1];
                range.max((high[i] - prev).abs()).max((low[i] - prev).abs())
            }
        })
        .collect();

    let mut current = true_range[..window].iter().sum::<f64>() / window as f64;
    out[window - 1] = current;
    for i in window..n {
        current = (current * (window as f64 - 1.0) + true_range[i]) / window as f64;
        out[i] = current;
    }
    out
}

/// Least-squares slope of the last `window` defined points, as a percentage
/// of the last point. Zero when undefined.
pub fn normalized_slope(series: &[f64], window: usize) -> f64 {
    if window < 2 {
        return 0.0;
    }
    let tail: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let tail = &tail[tail.len().saturating_sub(window)..];
    if tail.len() < 2 {
        return 0.0;
    }
    let last = tail[tail.len() - 1];
    if last == 0.0 {
        return 0.0;
    }

    let n = tail.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = tail.iter().sum::<f64>() / n;
    let (num, den) = tail
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    let slope = num / den;
    finite_or_zero(slope / last.abs() * 100.0)
}

/// Percent change of the last value against the value `lag` points earlier.
pub fn pct_change(values: &[f64], lag: usize) -> f64 {
    if values.len() <= lag {
        return 0.0;
    }
    let last = values[values.len() - 1];
    let base = values[values.len() - 1 - lag];
    finite_or_zero((last / base - 1.0) * 100.0)
}

/// Difference between the last value and the one `lag` points earlier.
pub fn last_delta(values: &[f64], lag: usize) -> f64 {
    if values.len() <= lag {
        return 0.0;
    }
    finite_or_zero(values[values.len() - 1] - values[values.len() - 1 - lag])
}

pub fn last(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
