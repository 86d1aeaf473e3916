//! Native versions of the indicator formulas emitted into the generated
//! Python class.
//!
//! Each function reproduces the numeric behaviour of the pandas expression it
//! mirrors, including where NaN appears, so a preview run in Rust agrees with
//! the generated code bar for bar.

use crate::models::candle::Candle;
use crate::models::script::IndicatorKind;

/// Output of an indicator computation. Multi-output indicators use secondary/tertiary.
#[derive(Debug, Clone)]
pub struct IndicatorOutput {
    /// Primary output (EMA/SMA/RSI values, MACD line).
    pub primary: Vec<f64>,
    /// MACD signal line.
    pub secondary: Option<Vec<f64>>,
    /// MACD histogram.
    pub tertiary: Option<Vec<f64>>,
}

impl IndicatorOutput {
    fn single(primary: Vec<f64>) -> Self {
        Self {
            primary,
            secondary: None,
            tertiary: None,
        }
    }
}

/// MACD fast/slow/signal spans used by the generated code.
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Compute an indicator over the close column.
///
/// `window` is ignored for MACD, which always uses 12/26/9.
pub fn compute_indicator(kind: IndicatorKind, window: usize, candles: &[Candle]) -> IndicatorOutput {
    let close: Vec<f64> = candles.iter().map(|c| c.close).collect();

    match kind {
        IndicatorKind::Ema => IndicatorOutput::single(ema(&close, window)),
        IndicatorKind::Sma => IndicatorOutput::single(sma(&close, window)),
        IndicatorKind::Rsi => IndicatorOutput::single(rsi(&close, window)),
        IndicatorKind::Macd => {
            let (line, signal, histogram) = macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
            IndicatorOutput {
                primary: line,
                secondary: Some(signal),
                tertiary: Some(histogram),
            }
        }
    }
}

// ── SMA ──

/// `series.rolling(window=period).mean()`.
///
/// The first `period-1` values are NaN, as is any window containing a NaN.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let len = data.len();
    let mut result = vec![f64::NAN; len];
    if period == 0 || len < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &value) in data.iter().enumerate() {
        if value.is_nan() {
            nan_count += 1;
        } else {
            sum += value;
        }
        if i >= period {
            let leaving = data[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

// ── EMA ──

/// `series.ewm(span=span).mean()` with pandas' default `adjust=True`.
///
/// Every bar gets a value once the first observation is seen; there is no
/// SMA seed. NaN inputs decay the weights without contributing.
pub fn ema(data: &[f64], span: usize) -> Vec<f64> {
    let len = data.len();
    let mut result = vec![f64::NAN; len];
    if span == 0 {
        return result;
    }

    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    let mut seen = false;

    for (i, &value) in data.iter().enumerate() {
        numerator *= decay;
        denominator *= decay;
        if !value.is_nan() {
            numerator += value;
            denominator += 1.0;
            seen = true;
        }
        if seen && denominator > 0.0 {
            result[i] = numerator / denominator;
        }
    }
    result
}

// ── RSI ──

/// Rolling-mean RSI as emitted:
///
/// ```text
/// delta = close.diff()
/// gain  = delta.where(delta > 0, 0).rolling(period).mean()
/// loss  = (-delta.where(delta < 0, 0)).rolling(period).mean()
/// rsi   = 100 - 100 / (1 + gain / loss)
/// ```
///
/// The first diff counts as zero. A window with no losses gives 100, a flat
/// window gives NaN.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let len = close.len();
    let mut gains = vec![0.0f64; len];
    let mut losses = vec![0.0f64; len];

    for i in 1..len {
        let change = close[i] - close[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else if change < 0.0 {
            losses[i] = -change;
        }
    }

    let avg_gain = sma(&gains, period);
    let avg_loss = sma(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| 100.0 - 100.0 / (1.0 + g / l))
        .collect()
}

// ── MACD ──

/// MACD: returns (macd_line, signal_line, histogram).
pub fn macd(
    close: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(close, fast_period);
    let slow_ema = ema(close, slow_period);

    let macd_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal_period);
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    (macd_line, signal_line, histogram)
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        if a.is_nan() && b.is_nan() {
            return true;
        }
        (a - b).abs() < epsilon
    }

    fn assert_approx(actual: f64, expected: f64, epsilon: f64, msg: &str) {
        assert!(
            approx_eq(actual, expected, epsilon),
            "{}: expected {}, got {}",
            msg,
            expected,
            actual
        );
    }

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                datetime: format!("2024-01-{:02}", i + 1),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = sma(&data, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 2.0, 1e-10, "SMA[2]");
        assert_approx(result[3], 3.0, 1e-10, "SMA[3]");
        assert_approx(result[9], 9.0, 1e-10, "SMA[9]");
    }

    #[test]
    fn test_sma_nan_window() {
        let data = vec![1.0, f64::NAN, 3.0, 4.0, 5.0];
        let result = sma(&data, 2);
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 3.5, 1e-10, "SMA after NaN leaves window");
        assert_approx(result[4], 4.5, 1e-10, "SMA[4]");
    }

    #[test]
    fn test_ema_adjusted_weights() {
        // span=3 → alpha=0.5
        let result = ema(&[1.0, 2.0, 3.0], 3);
        assert_approx(result[0], 1.0, 1e-10, "EMA[0]");
        assert_approx(result[1], 5.0 / 3.0, 1e-10, "EMA[1]");
        assert_approx(result[2], 4.25 / 1.75, 1e-10, "EMA[2]");
    }

    #[test]
    fn test_ema_constant_series() {
        let result = ema(&[7.0; 10], 5);
        for v in result {
            assert_approx(v, 7.0, 1e-12, "EMA of constant");
        }
    }

    #[test]
    fn test_rsi_rolling_means() {
        let result = rsi(&[1.0, 2.0, 3.0, 2.0], 2);
        assert!(result[0].is_nan());
        assert_approx(result[1], 100.0, 1e-10, "RSI[1]");
        assert_approx(result[2], 100.0, 1e-10, "RSI[2]");
        assert_approx(result[3], 50.0, 1e-10, "RSI[3]");
    }

    #[test]
    fn test_rsi_flat_is_nan_and_falling_is_zero() {
        let flat = rsi(&[5.0, 5.0, 5.0, 5.0], 2);
        assert!(flat[3].is_nan());

        let falling = rsi(&[5.0, 4.0, 3.0, 2.0], 2);
        assert_approx(falling[3], 0.0, 1e-10, "RSI falling");
    }

    #[test]
    fn test_macd_basic() {
        let data: Vec<f64> = (1..=50).map(|i| 100.0 + (i as f64) * 0.5).collect();
        let (macd_line, signal, hist) = macd(&data, 12, 26, 9);
        assert_eq!(macd_line.len(), 50);
        assert_approx(macd_line[0], 0.0, 1e-10, "MACD starts at zero");
        assert!(macd_line[49] > 0.0, "MACD should be positive in uptrend");
        assert!(signal[49].is_finite());
        assert_approx(hist[49], macd_line[49] - signal[49], 1e-10, "Histogram");
    }

    #[test]
    fn test_compute_indicator_dispatches() {
        let candles = make_candles(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let sma_out = compute_indicator(IndicatorKind::Sma, 2, &candles);
        assert_approx(sma_out.primary[4], 4.5, 1e-10, "SMA dispatch");
        assert!(sma_out.secondary.is_none());

        let macd_out = compute_indicator(IndicatorKind::Macd, 0, &candles);
        assert!(macd_out.secondary.is_some());
        assert!(macd_out.tertiary.is_some());
    }
}
