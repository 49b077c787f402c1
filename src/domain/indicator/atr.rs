//! Average True Range.

use super::sma::sma;

/// Rolling simple mean of the true range over `period` bars.
///
/// True range = max(high - low, |high - prev_close|, |low - prev_close|);
/// the first bar has no previous close and uses high - low alone. Warm-up
/// entries (first `period - 1`) are NaN.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    debug_assert_eq!(n, low.len());
    debug_assert_eq!(n, close.len());

    if period == 0 || n < period {
        return vec![f64::NAN; n];
    }

    let mut tr = Vec::with_capacity(n);
    for i in 0..n {
        let hl = high[i] - low[i];
        let value = if i == 0 {
            hl
        } else {
            let prev_close = close[i - 1];
            hl.max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs())
        };
        tr.push(value);
    }

    // period 1 would hit sma's identity shortcut; the rolling mean of one TR
    // is the TR itself, so that is still correct.
    sma(&tr, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atr_constant_range() {
        let high = [110.0; 10];
        let low = [90.0; 10];
        let close = [100.0; 10];
        let out = atr(&high, &low, &close, 3);

        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        for v in &out[2..] {
            assert!((v - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn atr_constant_price_is_zero() {
        let flat = [100.0; 10];
        let out = atr(&flat, &flat, &flat, 3);
        for v in &out[2..] {
            assert!((v - 0.0).abs() < 1e-9);
        }
    }

    #[test]
    fn atr_first_bar_uses_high_low_only() {
        let high = [110.0, 130.0, 120.0];
        let low = [100.0, 120.0, 110.0];
        let close = [105.0, 125.0, 115.0];
        let out = atr(&high, &low, &close, 1);

        // Bar 0: 110-100 = 10. Bar 1 gaps: |130-105| = 25 dominates 10.
        assert!((out[0] - 10.0).abs() < 1e-9);
        assert!((out[1] - 25.0).abs() < 1e-9);
        assert!((out[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_rolling_mean_of_tr() {
        let high = [110.0, 115.0, 120.0, 125.0];
        let low = [100.0, 105.0, 110.0, 115.0];
        let close = [105.0, 110.0, 115.0, 120.0];
        let out = atr(&high, &low, &close, 3);

        // Each bar's TR is 10 (range dominates the 5-point gaps).
        assert!((out[2] - 10.0).abs() < 1e-9);
        assert!((out[3] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars() {
        let out = atr(&[110.0, 115.0], &[100.0, 105.0], &[105.0, 110.0], 5);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn atr_empty_input() {
        assert!(atr(&[], &[], &[], 14).is_empty());
    }
}
