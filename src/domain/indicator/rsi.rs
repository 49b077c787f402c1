//! RSI (Relative Strength Index).
//!
//! Gains and losses are averaged with a plain rolling mean over `period`
//! changes (not Wilder's recursive smoothing):
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! A zero loss sum yields RSI 100 by convention. The first valid output is at
//! index `period` (one change per bar, `period` changes needed).
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut gains = vec![0.0; values.len()];
    let mut losses = vec![0.0; values.len()];
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut gain_sum: f64 = gains[1..=period].iter().sum();
    let mut loss_sum: f64 = losses[1..=period].iter().sum();
    out[period] = rsi_from_sums(gain_sum, loss_sum);

    for i in period + 1..values.len() {
        gain_sum += gains[i] - gains[i - period];
        loss_sum += losses[i] - losses[i - period];
        out[i] = rsi_from_sums(gain_sum, loss_sum);
    }
    out
}

fn rsi_from_sums(gain_sum: f64, loss_sum: f64) -> f64 {
    if loss_sum <= 0.0 {
        return 100.0;
    }
    let rs = gain_sum / loss_sum;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rsi_known_mixed_window() {
        // Changes: +2, -1, +3, -2. Gain sum 5, loss sum 3, RS 5/3.
        let values = [100.0, 102.0, 101.0, 104.0, 102.0];
        let out = rsi(&values, 4);
        assert_relative_eq!(out[4], 100.0 - 100.0 / (1.0 + 5.0 / 3.0), epsilon = 1e-9);
    }

    #[test]
    fn rsi_warmup() {
        let values: Vec<f64> = (0..20).map(|i| 100.0 + (i % 5) as f64).collect();
        let out = rsi(&values, 14);

        for v in &out[..14] {
            assert!(v.is_nan());
        }
        assert!(out[14].is_finite());
    }

    #[test]
    fn rsi_strictly_increasing_is_100() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&values, 14);

        for v in &out[14..] {
            assert!((v - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rsi_strictly_decreasing_is_0() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&values, 14);

        for v in &out[14..] {
            assert!((v - 0.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rsi_balanced_moves_is_50() {
        // Alternating +1/-1: equal gain and loss sums over an even window.
        let mut values = vec![100.0];
        for i in 0..20 {
            let last = *values.last().unwrap();
            values.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let out = rsi(&values, 4);
        assert!((out[5] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_in_range() {
        let values: Vec<f64> = (0..40)
            .map(|i| 100.0 + ((i * 7) % 11) as f64 - 5.0)
            .collect();
        let out = rsi(&values, 14);
        for v in out.iter().filter(|v| v.is_finite()) {
            assert!((0.0..=100.0).contains(v), "RSI {} out of range", v);
        }
    }

    #[test]
    fn rsi_period_too_long() {
        let out = rsi(&[100.0, 101.0, 102.0], 14);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_zero_period() {
        let out = rsi(&[100.0, 101.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_empty_input() {
        assert!(rsi(&[], 14).is_empty());
    }
}
