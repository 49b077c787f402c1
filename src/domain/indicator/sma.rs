//! Simple moving average.

/// Rolling mean over `window` values.
///
/// The first `window - 1` outputs are NaN. A window of 0 or 1 means "no
/// smoothing" and returns the input unchanged.
pub fn sma(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }

    let mut out = vec![f64::NAN; values.len()];
    if values.len() < window {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);

        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 2.0).abs() < 1e-9);
        assert!((out[3] - 3.0).abs() < 1e-9);
        assert!((out[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_window_one_is_identity() {
        let values = [3.0, 1.0, 4.0];
        assert_eq!(sma(&values, 1), values.to_vec());
        assert_eq!(sma(&values, 0), values.to_vec());
    }

    #[test]
    fn sma_constant_series_equals_constant() {
        let values = [100.0; 50];
        let out = sma(&values, 20);
        for v in &out[19..] {
            assert!((v - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sma_window_longer_than_input() {
        let values = [1.0, 2.0];
        let out = sma(&values, 5);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn sma_empty_input() {
        let out = sma(&[], 5);
        assert!(out.is_empty());
    }

    #[test]
    fn sma_is_causal() {
        // Changing a later value must not affect earlier outputs.
        let base = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut bumped = base;
        bumped[5] = 100.0;

        let a = sma(&base, 3);
        let b = sma(&bumped, 3);
        for i in 0..5 {
            assert!(a[i].is_nan() && b[i].is_nan() || (a[i] - b[i]).abs() < 1e-12);
        }
    }
}
