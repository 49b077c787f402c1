//! Bollinger bands.

use super::sma::sma;

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub mid: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Rolling mean ± rolling sample standard deviation × `std_mult`.
///
/// Same warm-up rule as [`sma`]: the first `period - 1` entries of every band
/// are NaN. Sample (n-1) standard deviation, so a period under 2 yields
/// all-NaN bands.
pub fn bollinger(values: &[f64], period: usize, std_mult: f64) -> BollingerBands {
    let n = values.len();
    if period < 2 || n < period {
        return BollingerBands {
            mid: vec![f64::NAN; n],
            upper: vec![f64::NAN; n],
            lower: vec![f64::NAN; n],
        };
    }

    let mid = sma(values, period);
    let mut upper = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    for i in period - 1..n {
        let window = &values[i + 1 - period..=i];
        let mean = mid[i];
        let var: f64 =
            window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (period - 1) as f64;
        let std = var.sqrt();
        upper[i] = mean + std * std_mult;
        lower[i] = mean - std * std_mult;
    }

    BollingerBands { mid, upper, lower }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_warmup() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bands = bollinger(&values, 20, 2.0);

        for i in 0..19 {
            assert!(bands.mid[i].is_nan());
            assert!(bands.upper[i].is_nan());
            assert!(bands.lower[i].is_nan());
        }
        assert!(bands.mid[19].is_finite());
    }

    #[test]
    fn bollinger_constant_series_collapses_to_constant() {
        let values = [100.0; 40];
        let bands = bollinger(&values, 20, 2.0);

        for i in 19..40 {
            assert!((bands.mid[i] - 100.0).abs() < 1e-9);
            assert!((bands.upper[i] - 100.0).abs() < 1e-9);
            assert!((bands.lower[i] - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bollinger_bands_bracket_mid() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 13) % 7) as f64).collect();
        let bands = bollinger(&values, 10, 2.0);

        for i in 9..values.len() {
            assert!(bands.upper[i] >= bands.mid[i]);
            assert!(bands.lower[i] <= bands.mid[i]);
        }
    }

    #[test]
    fn bollinger_known_sample_std() {
        // Window [2, 4, 6]: mean 4, sample variance ((4+0+4)/2) = 4, std 2.
        let values = [2.0, 4.0, 6.0];
        let bands = bollinger(&values, 3, 1.0);
        assert!((bands.mid[2] - 4.0).abs() < 1e-9);
        assert!((bands.upper[2] - 6.0).abs() < 1e-9);
        assert!((bands.lower[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn bollinger_period_too_long() {
        let bands = bollinger(&[1.0, 2.0], 20, 2.0);
        assert!(bands.mid.iter().all(|v| v.is_nan()));
        assert!(bands.upper.iter().all(|v| v.is_nan()));
        assert!(bands.lower.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn bollinger_degenerate_period() {
        let bands = bollinger(&[1.0, 2.0, 3.0], 1, 2.0);
        assert!(bands.mid.iter().all(|v| v.is_nan()));
    }
}
