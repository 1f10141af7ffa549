//! Per-column moment statistics over a block of frames.

/// Deviations and variances below this are treated as a constant column.
pub const EPSILON: f64 = 1e-10;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// Mean, population variance, bias-corrected skewness and bias-corrected
/// excess kurtosis of `values`.
///
/// The bias correction needs at least 3 values for skewness and 4 for
/// kurtosis; shorter inputs get the plain biased estimate instead, so two
/// distinct values give skewness 0 and kurtosis -2. A column that is
/// constant (within [`EPSILON`]) reports zero skewness and kurtosis, and an
/// exactly constant column reports zero variance. Nothing returned is ever NaN or infinite.
pub fn moments(values: &[f64]) -> Moments {
    let n = values.len();
    if n == 0 {
        return Moments::default();
    }

    let first = values[0];
    if values.iter().all(|&v| v == first) {
        return Moments {
            mean: finite_or_zero(first),
            ..Moments::default()
        };
    }

    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    let mut max_dev = 0.0f64;
    for &v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
        max_dev = max_dev.max(d.abs());
    }
    m2 /= nf;
    m3 /= nf;
    m4 /= nf;

    let degenerate = max_dev < EPSILON || m2 < EPSILON;
    let (skewness, kurtosis) = if degenerate {
        (0.0, 0.0)
    } else {
        (unbiased_skew(m2, m3, nf), unbiased_kurtosis(m2, m4, nf))
    };

    Moments {
        mean: finite_or_zero(mean),
        variance: finite_or_zero(m2),
        skewness: finite_or_zero(skewness),
        kurtosis: finite_or_zero(kurtosis),
    }
}

fn unbiased_skew(m2: f64, m3: f64, n: f64) -> f64 {
    let g1 = m3 / m2.powf(1.5);
    if n < 3.0 {
        return g1;
    }
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

fn unbiased_kurtosis(m2: f64, m4: f64, n: f64) -> f64 {
    let g2 = m4 / (m2 * m2) - 3.0;
    if n < 4.0 {
        return g2;
    }
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_column_is_all_zero_beyond_mean() {
        let m = moments(&[0.1; 43]);
        assert_eq!(m.mean, 0.1);
        assert_eq!(m.variance, 0.0);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.kurtosis, 0.0);
    }

    #[test]
    fn near_constant_column_clamps_higher_moments() {
        let mut values = vec![5.0; 20];
        values[3] += 1e-12;
        let m = moments(&values);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.kurtosis, 0.0);
    }

    #[test]
    fn matches_reference_values() {
        // Bias-corrected sample skewness and excess kurtosis of this set.
        let m = moments(&[1.0, 2.0, 3.0, 4.0, 10.0]);
        assert!((m.mean - 4.0).abs() < 1e-12);
        assert!((m.variance - 10.0).abs() < 1e-12);
        assert!((m.skewness - 1.697_056_274_8).abs() < 1e-6, "skew {}", m.skewness);
        assert!((m.kurtosis - 3.152).abs() < 1e-6, "kurt {}", m.kurtosis);
    }

    #[test]
    fn symmetric_data_has_no_skew() {
        let m = moments(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!(m.skewness.abs() < 1e-12);
    }

    #[test]
    fn short_windows_fall_back_to_biased_moments() {
        let m = moments(&[1.0, 3.0]);
        assert_eq!(m.mean, 2.0);
        assert_eq!(m.variance, 1.0);
        assert_eq!(m.skewness, 0.0);
        assert!((m.kurtosis + 2.0).abs() < 1e-12, "kurt {}", m.kurtosis);

        // n = 3: skewness is corrected, kurtosis stays biased (-1.5 for any 3 values).
        let m = moments(&[0.0, 1.0, 5.0]);
        let g1 = 6.0 / (14.0f64 / 3.0).powf(1.5);
        assert!((m.skewness - g1 * 6.0f64.sqrt()).abs() < 1e-9, "skew {}", m.skewness);
        assert!((m.kurtosis + 1.5).abs() < 1e-12, "kurt {}", m.kurtosis);

        assert_eq!(moments(&[]), Moments::default());
    }

    #[test]
    fn non_finite_input_never_leaks_out() {
        for values in [
            vec![1.0, f64::NAN, 3.0, 4.0],
            vec![f64::INFINITY, 1.0, 2.0, 3.0],
            vec![1.0, f64::NEG_INFINITY, 2.0, f64::INFINITY, 5.0],
            vec![f64::NAN; 6],
        ] {
            let m = moments(&values);
            for v in [m.mean, m.variance, m.skewness, m.kurtosis] {
                assert!(v.is_finite(), "{:?} -> {:?}", values, m);
            }
        }
        assert_eq!(moments(&[f64::NAN, 2.0, 3.0]).mean, 0.0);
    }
}
