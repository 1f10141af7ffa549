use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Per-column `(x - mean) / scale`, the same transform scikit-learn's
/// `StandardScaler` stores as `mean_` and `scale_`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Standardizer {
    /// Fit on `rows` using the population standard deviation. Columns with
    /// zero spread get a scale of 1.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self, AnalysisError> {
        let first = rows
            .first()
            .ok_or_else(|| AnalysisError::InvalidInput("cannot fit a standardizer on no rows".into()))?;
        let dim = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; dim];
        for row in rows {
            check_dim(dim, row)?;
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; dim];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        let scale = var
            .into_iter()
            .map(|s| {
                let std = (s / n).sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err("scale contains zero or non-finite entries".into());
        }
        Ok(())
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, AnalysisError> {
        check_dim(self.dim(), row)?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, AnalysisError> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

fn check_dim(expected: usize, row: &[f64]) -> Result<(), AnalysisError> {
    if row.len() == expected {
        Ok(())
    } else {
        Err(AnalysisError::DimensionMismatch {
            expected,
            actual: row.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_centers_and_scales_columns() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = Standardizer::fit(&rows).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        // Second column is constant, so its scale falls back to 1.
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        let out = scaler.transform(&rows).unwrap();
        assert_eq!(out, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let scaler = Standardizer {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        assert!(matches!(
            scaler.transform_row(&[1.0, 2.0]),
            Err(AnalysisError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn fit_needs_rows() {
        assert!(Standardizer::fit(&[]).is_err());
        assert!(Standardizer::fit(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn validate_catches_mismatched_arrays() {
        let bad = Standardizer {
            mean: vec![0.0; 2],
            scale: vec![1.0],
        };
        assert!(bad.validate().is_err());
        let zero = Standardizer {
            mean: vec![0.0],
            scale: vec![0.0],
        };
        assert!(zero.validate().is_err());
    }
}
