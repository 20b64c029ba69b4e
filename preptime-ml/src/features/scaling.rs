//! Column statistics and the centre/scale transform.

use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};

/// Mean and variance of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub n: usize,
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
}

impl ColumnStats {
    pub fn compute(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self {
                n,
                mean: 0.0,
                variance: 0.0,
            };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Self { n, mean, variance }
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn sample_sd(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        (self.variance * self.n as f64 / (self.n - 1) as f64).sqrt()
    }
}

/// Fail with [`MlError::DegenerateColumn`] when every value is identical.
pub fn check_variance(column: &str, values: &[f64]) -> Result<ColumnStats> {
    let constant = values.windows(2).all(|w| w[0] == w[1]);
    let stats = ColumnStats::compute(values);
    if constant || stats.variance == 0.0 {
        return Err(MlError::DegenerateColumn {
            column: column.to_string(),
        });
    }
    Ok(stats)
}

/// Affine transform `(x - center) / scale` learned on the fit partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub center: f64,
    pub scale: f64,
}

impl Scaling {
    pub fn fit(column: &str, values: &[f64]) -> Result<Self> {
        let stats = check_variance(column, values)?;
        Ok(Self {
            center: stats.mean,
            scale: stats.sample_sd(),
        })
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_standardises_fit_column() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let scaling = Scaling::fit("x", &values).unwrap();
        assert_eq!(scaling.center, 5.0);
        let scaled: Vec<f64> = values.iter().map(|&v| scaling.apply(v)).collect();
        let stats = ColumnStats::compute(&scaled);
        assert!(stats.mean.abs() < 1e-12);
        assert!((stats.sample_sd() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_is_degenerate() {
        let err = Scaling::fit("order_value", &[3.0, 3.0, 3.0]).unwrap_err();
        assert!(matches!(err, MlError::DegenerateColumn { ref column } if column == "order_value"));
        assert!(check_variance("single", &[1.0]).is_err());
        assert!(check_variance("empty", &[]).is_err());
    }
}
