//! Ordinary least-squares linear regression.

use crate::error::{MlError, Result};
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};

/// Lower-triangular factor `L` with `L Lᵀ = G + shift·I` for a symmetric Gram
/// matrix `G`.
struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor without materialising the shifted matrix. `None` when it is not
    /// positive definite at this shift.
    fn factor(gram: &Array2<f64>, shift: f64) -> Option<Self> {
        let n = gram.nrows();
        let mut l = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let dot = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
                if i == j {
                    let pivot = gram[[i, i]] + shift - dot;
                    if !pivot.is_finite() || pivot <= 0.0 {
                        return None;
                    }
                    l[[i, i]] = pivot.sqrt();
                } else {
                    l[[i, j]] = (gram[[i, j]] - dot) / l[[j, j]];
                }
            }
        }
        Some(Self { l })
    }

    /// Forward then backward substitution.
    fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let l = &self.l;
        let n = l.nrows();
        let mut z = Array1::<f64>::zeros(n);
        for i in 0..n {
            let dot = l.slice(s![i, ..i]).dot(&z.slice(s![..i]));
            z[i] = (b[i] - dot) / l[[i, i]];
        }
        for i in (0..n).rev() {
            let dot = l.slice(s![i + 1.., i]).dot(&z.slice(s![i + 1..]));
            z[i] = (z[i] - dot) / l[[i, i]];
        }
        z
    }
}

/// Linear regression with an unpenalised intercept.
///
/// Indicator blocks from one-hot encoding are collinear with the intercept, so
/// the normal equations carry a small ridge penalty scaled by the row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Array1<f64>,
}

impl LinearRegression {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, ridge: f64) -> Result<Self> {
        let n = x.nrows();
        if n != y.len() {
            return Err(MlError::ShapeMismatch {
                expected: format!("y length = {n}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        let y_mean = y
            .mean()
            .ok_or_else(|| MlError::insufficient("linear regression", "no training rows"))?;
        let p = x.ncols();
        if p == 0 {
            return Ok(Self {
                intercept: y_mean,
                coefficients: Array1::zeros(0),
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MlError::insufficient("linear regression", "no training rows"))?;
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let gram = xc.t().dot(&xc);
        let rhs = xc.t().dot(&yc);

        // Escalate the penalty until the shifted system factors.
        let mut penalty = ridge * n as f64;
        let mut factor = None;
        for _ in 0..4 {
            factor = Cholesky::factor(&gram, penalty);
            if factor.is_some() {
                break;
            }
            penalty = (penalty * 1e3).max(1e-10 * n as f64);
        }
        let coefficients = factor
            .map(|f| f.solve(&rhs))
            .ok_or_else(|| {
                MlError::training("normal equations are singular even with ridge penalty")
            })?;

        let intercept = y_mean - x_mean.dot(&coefficients);
        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(MlError::ShapeMismatch {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }
}
