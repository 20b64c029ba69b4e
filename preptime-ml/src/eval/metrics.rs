//! Regression error metrics and evaluation records.

use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which data a metric was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionKind {
    /// The training subset, re-predicted by the model fit on it.
    Train,
    /// The held-out subset.
    Holdout,
    /// Aggregate over cross-validation fold assessments.
    CrossValidation,
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Holdout => "holdout",
            Self::CrossValidation => "cv",
        })
    }
}

/// Root-mean-squared error, `sqrt(mean((pred - truth)^2))`.
pub fn rmse(predictions: &[f64], truth: &[f64]) -> Result<f64> {
    if predictions.len() != truth.len() {
        return Err(MlError::ShapeMismatch {
            expected: format!("{} predictions", truth.len()),
            actual: format!("{} predictions", predictions.len()),
        });
    }
    if truth.is_empty() {
        return Err(MlError::insufficient("rmse", "no rows to score"));
    }
    let mse = predictions
        .iter()
        .zip(truth)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / truth.len() as f64;
    Ok(mse.sqrt())
}

/// Aligned predictions and truth for one (model, partition) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model: String,
    pub partition: PartitionKind,
    pub predictions: Vec<f64>,
    pub truth: Vec<f64>,
}

impl EvaluationResult {
    pub fn new(
        model: impl Into<String>,
        partition: PartitionKind,
        predictions: Vec<f64>,
        truth: Vec<f64>,
    ) -> Result<Self> {
        if predictions.len() != truth.len() {
            return Err(MlError::ShapeMismatch {
                expected: format!("{} predictions", truth.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }
        Ok(Self {
            model: model.into(),
            partition,
            predictions,
            truth,
        })
    }

    pub fn len(&self) -> usize {
        self.truth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.truth.is_empty()
    }

    pub fn rmse(&self) -> Result<f64> {
        rmse(&self.predictions, &self.truth)
    }
}

/// Cross-validation result for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub model: String,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Sample standard deviation of the fold scores.
    pub std_score: f64,
    /// Standard error of the mean, `std_score / sqrt(k)`.
    pub std_err: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(model: impl Into<String>, scores: Vec<f64>, metric_name: &str) -> Result<Self> {
        if scores.is_empty() {
            return Err(MlError::insufficient("cross-validation", "no fold scores"));
        }
        let k = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / k;
        let variance = if scores.len() > 1 {
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (k - 1.0)
        } else {
            0.0
        };
        let std = variance.sqrt();
        Ok(Self {
            model: model.into(),
            fold_scores: scores,
            mean_score: mean,
            std_score: std,
            std_err: std / k.sqrt(),
            metric_name: metric_name.to_string(),
        })
    }

    /// `mean ± width * std_err`.
    pub fn interval(&self, width: f64) -> (f64, f64) {
        (
            self.mean_score - width * self.std_err,
            self.mean_score + width * self.std_err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse() {
        let r = rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 5.0]).unwrap();
        assert!((r - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(rmse(&[2.0], &[2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_rmse_rejects_misaligned_and_empty() {
        assert!(matches!(rmse(&[1.0], &[1.0, 2.0]), Err(MlError::ShapeMismatch { .. })));
        assert!(matches!(rmse(&[], &[]), Err(MlError::InsufficientData { .. })));
    }

    #[test]
    fn test_cv_result_standard_error() {
        let cv = CrossValidationResult::from_scores("m", vec![1.0, 2.0, 3.0, 4.0], "rmse").unwrap();
        assert_eq!(cv.mean_score, 2.5);
        let sd = (5.0f64 / 3.0).sqrt();
        assert!((cv.std_score - sd).abs() < 1e-12);
        assert!((cv.std_err - sd / 2.0).abs() < 1e-12);
        let (lo, hi) = cv.interval(2.0);
        assert!((hi - lo - 4.0 * cv.std_err).abs() < 1e-12);
    }
}
