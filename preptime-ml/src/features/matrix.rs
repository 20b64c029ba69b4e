//! Named numeric feature matrix.

use crate::error::{MlError, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// Model-ready features: one row per record, one named column per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(MlError::ShapeMismatch {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(Self { columns, values })
    }

    /// Build from row-major data.
    pub fn from_rows(columns: Vec<String>, n_rows: usize, data: Vec<f64>) -> Result<Self> {
        let n_cols = columns.len();
        let values = Array2::from_shape_vec((n_rows, n_cols), data).map_err(|e| {
            MlError::ShapeMismatch {
                expected: format!("{n_rows} x {n_cols}"),
                actual: e.to_string(),
            }
        })?;
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.values.index_axis(Axis(1), idx))
    }
}
