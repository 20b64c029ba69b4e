//! Random forest regression: bootstrap-aggregated CART trees.

use crate::algorithms::tree::{RegressionTree, TreeParams};
use crate::error::{MlError, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hyperparameters of the forest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub tree_count: usize,
    pub min_node_size: usize,
    pub max_depth: Option<usize>,
    /// Features sampled per split; floor(sqrt(p)) when `None`.
    pub max_features: Option<usize>,
}

impl ForestParams {
    fn mtry(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .clamp(1, n_features.max(1))
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    /// Mean impurity decrease per feature, normalised to sum to one.
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit `params.tree_count` trees in parallel. Tree `i` draws its bootstrap
    /// sample and feature subsets from `seed + i`, so the result does not
    /// depend on thread scheduling.
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: ForestParams, seed: u64) -> Result<Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(MlError::ShapeMismatch {
                expected: format!("y length = {n_samples}"),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MlError::insufficient("random forest", "no training rows"));
        }
        if params.tree_count == 0 {
            return Err(MlError::invalid_config("tree_count must be at least 1"));
        }

        let n_features = x.ncols();
        let tree_params = TreeParams {
            min_node_size: params.min_node_size,
            max_depth: params.max_depth,
            max_features: params.mtry(n_features),
        };
        let y = y.to_vec();

        let grown: Vec<(RegressionTree, Vec<f64>)> = (0..params.tree_count)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let bootstrap: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                RegressionTree::grow(x, &y, bootstrap, tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, imp) in grown {
            for (total, v) in importances.iter_mut().zip(imp) {
                *total += v;
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }

        Ok(Self {
            trees,
            n_features,
            feature_importances: importances,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(MlError::ShapeMismatch {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        // Per-row sums are accumulated in tree order so output is bit-reproducible.
        let per_row: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                sum / self.trees.len() as f64
            })
            .collect();
        Ok(Array1::from_vec(per_row))
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tree_count: usize) -> ForestParams {
        ForestParams {
            tree_count,
            min_node_size: 2,
            max_depth: None,
            max_features: None,
        }
    }

    fn data() -> (Array2<f64>, Array1<f64>) {
        let n = 60;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(n, |i| if i < 30 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn test_forest_fits_step() {
        let (x, y) = data();
        let forest = RandomForest::fit(&x, &y, params(25), 7).unwrap();
        let pred = forest.predict(&x).unwrap();
        assert!((pred[0] - 1.0).abs() < 1.0);
        assert!((pred[59] - 5.0).abs() < 1.0);
        assert_eq!(forest.tree_count(), 25);
        let imp = forest.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = data();
        let a = RandomForest::fit(&x, &y, params(10), 3).unwrap();
        let b = RandomForest::fit(&x, &y, params(10), 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_default_mtry() {
        assert_eq!(params(1).mtry(10), 3);
        assert_eq!(params(1).mtry(0), 1);
        let fixed = ForestParams {
            max_features: Some(50),
            ..params(1)
        };
        assert_eq!(fixed.mtry(4), 4);
    }

    #[test]
    fn test_empty_training_set() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(RandomForest::fit(&x, &y, params(3), 0).is_err());
    }
}
