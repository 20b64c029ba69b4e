//! Model specifications and the fitted artifacts they produce.

use crate::algorithms::forest::{ForestParams, RandomForest};
use crate::algorithms::linear::LinearRegression;
use crate::config::ModelConfig;
use crate::error::{MlError, Result};
use crate::features::matrix::FeatureMatrix;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Declarative description of a model family and its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        #[serde(default)]
        ridge: f64,
    },
    EnsembleOfTrees {
        tree_count: usize,
        min_node_size: usize,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default)]
        max_features: Option<usize>,
    },
}

impl ModelSpec {
    pub fn linear() -> Self {
        Self::Linear { ridge: 1e-8 }
    }

    pub fn ensemble_of_trees(tree_count: usize) -> Self {
        Self::EnsembleOfTrees {
            tree_count,
            min_node_size: 5,
            max_depth: None,
            max_features: None,
        }
    }

    /// The two competing specs, in order of increasing complexity.
    pub fn competitors(config: &ModelConfig) -> Vec<Self> {
        vec![
            Self::Linear {
                ridge: config.linear_ridge,
            },
            Self::EnsembleOfTrees {
                tree_count: config.tree_count,
                min_node_size: config.min_node_size,
                max_depth: config.max_depth,
                max_features: config.max_features,
            },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear_regression",
            Self::EnsembleOfTrees { .. } => "random_forest",
        }
    }

    /// Rank used to break ties in favour of simpler models; lower is simpler.
    pub fn complexity(&self) -> usize {
        match self {
            Self::Linear { .. } => 0,
            Self::EnsembleOfTrees { .. } => 1,
        }
    }

    /// Run the training routine on an already-transformed matrix.
    pub fn train(&self, x: &FeatureMatrix, y: &Array1<f64>, seed: u64) -> Result<ModelArtifact> {
        let model = match self {
            Self::Linear { ridge } => FittedModel::Linear(LinearRegression::fit(x.values(), y, *ridge)?),
            Self::EnsembleOfTrees {
                tree_count,
                min_node_size,
                max_depth,
                max_features,
            } => {
                let params = ForestParams {
                    tree_count: *tree_count,
                    min_node_size: *min_node_size,
                    max_depth: *max_depth,
                    max_features: *max_features,
                };
                FittedModel::Forest(RandomForest::fit(x.values(), y, params, seed)?)
            }
        };
        Ok(ModelArtifact {
            columns: x.columns().to_vec(),
            model,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum FittedModel {
    Linear(LinearRegression),
    Forest(RandomForest),
}

/// Fitted model parameters, bound to the feature columns they were trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    columns: Vec<String>,
    model: FittedModel,
}

impl ModelArtifact {
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array1<f64>> {
        if x.columns() != self.columns.as_slice() {
            return Err(MlError::ShapeMismatch {
                expected: format!("columns {:?}", self.columns),
                actual: format!("columns {:?}", x.columns()),
            });
        }
        match &self.model {
            FittedModel::Linear(m) => m.predict(x.values()),
            FittedModel::Forest(m) => m.predict(x.values()),
        }
    }

    /// Per-column importances: absolute coefficients for the linear model,
    /// impurity decrease for the forest.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let values: Vec<f64> = match &self.model {
            FittedModel::Linear(m) => m.coefficients().iter().map(|c| c.abs()).collect(),
            FittedModel::Forest(m) => m.feature_importances().to_vec(),
        };
        self.columns.iter().cloned().zip(values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_competitors_from_config() {
        let specs = ModelSpec::competitors(&ModelConfig::default());
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name(), "linear_regression");
        assert!(matches!(specs[1], ModelSpec::EnsembleOfTrees { tree_count: 500, .. }));
        assert!(specs[0].complexity() < specs[1].complexity());
    }

    #[test]
    fn test_artifact_rejects_foreign_columns() {
        let x = matrix();
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let artifact = ModelSpec::linear().train(&x, &y, 0).unwrap();
        assert_eq!(artifact.predict(&x).unwrap().len(), 6);

        let other = FeatureMatrix::new(vec!["a".into(), "c".into()], x.values().clone()).unwrap();
        assert!(matches!(artifact.predict(&other), Err(MlError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_importances_are_named() {
        let x = matrix();
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let artifact = ModelSpec::ensemble_of_trees(5).train(&x, &y, 1).unwrap();
        let names: Vec<String> = artifact.feature_importances().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_spec_serde_shape() {
        let json = serde_json::to_value(ModelSpec::ensemble_of_trees(10)).unwrap();
        assert_eq!(json["family"], "ensemble_of_trees");
        assert_eq!(json["tree_count"], 10);
    }
}
