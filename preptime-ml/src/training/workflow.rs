//! Workflow: one recipe bound to one model spec, fit and applied as a unit.

use crate::algorithms::spec::{ModelArtifact, ModelSpec};
use crate::data::record::Partition;
use crate::error::Result;
use crate::eval::metrics::{EvaluationResult, PartitionKind};
use crate::features::recipe::{Recipe, RecipeState};
use ndarray::Array1;

/// An unfitted (recipe, model) pair.
#[derive(Debug, Clone)]
pub struct Workflow {
    recipe: Recipe,
    spec: ModelSpec,
}

impl Workflow {
    pub fn new(recipe: Recipe, spec: ModelSpec) -> Self {
        Self { recipe, spec }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name()
    }

    /// Fit the recipe once and the model once, both on `train` only.
    pub fn fit(&self, train: &Partition<'_>, seed: u64) -> Result<FittedWorkflow> {
        let state = self.recipe.fit(train)?;
        let features = state.apply(train)?;
        let artifact = self.spec.train(&features, &train.targets(), seed)?;
        tracing::debug!(
            model = self.name(),
            partition = train.name(),
            rows = train.len(),
            columns = features.ncols(),
            "Workflow fitted"
        );
        Ok(FittedWorkflow {
            model: self.name().to_string(),
            state,
            artifact,
        })
    }

    /// Transform with the frozen recipe state, then predict. Never refits.
    pub fn predict(
        state: &RecipeState,
        artifact: &ModelArtifact,
        partition: &Partition<'_>,
    ) -> Result<Array1<f64>> {
        let features = state.apply(partition)?;
        artifact.predict(&features)
    }
}

/// The recipe state and model artifact produced by one fit.
#[derive(Debug, Clone)]
pub struct FittedWorkflow {
    model: String,
    state: RecipeState,
    artifact: ModelArtifact,
}

impl FittedWorkflow {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn state(&self) -> &RecipeState {
        &self.state
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn into_parts(self) -> (RecipeState, ModelArtifact) {
        (self.state, self.artifact)
    }

    pub fn predict(&self, partition: &Partition<'_>) -> Result<Array1<f64>> {
        Workflow::predict(&self.state, &self.artifact, partition)
    }

    /// Predict `partition` and pair the predictions with its targets.
    pub fn evaluate(&self, partition: &Partition<'_>, kind: PartitionKind) -> Result<EvaluationResult> {
        let predictions = self.predict(partition)?;
        EvaluationResult::new(
            self.model.clone(),
            kind,
            predictions.to_vec(),
            partition.targets().to_vec(),
        )
    }
}
