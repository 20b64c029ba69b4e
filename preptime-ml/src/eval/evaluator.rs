//! Evaluator: cross-validation and final-fit execution of a workflow.

use crate::data::folds::FoldPlan;
use crate::data::record::Dataset;
use crate::data::split::Split;
use crate::error::Result;
use crate::eval::metrics::{CrossValidationResult, EvaluationResult, PartitionKind};
use crate::training::reproducibility::SeedManager;
use crate::training::workflow::{FittedWorkflow, Workflow};
use rayon::prelude::*;

/// Output of final-fit mode: the workflow fit on the whole training subset,
/// scored on the holdout and re-scored on its own training rows.
#[derive(Debug, Clone)]
pub struct FinalFit {
    pub fitted: FittedWorkflow,
    pub train: EvaluationResult,
    pub holdout: EvaluationResult,
}

/// Runs workflows against one immutable dataset.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    dataset: &'a Dataset,
    seeds: SeedManager,
}

impl<'a> Evaluator<'a> {
    pub fn new(dataset: &'a Dataset, seeds: SeedManager) -> Self {
        Self { dataset, seeds }
    }

    /// Fit a fresh workflow per fold and score it on that fold's held-out rows.
    ///
    /// Folds run in parallel and share nothing but the dataset. The first
    /// failing fold aborts the whole evaluation.
    pub fn cross_validate(&self, workflow: &Workflow, plan: &FoldPlan) -> Result<CrossValidationResult> {
        let scores = plan
            .folds()
            .par_iter()
            .map(|fold| {
                let analysis = self
                    .dataset
                    .partition(format!("fold-{}-analysis", fold.index), &fold.analysis)?;
                let assessment = self
                    .dataset
                    .partition(format!("fold-{}-assessment", fold.index), &fold.assessment)?;

                let seed = self.seeds.seed_for_indexed(workflow.name(), fold.index);
                let fitted = workflow.fit(&analysis, seed)?;
                let score = fitted
                    .evaluate(&assessment, PartitionKind::CrossValidation)?
                    .rmse()?;
                tracing::debug!(
                    model = workflow.name(),
                    fold = fold.index,
                    analysis_rows = analysis.len(),
                    assessment_rows = assessment.len(),
                    rmse = score,
                    "Fold evaluated"
                );
                Ok(score)
            })
            .collect::<Result<Vec<f64>>>()?;

        let result = CrossValidationResult::from_scores(workflow.name(), scores, "rmse")?;
        tracing::info!(
            model = workflow.name(),
            folds = plan.fold_count(),
            mean_rmse = result.mean_score,
            std_err = result.std_err,
            "Cross-validation complete"
        );
        Ok(result)
    }

    /// Fit once on `split.train`, then predict both `holdout` and `train`.
    pub fn final_fit(&self, workflow: &Workflow, split: &Split) -> Result<FinalFit> {
        let train = split.train_partition(self.dataset)?;
        let holdout = split.holdout_partition(self.dataset)?;

        let seed = self.seeds.seed_for(&format!("{}/final", workflow.name()));
        let fitted = workflow.fit(&train, seed)?;
        let holdout_eval = fitted.evaluate(&holdout, PartitionKind::Holdout)?;
        let train_eval = fitted.evaluate(&train, PartitionKind::Train)?;

        tracing::info!(
            model = workflow.name(),
            train_rmse = train_eval.rmse()?,
            holdout_rmse = holdout_eval.rmse()?,
            "Final fit evaluated"
        );
        Ok(FinalFit {
            fitted,
            train: train_eval,
            holdout: holdout_eval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::spec::ModelSpec;
    use crate::data::folds::FoldAssigner;
    use crate::data::record::Record;
    use crate::data::split::Splitter;
    use crate::error::MlError;
    use crate::features::recipe::Recipe;

    fn dataset(n: usize) -> Dataset {
        let records = (0..n)
            .map(|i| {
                let items = (i % 7) as f64 + 1.0;
                let city = ["berlin", "lagos", "lima"][i % 3];
                Record::new(0.2 + 0.05 * items + (i % 3) as f64 * 0.1)
                    .with_numeric("items", items)
                    .with_categorical("city", city)
            })
            .collect();
        Dataset::new(records).unwrap()
    }

    fn workflow() -> Workflow {
        Workflow::new(
            Recipe::new().numeric("items").categorical("city", Some(0.01)),
            ModelSpec::linear(),
        )
    }

    #[test]
    fn test_cross_validation_scores_every_fold() {
        let data = dataset(120);
        let split = Splitter::new(0.75, 4, 1).unwrap().split(&data).unwrap();
        let plan = FoldAssigner::new(5, 4, 2)
            .unwrap()
            .assign(&data, &split.train)
            .unwrap();
        let evaluator = Evaluator::new(&data, SeedManager::new(3));
        let cv = evaluator.cross_validate(&workflow(), &plan).unwrap();
        assert_eq!(cv.fold_scores.len(), 5);
        assert!(cv.mean_score < 1e-4);
    }

    #[test]
    fn test_final_fit_scores_train_and_holdout() {
        let data = dataset(80);
        let split = Splitter::new(0.75, 4, 1).unwrap().split(&data).unwrap();
        let evaluator = Evaluator::new(&data, SeedManager::new(3));
        let result = evaluator.final_fit(&workflow(), &split).unwrap();
        assert_eq!(result.train.len(), split.train.len());
        assert_eq!(result.holdout.len(), split.holdout.len());
        assert_eq!(result.holdout.partition, PartitionKind::Holdout);
        assert_eq!(result.fitted.state().fit_rows(), split.train.len());
    }

    #[test]
    fn test_failing_fold_aborts_run() {
        let data = dataset(40);
        let split = Splitter::new(0.75, 2, 1).unwrap().split(&data).unwrap();
        let plan = FoldAssigner::new(3, 2, 2)
            .unwrap()
            .assign(&data, &split.train)
            .unwrap();
        let broken = Workflow::new(Recipe::new().numeric("missing"), ModelSpec::linear());
        let err = Evaluator::new(&data, SeedManager::new(0))
            .cross_validate(&broken, &plan)
            .unwrap_err();
        assert!(matches!(err, MlError::SchemaMismatch { .. }));
    }
}
