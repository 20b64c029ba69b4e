//! End-to-end pipeline: filter → split → folds → evaluate → compare → select.

use crate::algorithms::spec::ModelSpec;
use crate::config::PipelineConfig;
use crate::data::filter::OutlierFilter;
use crate::data::folds::{FoldAssigner, FoldPlan};
use crate::data::record::Dataset;
use crate::data::split::{Split, Splitter};
use crate::error::{MlError, Result};
use crate::eval::comparison::{ComparisonReport, Selection};
use crate::eval::evaluator::{Evaluator, FinalFit};
use crate::eval::metrics::CrossValidationResult;
use crate::features::recipe::{Recipe, RecipeState};
use crate::training::reproducibility::{RunFingerprint, SeedManager};
use crate::training::workflow::Workflow;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Named importance of one feature column of the selected model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub column: String,
    pub importance: f64,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub variant: OutlierFilter,
    pub random_seed: u64,
    pub rows_in: usize,
    pub rows_kept: usize,
    pub split: Split,
    pub folds: FoldPlan,
    pub report: ComparisonReport,
    pub selection: Selection,
    /// Recipe state of the selected model's final fit.
    pub recipe: RecipeState,
    pub importances: Vec<FeatureImportance>,
    pub fingerprint: RunFingerprint,
}

/// Runs both competing workflows against one dataset.
#[derive(Debug, Clone)]
pub struct PrepTimePipeline {
    config: PipelineConfig,
}

impl PrepTimePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// One workflow per competing model spec, all sharing the same recipe.
    pub fn workflows(&self) -> Vec<Workflow> {
        let recipe = Recipe::from_config(&self.config.recipe);
        ModelSpec::competitors(&self.config.models)
            .into_iter()
            .map(|spec| Workflow::new(recipe.clone(), spec))
            .collect()
    }

    pub fn run(&self, dataset: &Dataset) -> Result<PipelineRun> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let split_cfg = &self.config.split;

        let filtered = dataset.filtered(&self.config.filter);
        tracing::info!(
            run_id = %run_id,
            variant = self.config.filter.name(),
            rows_in = dataset.len(),
            rows_kept = filtered.len(),
            "Applied outlier filter"
        );

        let seeds = SeedManager::new(split_cfg.random_seed);
        let split = Splitter::new(split_cfg.train_fraction, split_cfg.strata, seeds.seed_for("split"))?
            .split(&filtered)?;
        tracing::info!(
            train = split.train.len(),
            holdout = split.holdout.len(),
            "Split dataset"
        );

        let folds = FoldAssigner::new(split_cfg.fold_count, split_cfg.strata, seeds.seed_for("folds"))?
            .assign(&filtered, &split.train)?;
        tracing::info!(folds = folds.fold_count(), rows = folds.rows().len(), "Assigned folds");

        let evaluator = Evaluator::new(&filtered, seeds);
        let workflows = self.workflows();
        let outcomes = workflows
            .par_iter()
            .map(|wf| {
                let cv = evaluator.cross_validate(wf, &folds)?;
                let final_fit = evaluator.final_fit(wf, &split)?;
                Ok((wf.spec().complexity(), cv, final_fit))
            })
            .collect::<Result<Vec<(usize, CrossValidationResult, FinalFit)>>>()?;

        let mut report = ComparisonReport::new();
        for (complexity, cv, final_fit) in &outcomes {
            report.register(cv.model.clone(), *complexity);
            report.add_cross_validation(cv)?;
            report.add_evaluation(&final_fit.train)?;
            report.add_evaluation(&final_fit.holdout)?;
        }
        let selection = report.select(&self.config.selection)?;

        let chosen = outcomes
            .into_iter()
            .map(|(_, _, final_fit)| final_fit.fitted)
            .find(|fitted| fitted.model() == selection.chosen)
            .ok_or_else(|| {
                MlError::training(format!(
                    "selected model '{}' has no final fit",
                    selection.chosen
                ))
            })?;
        let importances = chosen
            .artifact()
            .feature_importances()
            .into_iter()
            .map(|(column, importance)| FeatureImportance { column, importance })
            .collect();
        let (recipe, _) = chosen.into_parts();

        let fingerprint = RunFingerprint::compute(&split, &folds, &recipe, &report)?;
        tracing::info!(
            run_id = %run_id,
            chosen = %selection.chosen,
            fingerprint = %fingerprint.metrics,
            "Pipeline run complete"
        );

        Ok(PipelineRun {
            run_id,
            started_at,
            variant: self.config.filter.clone(),
            random_seed: split_cfg.random_seed,
            rows_in: dataset.len(),
            rows_kept: filtered.len(),
            split,
            folds,
            report,
            selection,
            recipe,
            importances,
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoricalGroup, RecipeConfig};
    use crate::data::record::{Record, fields};

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.split.fold_count = 3;
        config.split.strata = 2;
        config.models.tree_count = 5;
        config.recipe = RecipeConfig {
            numeric_fields: vec![fields::NUMBER_OF_ITEMS.to_string()],
            categorical_groups: vec![CategoricalGroup::new(&[fields::CITY], Some(0.01))],
        };
        config
    }

    fn dataset(n: usize) -> Dataset {
        let records = (0..n)
            .map(|i| {
                let items = ((i / 2) % 6) as f64 + 1.0;
                let city = ["austin", "dublin"][i % 2];
                Record::new(0.3 + 0.1 * items + if city == "dublin" { 0.2 } else { 0.0 })
                    .with_numeric(fields::NUMBER_OF_ITEMS, items)
                    .with_categorical(fields::CITY, city)
            })
            .collect();
        Dataset::new(records).unwrap()
    }

    #[test]
    fn test_run_produces_full_report() {
        let run = PrepTimePipeline::new(config()).unwrap().run(&dataset(90)).unwrap();
        assert_eq!(run.rows_in, 90);
        assert_eq!(run.rows_kept, 90);
        assert_eq!(run.split.train.len() + run.split.holdout.len(), 90);
        assert_eq!(run.report.rows().len(), 6);
        assert_eq!(run.report.models().count(), 2);
        assert!(!run.importances.is_empty());
        assert_eq!(run.recipe.fit_rows(), run.split.train.len());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = config();
        bad.split.fold_count = 1;
        assert!(matches!(PrepTimePipeline::new(bad), Err(MlError::InvalidConfig(_))));
    }

    #[test]
    fn test_filter_runs_before_split() {
        let mut cfg = config();
        cfg.filter = OutlierFilter::Asap { max_prep_hours: 0.75 };
        let run = PrepTimePipeline::new(cfg).unwrap().run(&dataset(120)).unwrap();
        assert!(run.rows_kept < run.rows_in);
        assert_eq!(run.split.train.len() + run.split.holdout.len(), run.rows_kept);
    }
}
