//! Comparison report, overfitting check and model selection.

use crate::config::SelectionConfig;
use crate::error::{MlError, Result};
use crate::eval::metrics::{CrossValidationResult, EvaluationResult, PartitionKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (model, partition) metric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: String,
    pub partition: PartitionKind,
    pub rmse: f64,
    /// Standard error across folds; only set for cross-validation rows.
    pub std_err: Option<f64>,
    /// Rows scored, or folds for cross-validation rows.
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelEntry {
    name: String,
    complexity: usize,
}

/// Train/holdout gap of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverfittingCheck {
    pub model: String,
    pub train_rmse: f64,
    pub holdout_rmse: f64,
    /// `holdout_rmse - train_rmse`.
    pub gap: f64,
    /// `gap / holdout_rmse`.
    pub relative_gap: f64,
    pub flagged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// The model with the lowest cross-validated error had no competitor within noise.
    LowestError,
    /// A simpler model was statistically indistinguishable from the best one.
    SimplerWithinNoise,
    /// The best model overfit while a competitor within noise did not, or overfit less.
    LessOverfitWithinNoise,
}

/// Outcome of the selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub chosen: String,
    /// Model with the lowest cross-validated mean RMSE.
    pub lowest_error: String,
    /// Models whose intervals overlap the lowest-error model's, itself included.
    pub within_noise: Vec<String>,
    pub reason: SelectionReason,
    pub overfitting: Vec<OverfittingCheck>,
}

/// RMSE per model and partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    models: Vec<ModelEntry>,
    rows: Vec<ComparisonRow>,
}

impl ComparisonReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a competing model. Lower `complexity` is preferred within noise.
    pub fn register(&mut self, model: impl Into<String>, complexity: usize) {
        let name = model.into();
        match self.models.iter_mut().find(|m| m.name == name) {
            Some(entry) => entry.complexity = complexity,
            None => self.models.push(ModelEntry { name, complexity }),
        }
    }

    /// Insert a row, replacing any earlier row for the same (model, partition).
    pub fn add_row(&mut self, row: ComparisonRow) -> Result<()> {
        if !self.models.iter().any(|m| m.name == row.model) {
            return Err(MlError::invalid_config(format!(
                "model '{}' is not registered in the report",
                row.model
            )));
        }
        match self
            .rows
            .iter_mut()
            .find(|r| r.model == row.model && r.partition == row.partition)
        {
            Some(existing) => *existing = row,
            None => self.rows.push(row),
        }
        Ok(())
    }

    pub fn add_cross_validation(&mut self, cv: &CrossValidationResult) -> Result<()> {
        self.add_row(ComparisonRow {
            model: cv.model.clone(),
            partition: PartitionKind::CrossValidation,
            rmse: cv.mean_score,
            std_err: Some(cv.std_err),
            n: cv.fold_scores.len(),
        })
    }

    pub fn add_evaluation(&mut self, eval: &EvaluationResult) -> Result<()> {
        self.add_row(ComparisonRow {
            model: eval.model.clone(),
            partition: eval.partition,
            rmse: eval.rmse()?,
            std_err: None,
            n: eval.len(),
        })
    }

    pub fn get(&self, model: &str, partition: PartitionKind) -> Option<&ComparisonRow> {
        self.rows
            .iter()
            .find(|r| r.model == model && r.partition == partition)
    }

    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }

    /// Train/holdout gap for every model that has both rows.
    pub fn overfitting(&self, overfit_ratio: f64) -> Vec<OverfittingCheck> {
        self.models
            .iter()
            .filter_map(|m| {
                let train = self.get(&m.name, PartitionKind::Train)?.rmse;
                let holdout = self.get(&m.name, PartitionKind::Holdout)?.rmse;
                let gap = holdout - train;
                let relative_gap = if holdout > 0.0 { gap / holdout } else { 0.0 };
                Some(OverfittingCheck {
                    model: m.name.clone(),
                    train_rmse: train,
                    holdout_rmse: holdout,
                    gap,
                    relative_gap,
                    flagged: relative_gap > overfit_ratio,
                })
            })
            .collect()
    }

    /// Pick the final model.
    ///
    /// The lowest cross-validated mean wins unless other models' intervals
    /// (`mean ± interval_width * std_err`) overlap its own. Among those, a
    /// model not flagged by the overfitting check beats a flagged one, then
    /// lower complexity wins, then the smaller train/holdout gap.
    pub fn select(&self, config: &SelectionConfig) -> Result<Selection> {
        if self.models.is_empty() {
            return Err(MlError::insufficient("model selection", "no models registered"));
        }

        let mut scored = Vec::with_capacity(self.models.len());
        for m in &self.models {
            let cv = self.get(&m.name, PartitionKind::CrossValidation).ok_or_else(|| {
                MlError::insufficient(
                    "model selection",
                    format!("no cross-validation result for '{}'", m.name),
                )
            })?;
            let half = config.interval_width * cv.std_err.unwrap_or(0.0);
            scored.push((m, cv.rmse, cv.rmse - half, cv.rmse + half));
        }

        let best = scored
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.complexity.cmp(&b.0.complexity)))
            .ok_or_else(|| MlError::insufficient("model selection", "no scored models"))?;
        let (best_model, _, best_lo, best_hi) = *best;

        let overfitting = self.overfitting(config.overfit_ratio);
        let check = |name: &str| overfitting.iter().find(|c| c.model == name);
        for c in overfitting.iter().filter(|c| c.flagged) {
            tracing::warn!(
                model = %c.model,
                train_rmse = c.train_rmse,
                holdout_rmse = c.holdout_rmse,
                relative_gap = c.relative_gap,
                "Model flagged as overfit"
            );
        }

        let candidates: Vec<&ModelEntry> = scored
            .iter()
            .filter(|(_, _, lo, hi)| *lo <= best_hi && best_lo <= *hi)
            .map(|(m, ..)| *m)
            .collect();

        let preference = |m: &ModelEntry| {
            let c = check(&m.name);
            (
                c.is_some_and(|c| c.flagged),
                m.complexity,
                c.map_or(f64::INFINITY, |c| c.gap),
            )
        };
        let chosen = candidates
            .iter()
            .copied()
            .min_by(|a, b| {
                let (fa, ca, ga) = preference(*a);
                let (fb, cb, gb) = preference(*b);
                fa.cmp(&fb)
                    .then(ca.cmp(&cb))
                    .then(ga.total_cmp(&gb))
            })
            .unwrap_or(best_model);

        let reason = if chosen.name == best_model.name {
            SelectionReason::LowestError
        } else if preference(best_model).0 && !preference(chosen).0 {
            SelectionReason::LessOverfitWithinNoise
        } else if chosen.complexity < best_model.complexity {
            SelectionReason::SimplerWithinNoise
        } else {
            SelectionReason::LessOverfitWithinNoise
        };

        tracing::info!(
            chosen = %chosen.name,
            lowest_error = %best_model.name,
            within_noise = candidates.len(),
            reason = ?reason,
            "Model selected"
        );

        Ok(Selection {
            chosen: chosen.name.clone(),
            lowest_error: best_model.name.clone(),
            within_noise: candidates.iter().map(|m| m.name.clone()).collect(),
            reason,
            overfitting,
        })
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .models
            .iter()
            .map(|m| m.name.len())
            .max()
            .unwrap_or(5)
            .max(5);
        writeln!(
            f,
            "{:<width$}  {:<9}  {:>10}  {:>10}  {:>6}",
            "model", "partition", "rmse", "std_err", "n"
        )?;
        for m in &self.models {
            for partition in [PartitionKind::CrossValidation, PartitionKind::Train, PartitionKind::Holdout] {
                let Some(row) = self.get(&m.name, partition) else {
                    continue;
                };
                let std_err = row
                    .std_err
                    .map_or_else(|| "-".to_string(), |se| format!("{se:.4}"));
                writeln!(
                    f,
                    "{:<width$}  {:<9}  {:>10.4}  {:>10}  {:>6}",
                    row.model,
                    row.partition.to_string(),
                    row.rmse,
                    std_err,
                    row.n
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(model: &str, partition: PartitionKind, rmse: f64, std_err: Option<f64>) -> ComparisonRow {
        ComparisonRow {
            model: model.into(),
            partition,
            rmse,
            std_err,
            n: 10,
        }
    }

    fn report(
        linear: (f64, f64, f64, f64),
        forest: (f64, f64, f64, f64),
    ) -> ComparisonReport {
        let mut report = ComparisonReport::new();
        report.register("linear_regression", 0);
        report.register("random_forest", 1);
        for (name, (cv, se, train, holdout)) in [("linear_regression", linear), ("random_forest", forest)] {
            report
                .add_row(row(name, PartitionKind::CrossValidation, cv, Some(se)))
                .unwrap();
            report.add_row(row(name, PartitionKind::Train, train, None)).unwrap();
            report.add_row(row(name, PartitionKind::Holdout, holdout, None)).unwrap();
        }
        report
    }

    #[test]
    fn test_overfit_model_loses_within_noise() {
        // cv, se, train, holdout
        let report = report((0.38, 0.01, 0.34, 0.38), (0.37, 0.01, 0.22, 0.37));
        let selection = report.select(&SelectionConfig::default()).unwrap();
        assert_eq!(selection.lowest_error, "random_forest");
        assert_eq!(selection.chosen, "linear_regression");
        assert_eq!(selection.reason, SelectionReason::LessOverfitWithinNoise);
        let forest = selection
            .overfitting
            .iter()
            .find(|c| c.model == "random_forest")
            .unwrap();
        assert!(forest.flagged);
    }

    #[test]
    fn test_clear_winner_is_kept() {
        let report = report((0.60, 0.01, 0.58, 0.61), (0.30, 0.01, 0.25, 0.31));
        let selection = report.select(&SelectionConfig::default()).unwrap();
        assert_eq!(selection.chosen, "random_forest");
        assert_eq!(selection.reason, SelectionReason::LowestError);
        assert_eq!(selection.within_noise, vec!["random_forest"]);
    }

    #[test]
    fn test_simpler_model_wins_tie() {
        let report = report((0.41, 0.02, 0.39, 0.41), (0.40, 0.02, 0.36, 0.40));
        let selection = report.select(&SelectionConfig::default()).unwrap();
        assert_eq!(selection.chosen, "linear_regression");
        assert_eq!(selection.reason, SelectionReason::SimplerWithinNoise);
    }

    #[test]
    fn test_selection_requires_cv_rows() {
        let mut report = ComparisonReport::new();
        report.register("linear_regression", 0);
        report
            .add_row(row("linear_regression", PartitionKind::Holdout, 0.3, None))
            .unwrap();
        assert!(matches!(
            report.select(&SelectionConfig::default()),
            Err(MlError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_rows_replace_and_require_registration() {
        let mut report = ComparisonReport::new();
        assert!(report.add_row(row("ghost", PartitionKind::Train, 1.0, None)).is_err());
        report.register("m", 0);
        report.add_row(row("m", PartitionKind::Train, 1.0, None)).unwrap();
        report.add_row(row("m", PartitionKind::Train, 2.0, None)).unwrap();
        assert_eq!(report.rows().len(), 1);
        assert_eq!(report.get("m", PartitionKind::Train).unwrap().rmse, 2.0);
    }

    #[test]
    fn test_display_table() {
        let report = report((0.38, 0.01, 0.34, 0.38), (0.37, 0.01, 0.22, 0.37));
        let table = report.to_string();
        assert!(table.starts_with("model"));
        assert_eq!(table.lines().count(), 7);
        assert!(table.contains("random_forest      cv"));
    }
}
