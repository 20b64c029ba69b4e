//! Fit-then-apply feature recipe.
//!
//! Stages run in a fixed order: rare-level collapsing, novel-level handling,
//! one-hot encoding, zero-variance filtering, numeric scaling. [`Recipe::fit`]
//! learns every parameter from the fit partition and freezes it into a
//! [`RecipeState`]; [`RecipeState::apply`] replays those parameters on any
//! partition and never recomputes them.

use crate::config::RecipeConfig;
use crate::data::record::{Partition, Record};
use crate::error::{MlError, Result};
use crate::features::levels::{Level, LevelSet};
use crate::features::matrix::FeatureMatrix;
use crate::features::scaling::{Scaling, check_variance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved level whose indicator survives zero-variance filtering, so unseen
/// categories always have a column of their own.
const RESERVED: Level = Level::Novel;

/// Declarative recipe: which fields are numeric, which are categorical, and
/// each categorical field's rare-level threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recipe {
    numeric: Vec<String>,
    categorical: Vec<(String, Option<f64>)>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RecipeConfig) -> Self {
        Self {
            numeric: config.numeric_fields.clone(),
            categorical: config
                .categorical_fields()
                .map(|(f, t)| (f.to_string(), t))
                .collect(),
        }
    }

    pub fn numeric(mut self, field: impl Into<String>) -> Self {
        self.numeric.push(field.into());
        self
    }

    pub fn categorical(mut self, field: impl Into<String>, rare_threshold: Option<f64>) -> Self {
        self.categorical.push((field.into(), rare_threshold));
        self
    }

    /// Learn the recipe parameters from `partition`.
    pub fn fit(&self, partition: &Partition<'_>) -> Result<RecipeState> {
        if partition.is_empty() {
            return Err(MlError::insufficient(
                format!("recipe fit on '{}'", partition.name()),
                "partition is empty",
            ));
        }
        let rows = partition.rows();
        let mut dropped = Vec::new();

        let mut categorical = Vec::with_capacity(self.categorical.len());
        for (field, threshold) in &self.categorical {
            let values = categorical_column(partition, field)?;
            let levels = LevelSet::fit(field.as_str(), values.iter().copied(), *threshold);
            if !levels.collapsed().is_empty() {
                tracing::debug!(
                    field = %field,
                    collapsed = levels.collapsed().len(),
                    "Collapsed rare levels into 'other'"
                );
            }

            let mut hits: BTreeMap<Level, usize> = BTreeMap::new();
            for value in &values {
                *hits.entry(levels.resolve(value)).or_insert(0) += 1;
            }

            let mut kept = Vec::new();
            for level in levels.levels() {
                let count = hits.get(&level).copied().unwrap_or(0);
                let constant = count == 0 || count == rows.len();
                if constant && level != RESERVED {
                    dropped.push(column_name(field, &level));
                } else {
                    kept.push(level);
                }
            }
            categorical.push(CategoricalBlock { levels, kept });
        }

        let mut numeric = Vec::with_capacity(self.numeric.len());
        for field in &self.numeric {
            let values = numeric_column(partition, field)?;
            match check_variance(field, &values) {
                Ok(_) => numeric.push(NumericColumn {
                    field: field.clone(),
                    scaling: Scaling::fit(field, &values)?,
                }),
                Err(MlError::DegenerateColumn { column }) => dropped.push(column),
                Err(e) => return Err(e),
            }
        }

        if !dropped.is_empty() {
            tracing::debug!(columns = ?dropped, "Dropped zero-variance columns");
        }

        let fields = self
            .numeric
            .iter()
            .chain(self.categorical.iter().map(|(f, _)| f))
            .cloned()
            .collect();

        Ok(RecipeState {
            fields,
            numeric,
            categorical,
            dropped,
            fit_rows: rows.len(),
        })
    }
}

fn numeric_column(partition: &Partition<'_>, field: &str) -> Result<Vec<f64>> {
    partition
        .rows()
        .iter()
        .map(|r| numeric_value(partition, r, field))
        .collect()
}

fn categorical_column<'a>(partition: &Partition<'a>, field: &str) -> Result<Vec<&'a str>> {
    partition
        .rows()
        .iter()
        .map(|r| {
            r.categorical(field)
                .ok_or_else(|| MlError::schema(partition.name(), field))
        })
        .collect()
}

fn numeric_value(partition: &Partition<'_>, record: &Record, field: &str) -> Result<f64> {
    record
        .numeric(field)
        .ok_or_else(|| MlError::schema(partition.name(), field))
}

fn column_name(field: &str, level: &Level) -> String {
    format!("{field}_{}", level.label())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NumericColumn {
    field: String,
    scaling: Scaling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CategoricalBlock {
    levels: LevelSet,
    /// Levels whose indicator columns survived zero-variance filtering.
    kept: Vec<Level>,
}

/// Fitted recipe parameters. Immutable; reused verbatim on every partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeState {
    /// Every field the recipe was fit on, including ones later dropped.
    fields: Vec<String>,
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalBlock>,
    dropped: Vec<String>,
    fit_rows: usize,
}

impl RecipeState {
    /// Output column names, identical for every partition.
    pub fn columns(&self) -> Vec<String> {
        let numeric = self.numeric.iter().map(|c| c.field.clone());
        let indicators = self.categorical.iter().flat_map(|b| {
            b.kept
                .iter()
                .map(|level| column_name(b.levels.field(), level))
        });
        numeric.chain(indicators).collect()
    }

    /// Columns removed by zero-variance filtering.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }

    pub fn fit_rows(&self) -> usize {
        self.fit_rows
    }

    pub fn level_set(&self, field: &str) -> Option<&LevelSet> {
        self.categorical
            .iter()
            .map(|b| &b.levels)
            .find(|l| l.field() == field)
    }

    /// Resolve a raw categorical value against the frozen level set.
    pub fn resolve(&self, field: &str, value: &str) -> Option<Level> {
        self.level_set(field).map(|l| l.resolve(value))
    }

    pub fn scaling(&self, field: &str) -> Option<Scaling> {
        self.numeric
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.scaling)
    }

    /// Transform `partition` with the frozen parameters.
    pub fn apply(&self, partition: &Partition<'_>) -> Result<FeatureMatrix> {
        let columns = self.columns();
        let mut data = Vec::with_capacity(partition.len() * columns.len());

        for record in partition.rows() {
            if let Some(missing) = self.fields.iter().find(|f| !record.has_field(f)) {
                return Err(MlError::schema(partition.name(), missing.as_str()));
            }
            for col in &self.numeric {
                let value = numeric_value(partition, record, &col.field)?;
                data.push(col.scaling.apply(value));
            }
            for block in &self.categorical {
                let field = block.levels.field();
                let raw = record
                    .categorical(field)
                    .ok_or_else(|| MlError::schema(partition.name(), field))?;
                let level = block.levels.resolve(raw);
                data.extend(
                    block
                        .kept
                        .iter()
                        .map(|k| if *k == level { 1.0 } else { 0.0 }),
                );
            }
        }

        FeatureMatrix::from_rows(columns, partition.len(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::Dataset;

    fn food_dataset(spec: &[(&str, usize)]) -> Dataset {
        let records = spec
            .iter()
            .flat_map(|(level, n)| std::iter::repeat_n(*level, *n))
            .enumerate()
            .map(|(i, level)| {
                Record::new(i as f64)
                    .with_numeric("items", (i % 7) as f64)
                    .with_numeric("constant", 1.0)
                    .with_categorical("food", level)
            })
            .collect();
        Dataset::new(records).unwrap()
    }

    fn recipe() -> Recipe {
        Recipe::new()
            .numeric("items")
            .numeric("constant")
            .categorical("food", Some(0.02))
    }

    #[test]
    fn test_fit_collapses_and_drops() {
        let data = food_dataset(&[("A", 100), ("B", 100), ("C", 1)]);
        let state = recipe().fit(&data.all("train")).unwrap();

        assert_eq!(state.resolve("food", "C"), Some(Level::Other));
        assert_eq!(state.resolve("food", "D"), Some(Level::Novel));
        assert_eq!(
            state.columns(),
            vec!["items", "food_A", "food_B", "food_.other", "food_.novel"]
        );
        assert_eq!(state.dropped_columns(), &["constant".to_string()]);
    }

    #[test]
    fn test_unused_other_column_is_dropped() {
        let data = food_dataset(&[("A", 10), ("B", 10)]);
        let state = recipe().fit(&data.all("train")).unwrap();
        assert!(state.dropped_columns().contains(&"food_.other".to_string()));
        assert!(state.columns().contains(&"food_.novel".to_string()));
    }

    #[test]
    fn test_apply_uses_frozen_parameters() {
        let train = food_dataset(&[("A", 100), ("B", 100), ("C", 1)]);
        let state = recipe().fit(&train.all("train")).unwrap();

        // C is frequent here but was rare at fit time; D was never seen.
        let holdout = Dataset::new(vec![
            Record::new(0.0)
                .with_numeric("items", 100.0)
                .with_numeric("constant", 5.0)
                .with_categorical("food", "C"),
            Record::new(0.0)
                .with_numeric("items", 3.0)
                .with_numeric("constant", 5.0)
                .with_categorical("food", "D"),
        ])
        .unwrap();
        let m = state.apply(&holdout.all("holdout")).unwrap();

        assert_eq!(m.columns(), state.columns().as_slice());
        assert_eq!(m.column("food_.other").unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(m.column("food_.novel").unwrap().to_vec(), vec![0.0, 1.0]);

        let scaling = state.scaling("items").unwrap();
        assert_eq!(m.column("items").unwrap()[0], scaling.apply(100.0));
    }

    #[test]
    fn test_apply_is_bit_identical() {
        let data = food_dataset(&[("A", 30), ("B", 12), ("C", 3)]);
        let state = recipe().fit(&data.all("train")).unwrap();
        let a = state.apply(&data.all("train")).unwrap();
        let b = state.apply(&data.all("train")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let train = food_dataset(&[("A", 5), ("B", 5)]);
        let state = recipe().fit(&train.all("train")).unwrap();
        let holdout = Dataset::new(vec![
            Record::new(1.0)
                .with_numeric("items", 1.0)
                .with_numeric("constant", 1.0),
        ])
        .unwrap();
        let err = state.apply(&holdout.all("holdout")).unwrap_err();
        match err {
            MlError::SchemaMismatch { partition, field } => {
                assert_eq!(partition, "holdout");
                assert_eq!(field, "food");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_dropped_field_is_schema_mismatch() {
        let train = food_dataset(&[("A", 5), ("B", 5)]);
        let state = recipe().fit(&train.all("train")).unwrap();
        assert_eq!(state.dropped_columns(), &["constant".to_string()]);

        let holdout = Dataset::new(vec![
            Record::new(1.0)
                .with_numeric("items", 1.0)
                .with_categorical("food", "A"),
        ])
        .unwrap();
        let err = state.apply(&holdout.all("holdout")).unwrap_err();
        match err {
            MlError::SchemaMismatch { partition, field } => {
                assert_eq!(partition, "holdout");
                assert_eq!(field, "constant");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fit_on_empty_partition() {
        let data = Dataset::default();
        let err = recipe().fit(&data.all("train")).unwrap_err();
        assert!(matches!(err, MlError::InsufficientData { .. }));
    }
}
