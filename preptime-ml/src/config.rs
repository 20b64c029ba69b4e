//! Configuration for the preparation-time pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> explicit file -> environment. Every field has a serde default so a
//! partial TOML file is always valid.

use crate::data::filter::OutlierFilter;
use crate::data::record::fields;
use crate::error::{MlError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Train/holdout split and cross-validation resampling.
    #[serde(default)]
    pub split: SplitConfig,
    /// Feature recipe.
    #[serde(default)]
    pub recipe: RecipeConfig,
    /// Model hyperparameters.
    #[serde(default)]
    pub models: ModelConfig,
    /// Upstream outlier filter selecting the business variant.
    #[serde(default)]
    pub filter: OutlierFilter,
    /// Model selection policy.
    #[serde(default)]
    pub selection: SelectionConfig,
}

/// Resampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows assigned to the training subset (0.0-1.0, exclusive).
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,
    /// Number of cross-validation folds.
    #[serde(default = "default_fold_count")]
    pub fold_count: usize,
    /// Number of target quantile bins used for stratification.
    #[serde(default = "default_strata")]
    pub strata: usize,
    /// Seed from which every downstream random stream is derived.
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
            fold_count: default_fold_count(),
            strata: default_strata(),
            random_seed: default_seed(),
        }
    }
}

fn default_train_fraction() -> f64 {
    0.75
}

fn default_fold_count() -> usize {
    10
}

fn default_strata() -> usize {
    4
}

fn default_seed() -> u64 {
    42
}

/// A set of categorical fields sharing one rare-level threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalGroup {
    pub fields: Vec<String>,
    /// Levels whose fit-partition frequency is below this proportion collapse
    /// into "other". `None` disables collapsing for the group.
    #[serde(default)]
    pub rare_threshold: Option<f64>,
}

impl CategoricalGroup {
    pub fn new(fields: &[&str], rare_threshold: Option<f64>) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            rare_threshold,
        }
    }
}

/// Feature recipe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeConfig {
    #[serde(default = "default_numeric_fields")]
    pub numeric_fields: Vec<String>,
    #[serde(default = "default_categorical_groups")]
    pub categorical_groups: Vec<CategoricalGroup>,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            numeric_fields: default_numeric_fields(),
            categorical_groups: default_categorical_groups(),
        }
    }
}

impl RecipeConfig {
    /// Categorical fields with their thresholds, in declaration order.
    pub fn categorical_fields(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.categorical_groups.iter().flat_map(|group| {
            group
                .fields
                .iter()
                .map(move |f| (f.as_str(), group.rare_threshold))
        })
    }
}

fn default_numeric_fields() -> Vec<String> {
    vec![
        fields::NUMBER_OF_ITEMS.to_string(),
        fields::ORDER_VALUE.to_string(),
    ]
}

fn default_categorical_groups() -> Vec<CategoricalGroup> {
    vec![
        CategoricalGroup::new(
            &[fields::TYPE_OF_FOOD, fields::HOUR_OF_DAY, fields::COUNTRY],
            Some(0.015),
        ),
        CategoricalGroup::new(&[fields::CITY, fields::RESTAURANT_ID], Some(0.005)),
        CategoricalGroup::new(&[fields::DAY_OF_WEEK], None),
    ]
}

/// Model hyperparameters shared by the two competing specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of trees in the ensemble model.
    #[serde(default = "default_tree_count")]
    pub tree_count: usize,
    /// Minimum rows in a tree node before it may be split.
    #[serde(default = "default_min_node_size")]
    pub min_node_size: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Features sampled per split; floor(sqrt(p)) when unset.
    #[serde(default)]
    pub max_features: Option<usize>,
    /// Ridge penalty stabilising the least-squares solve.
    #[serde(default = "default_linear_ridge")]
    pub linear_ridge: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tree_count: default_tree_count(),
            min_node_size: default_min_node_size(),
            max_depth: None,
            max_features: None,
            linear_ridge: default_linear_ridge(),
        }
    }
}

fn default_tree_count() -> usize {
    500
}

fn default_min_node_size() -> usize {
    5
}

fn default_linear_ridge() -> f64 {
    1e-8
}

/// Model selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Half-width of the cross-validation interval, in standard errors.
    #[serde(default = "default_interval_width")]
    pub interval_width: f64,
    /// Relative train/holdout gap above which a model is flagged as overfit.
    #[serde(default = "default_overfit_ratio")]
    pub overfit_ratio: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            interval_width: default_interval_width(),
            overfit_ratio: default_overfit_ratio(),
        }
    }
}

fn default_interval_width() -> f64 {
    2.0
}

fn default_overfit_ratio() -> f64 {
    0.25
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let split = &self.split;
        if !(split.train_fraction > 0.0 && split.train_fraction < 1.0) {
            return Err(MlError::invalid_config(format!(
                "train_fraction must be in (0, 1), got {}",
                split.train_fraction
            )));
        }
        if split.fold_count < 2 {
            return Err(MlError::invalid_config(format!(
                "fold_count must be at least 2, got {}",
                split.fold_count
            )));
        }
        if split.strata == 0 {
            return Err(MlError::invalid_config("strata must be at least 1"));
        }
        for (field, threshold) in self.recipe.categorical_fields() {
            if let Some(t) = threshold {
                if !(0.0..1.0).contains(&t) {
                    return Err(MlError::invalid_config(format!(
                        "rare_threshold for '{field}' must be in [0, 1), got {t}"
                    )));
                }
            }
        }
        if self.models.tree_count == 0 {
            return Err(MlError::invalid_config("tree_count must be at least 1"));
        }
        if self.models.min_node_size == 0 {
            return Err(MlError::invalid_config("min_node_size must be at least 1"));
        }
        if self.models.linear_ridge < 0.0 {
            return Err(MlError::invalid_config("linear_ridge must be non-negative"));
        }
        let width = self.selection.interval_width;
        if width.is_nan() || width < 0.0 {
            return Err(MlError::invalid_config(
                "interval_width must be non-negative",
            ));
        }
        let ratio = self.selection.overfit_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(MlError::invalid_config(format!(
                "overfit_ratio must be in [0, 1), got {ratio}"
            )));
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `PREPTIME_`, `__` for nesting)
/// 2. Explicit config file
/// 3. Workspace-local config (`.preptime/config.toml`)
/// 4. User config (`~/.config/preptime/config.toml`)
/// 5. Built-in defaults
pub fn load_config(workspace: Option<&Path>, explicit: Option<&Path>) -> Result<PipelineConfig> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "preptime", "preptime") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".preptime").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(MlError::invalid_config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    // PREPTIME_SPLIT__FOLD_COUNT, PREPTIME_MODELS__TREE_COUNT, ...
    figment = figment.merge(Env::prefixed("PREPTIME_").split("__"));

    let config: PipelineConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
