//! # preptime-ml: preparation-time regression core
//!
//! Turns per-order records into model-ready feature matrices, trains a linear
//! model and a random forest under stratified k-fold cross-validation, and
//! compares them on held-out data to select the final model.
//!
//! ## Fit/apply contract
//!
//! Every stateful stage is split in two: `fit` consumes a training partition
//! and returns an immutable state value; `apply` takes that state plus any
//! partition and never recomputes it, so held-out rows never reach a fit.

// Foundation
pub mod config;
pub mod error;

// Data & resampling
pub mod data;

// Feature recipe
pub mod features;

// Model families
pub mod algorithms;

// Workflows & reproducibility
pub mod training;

// Evaluation & selection
pub mod eval;

// Orchestration
pub mod pipeline;

// Re-exports
pub use config::{PipelineConfig, load_config};
pub use data::{Dataset, OrderRecord, OutlierFilter, Record};
pub use error::{MlError, Result};
pub use eval::{ComparisonReport, Selection};
pub use pipeline::{PipelineRun, PrepTimePipeline};
