//! Metrics, the cross-validation/final-fit evaluator, and the comparison
//! report that drives model selection.

pub mod comparison;
pub mod evaluator;
pub mod metrics;

pub use comparison::{ComparisonReport, ComparisonRow, OverfittingCheck, Selection, SelectionReason};
pub use evaluator::{Evaluator, FinalFit};
pub use metrics::{CrossValidationResult, EvaluationResult, PartitionKind, rmse};
