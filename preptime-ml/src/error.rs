//! Error types for the preptime-ml crate.
//!
//! Data-shape problems are fatal and carry the partition/field context needed to
//! diagnose them. Category and variance edge cases are absorbed by the recipe and
//! never reach callers.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MlError>;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum MlError {
    /// A stratum, fold or split is too small or empty to proceed.
    #[error("Insufficient data for {context}: {reason}")]
    InsufficientData { context: String, reason: String },

    /// A partition lacks a field the recipe was fit on.
    #[error("Schema mismatch in partition '{partition}': missing field '{field}'")]
    SchemaMismatch { partition: String, field: String },

    /// A column has zero variance on the fit partition. Absorbed by the
    /// zero-variance stage of the recipe.
    #[error("Degenerate column '{column}': zero variance on fit partition")]
    DegenerateColumn { column: String },

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn insufficient(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn schema(partition: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            partition: partition.into(),
            field: field.into(),
        }
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
