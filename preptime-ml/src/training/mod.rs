//! Workflows and reproducibility helpers.

pub mod reproducibility;
pub mod workflow;

pub use reproducibility::{RunFingerprint, SeedManager};
pub use workflow::{FittedWorkflow, Workflow};
