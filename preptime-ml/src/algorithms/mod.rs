//! Model families: linear regression and the random forest ensemble.

pub mod forest;
pub mod linear;
pub mod spec;
pub mod tree;

pub use forest::{ForestParams, RandomForest};
pub use linear::LinearRegression;
pub use spec::{ModelArtifact, ModelSpec};
