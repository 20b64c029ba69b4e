//! Dataset model and resampling.

pub mod filter;
pub mod folds;
pub mod record;
pub mod split;
pub mod strata;

pub use filter::OutlierFilter;
pub use folds::{Fold, FoldAssigner, FoldPlan};
pub use record::{Dataset, OrderRecord, Partition, Record, fields};
pub use split::{Split, Splitter};
