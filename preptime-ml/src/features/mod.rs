//! Feature construction: level sets, scaling and the fit/apply recipe.

pub mod levels;
pub mod matrix;
pub mod recipe;
pub mod scaling;

pub use levels::{Level, LevelSet};
pub use matrix::FeatureMatrix;
pub use recipe::{Recipe, RecipeState};
pub use scaling::Scaling;
