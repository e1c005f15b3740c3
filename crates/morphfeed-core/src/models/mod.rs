pub mod asset;
pub mod generation;
pub mod recipe;

pub use asset::{Asset, AssetStatus, MediaKind, NewAsset, RecipeRef, Visibility};
pub use generation::{GenerationRun, RunOutcome};
pub use recipe::{catalog, Recipe, RecipeSpec};
