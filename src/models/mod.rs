//! Data models
//!
//! Catalog entities and the blend types the optimizers exchange.

mod ingredient;
mod nutrient;
mod program;
mod result;
mod target;

pub use ingredient::{Composition, Ingredient, IngredientId, RatioIngredient};
pub use nutrient::{Nutrient, NutrientId};
pub use program::{AnimalProgramStage, StageTarget};
pub use result::{IngredientSuggestion, OptimizationResult, SearchStats, StopReason, SuggestionKind};
pub use target::TargetNutrient;
