//! Optimizer output types

use serde::{Deserialize, Serialize};

use super::{IngredientId, NutrientId, RatioIngredient, TargetNutrient};

/// What a suggestion asks the formulator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Add a catalog ingredient that is not in the blend yet
    AddIngredient,
    /// Raise the inclusion of an ingredient already in the blend
    IncreaseInclusion,
    /// Nothing known supplies the nutrient
    NoKnownSource,
}

/// A recommendation for reaching a nutrient target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSuggestion {
    pub kind: SuggestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<IngredientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_name: Option<String>,
    pub nutrient_id: NutrientId,
    pub nutrient_name: String,
    pub target: f64,
    /// Concentration of the nutrient in the suggested ingredient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
}

/// Why the heuristic search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    Stagnated,
    MaxIterations,
    TimeLimit,
}

/// Statistics from a heuristic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub iterations: usize,
    pub best_cost: f64,
    pub final_step_size: f64,
    pub stop_reason: StopReason,
}

/// Outcome of an optimization call
///
/// `success` reports whether the strategy produced a trustworthy blend
/// (solver status for the exact optimizer). Whether every target was hit is
/// reported separately through `unmet_targets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_ingredients: Option<Vec<RatioIngredient>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<IngredientSuggestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviations: Option<Vec<TargetNutrient>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmet_targets: Option<Vec<TargetNutrient>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchStats>,
}

impl OptimizationResult {
    /// Unsuccessful result carrying only an explanation
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, name: &str) -> Self {
        self.strategy = Some(name.to_string());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<IngredientSuggestion>) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    /// Number of targets reported as unmet (0 when not reported)
    pub fn unmet_count(&self) -> usize {
        self.unmet_targets.as_ref().map_or(0, Vec::len)
    }
}
