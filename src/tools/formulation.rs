//! Formulation MCP Tools
//!
//! Resolve catalog ids into optimizer inputs, then run metrics, feasibility
//! checks and the optimizers over them.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rmcp::schemars;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AppConfig;
use crate::db::{CatalogSource, Database};
use crate::formulation::{
    compute_blend_metrics, describe_infeasible, detect_infeasible_targets, BlendOptimizer,
    ExactConfig, ExactOptimizer, FallbackOptimizer, HeuristicOptimizer, LpEngine, SuggestionEngine,
    DEFAULT_RATIO_TOTAL,
};
use crate::models::{
    Ingredient, IngredientSuggestion, Nutrient, NutrientId, OptimizationResult, RatioIngredient,
    TargetNutrient,
};
use crate::models::AnimalProgramStage;

/// An ingredient in a proposed blend
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BlendIngredientInput {
    /// Catalog ingredient id
    pub id: i64,
    /// Inclusion in parts of a 100-part blend (defaults to an even split)
    pub ratio: Option<f64>,
    /// Minimum inclusion
    pub min: Option<f64>,
    /// Maximum inclusion
    pub max: Option<f64>,
    /// Overrides the catalog cost per kg
    pub cost_per_kg: Option<f64>,
}

/// An explicit nutrient target
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TargetInput {
    pub nutrient_id: i64,
    /// Desired concentration, or lower edge of the band when `max` is set
    pub target: f64,
    /// Upper edge of the acceptable band
    pub max: Option<f64>,
    pub under_penalty_factor: Option<f64>,
    pub over_penalty_factor: Option<f64>,
}

/// Inputs shared by every formulation tool
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FormulationRequest {
    pub ingredients: Vec<BlendIngredientInput>,
    /// Program stage whose targets to use
    pub stage_id: Option<i64>,
    /// Explicit targets; these replace stage targets for the same nutrient
    #[serde(default)]
    pub targets: Vec<TargetInput>,
    /// exact | heuristic | auto (default)
    pub strategy: Option<String>,
    /// Partial ExactConfig overrides, e.g. {"deviation_weight": 500}
    pub exact_config: Option<Value>,
    /// Partial HeuristicConfig overrides, e.g. {"seed": 7, "time_limit_ms": 2000}
    pub heuristic_config: Option<Value>,
}

/// Which optimizer to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    Exact,
    Heuristic,
    #[default]
    Auto,
}

impl Strategy {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "lp" => Ok(Self::Exact),
            "heuristic" => Ok(Self::Heuristic),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "Unknown strategy '{}'; expected exact, heuristic or auto",
                other
            )),
        }
    }
}

/// Nutrient level in a blend
#[derive(Debug, Serialize)]
pub struct NutrientLevel {
    pub nutrient_id: NutrientId,
    pub name: String,
    pub unit: String,
    pub absolute: f64,
    pub concentration: f64,
}

/// Response for blend_metrics
#[derive(Debug, Serialize)]
pub struct BlendMetricsResponse {
    pub total_ratio: f64,
    pub nutrients: Vec<NutrientLevel>,
}

/// Response for check_feasibility
#[derive(Debug, Serialize)]
pub struct FeasibilityResponse {
    pub feasible: bool,
    pub message: String,
    pub infeasible_targets: Vec<TargetNutrient>,
    pub suggestions: Vec<IngredientSuggestion>,
}

/// Response for analyze_blend
#[derive(Debug, Serialize)]
pub struct BlendAnalysis {
    pub total_ratio: f64,
    /// Σ ratio × cost / Σ ratio, when every ingredient has a cost
    pub cost_per_kg: Option<f64>,
    pub deviations: Vec<TargetNutrient>,
    pub unmet_targets: Vec<TargetNutrient>,
    pub infeasible_targets: Vec<TargetNutrient>,
    pub suggestions: Vec<IngredientSuggestion>,
}

/// Look up blend ingredients in the catalog, preserving request order.
///
/// Ingredients without a ratio share `ratio_total` evenly.
pub fn resolve_blend(
    db: &Database,
    inputs: &[BlendIngredientInput],
    ratio_total: f64,
) -> Result<Vec<RatioIngredient>, String> {
    let mut seen = HashSet::new();
    if let Some(dup) = inputs.iter().find(|i| !seen.insert(i.id)) {
        return Err(format!("Ingredient {} appears more than once in the blend", dup.id));
    }

    let ids: Vec<i64> = inputs.iter().map(|i| i.id).collect();
    let found = db
        .with_conn(|conn| Ingredient::get_by_ids(conn, &ids))
        .map_err(|e| e.to_string())?;

    let even = if inputs.is_empty() {
        0.0
    } else {
        ratio_total / inputs.len() as f64
    };
    Ok(inputs
        .iter()
        .zip(found)
        .map(|(input, (ingredient, catalog_cost))| RatioIngredient {
            cost_per_kg: input.cost_per_kg.or(catalog_cost),
            min: input.min,
            max: input.max,
            ..RatioIngredient::new(ingredient, input.ratio.unwrap_or(even))
        })
        .collect())
}

/// Stage targets merged with explicit ones; explicit targets win per nutrient
pub fn resolve_targets(
    db: &Database,
    stage_id: Option<i64>,
    inputs: &[TargetInput],
) -> Result<Vec<TargetNutrient>, String> {
    let mut targets = match stage_id {
        Some(id) => db
            .with_conn(|conn| AnimalProgramStage::get_by_id(conn, id))
            .map_err(|e| e.to_string())?
            .to_targets(),
        None => Vec::new(),
    };

    for input in inputs {
        let nutrient = db
            .with_conn(|conn| Nutrient::get_by_id(conn, input.nutrient_id))
            .map_err(|e| e.to_string())?;
        let target = TargetNutrient {
            max: input.max,
            under_penalty_factor: input.under_penalty_factor,
            over_penalty_factor: input.over_penalty_factor,
            ..TargetNutrient::new(nutrient, input.target)
        };
        match targets.iter_mut().find(|t| t.nutrient_id() == input.nutrient_id) {
            Some(existing) => *existing = target,
            None => targets.push(target),
        }
    }

    Ok(targets)
}

/// `base` with the keys of a JSON object written over it
pub fn apply_overrides<T>(base: &T, overrides: Option<&Value>) -> Result<T, String>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(base).map_err(|e| e.to_string())?;
    match overrides {
        None | Some(Value::Null) => {}
        Some(Value::Object(fields)) => {
            if let Value::Object(target) = &mut merged {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Some(other) => return Err(format!("Config overrides must be a JSON object, got {}", other)),
    }
    serde_json::from_value(merged).map_err(|e| format!("Invalid config override: {}", e))
}

fn suggestion_engine(db: &Database) -> Result<SuggestionEngine, String> {
    let pool = db
        .ingredients()
        .map_err(|e| format!("Failed to load suggestion pool: {}", e))?;
    Ok(SuggestionEngine::new(pool))
}

pub fn blend_metrics(db: &Database, inputs: &[BlendIngredientInput]) -> Result<BlendMetricsResponse, String> {
    let blend = resolve_blend(db, inputs, DEFAULT_RATIO_TOTAL)?;
    let metrics = compute_blend_metrics(&blend);

    let nutrients: BTreeMap<NutrientId, &Nutrient> = blend
        .iter()
        .flat_map(|item| item.ingredient.compositions.iter())
        .map(|c| (c.nutrient.id, &c.nutrient))
        .collect();

    let levels = metrics
        .absolute_totals
        .iter()
        .filter_map(|(id, &absolute)| {
            nutrients.get(id).map(|n| NutrientLevel {
                nutrient_id: *id,
                name: n.name.clone(),
                unit: n.unit.clone(),
                absolute,
                concentration: metrics.concentration(*id),
            })
        })
        .collect();

    Ok(BlendMetricsResponse {
        total_ratio: metrics.total_ratio,
        nutrients: levels,
    })
}

pub fn check_feasibility(
    db: &Database,
    inputs: &[BlendIngredientInput],
    stage_id: Option<i64>,
    target_inputs: &[TargetInput],
) -> Result<FeasibilityResponse, String> {
    let blend = resolve_blend(db, inputs, DEFAULT_RATIO_TOTAL)?;
    let targets = resolve_targets(db, stage_id, target_inputs)?;
    let infeasible = detect_infeasible_targets(&blend, &targets);
    let suggestions = suggestion_engine(db)?.suggest_for_targets(&blend, &infeasible);

    let message = if infeasible.is_empty() {
        format!("All {} targets are reachable with this ingredient set", targets.len())
    } else {
        describe_infeasible(&infeasible)
    };

    Ok(FeasibilityResponse {
        feasible: infeasible.is_empty(),
        message,
        infeasible_targets: infeasible,
        suggestions,
    })
}

/// Evaluate the proposed ratios as-is against the targets
pub fn analyze_blend(
    db: &Database,
    inputs: &[BlendIngredientInput],
    stage_id: Option<i64>,
    target_inputs: &[TargetInput],
) -> Result<BlendAnalysis, String> {
    let blend = resolve_blend(db, inputs, DEFAULT_RATIO_TOTAL)?;
    let targets = resolve_targets(db, stage_id, target_inputs)?;
    let metrics = compute_blend_metrics(&blend);
    let unmet_tolerance = ExactConfig::default().unmet_tolerance;

    let deviations: Vec<TargetNutrient> = targets
        .iter()
        .map(|t| t.with_actual(metrics.concentration(t.nutrient_id())))
        .collect();
    let unmet: Vec<TargetNutrient> = deviations
        .iter()
        .filter(|d| d.is_unmet(unmet_tolerance))
        .cloned()
        .collect();
    let infeasible = detect_infeasible_targets(&blend, &targets);
    let suggestions = suggestion_engine(db)?.suggest_for_targets(&blend, &unmet);

    let cost_per_kg = if metrics.total_ratio > 0.0 {
        blend
            .iter()
            .map(|item| item.cost_per_kg.map(|c| c * item.ratio))
            .sum::<Option<f64>>()
            .map(|weighted| weighted / metrics.total_ratio)
    } else {
        None
    };

    Ok(BlendAnalysis {
        total_ratio: metrics.total_ratio,
        cost_per_kg,
        deviations,
        unmet_targets: unmet,
        infeasible_targets: infeasible,
        suggestions,
    })
}

/// Resolve the request and run the chosen optimizer
pub async fn optimize_blend(
    db: &Database,
    engine: Arc<LpEngine>,
    config: &AppConfig,
    request: &FormulationRequest,
) -> Result<OptimizationResult, String> {
    let strategy = match request.strategy.as_deref() {
        Some(s) => Strategy::parse(s)?,
        None => Strategy::default(),
    };
    let exact_config = apply_overrides(&config.exact_config(), request.exact_config.as_ref())?;
    let heuristic_config = apply_overrides(&config.heuristic_config(), request.heuristic_config.as_ref())?;
    let ratio_total = match strategy {
        Strategy::Heuristic => heuristic_config.ratio_total,
        Strategy::Exact | Strategy::Auto => exact_config.ratio_total,
    };

    let blend = resolve_blend(db, &request.ingredients, ratio_total)?;
    let targets = resolve_targets(db, request.stage_id, &request.targets)?;
    let suggestions = suggestion_engine(db)?;

    let exact = ExactOptimizer::new(engine)
        .with_config(exact_config)
        .with_suggestions(suggestions.clone());
    let heuristic = HeuristicOptimizer::new(heuristic_config).with_suggestions(suggestions);

    let optimizer: Box<dyn BlendOptimizer> = match strategy {
        Strategy::Exact => Box::new(exact),
        Strategy::Heuristic => Box::new(heuristic),
        Strategy::Auto => Box::new(FallbackOptimizer::new(Box::new(exact), Box::new(heuristic))),
    };

    tracing::info!(
        strategy = optimizer.name(),
        ingredients = blend.len(),
        targets = targets.len(),
        "optimizing blend"
    );
    Ok(optimizer.optimize(&blend, &targets).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::fixtures::seeded_catalog;
    use crate::formulation::HeuristicConfig;
    use crate::models::SuggestionKind;
    use serde_json::json;

    fn input(id: i64) -> BlendIngredientInput {
        BlendIngredientInput {
            id,
            ratio: None,
            min: None,
            max: None,
            cost_per_kg: None,
        }
    }

    fn request(ids: &[i64], stage_id: Option<i64>, strategy: &str) -> FormulationRequest {
        FormulationRequest {
            ingredients: ids.iter().map(|&id| input(id)).collect(),
            stage_id,
            targets: Vec::new(),
            strategy: Some(strategy.to_string()),
            exact_config: None,
            heuristic_config: Some(json!({ "seed": 1 })),
        }
    }

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_resolve_blend_uses_catalog_cost_and_even_split() {
        let db = seeded_catalog();
        let mut soy = input(11);
        soy.cost_per_kg = Some(0.5);
        let blend = resolve_blend(&db, &[input(10), soy], DEFAULT_RATIO_TOTAL).unwrap();
        assert_eq!(blend[0].name(), "Corn");
        assert_eq!(blend[0].cost_per_kg, Some(0.21));
        assert_eq!(blend[1].cost_per_kg, Some(0.5));
        assert_eq!(blend[0].ratio, 50.0);

        let per_kg = resolve_blend(&db, &[input(10), input(11)], 1.0).unwrap();
        assert_eq!(per_kg[0].ratio, 0.5);

        assert!(resolve_blend(&db, &[input(10), input(10)], DEFAULT_RATIO_TOTAL)
            .unwrap_err()
            .contains("more than once"));
        assert!(resolve_blend(&db, &[input(99)], DEFAULT_RATIO_TOTAL).is_err());
    }

    #[test]
    fn test_explicit_targets_replace_stage_targets() {
        let db = seeded_catalog();
        let explicit = TargetInput {
            nutrient_id: 1,
            target: 18.0,
            max: None,
            under_penalty_factor: None,
            over_penalty_factor: None,
        };
        let targets = resolve_targets(&db, Some(100), &[explicit]).unwrap();
        assert_eq!(targets.len(), 2);
        let protein = targets.iter().find(|t| t.nutrient_id() == 1).unwrap();
        assert_eq!(protein.target, 18.0);
        let calcium = targets.iter().find(|t| t.nutrient_id() == 2).unwrap();
        assert_eq!(calcium.max, Some(1.2));
    }

    #[test]
    fn test_apply_overrides() {
        let base = HeuristicConfig::default();
        let merged = apply_overrides(&base, Some(&json!({ "max_iterations": 10 }))).unwrap();
        assert_eq!(merged.max_iterations, 10);
        assert_eq!(merged.tolerance, base.tolerance);

        let same: ExactConfig = apply_overrides(&ExactConfig::default(), None).unwrap();
        assert_eq!(same, ExactConfig::default());

        assert!(apply_overrides(&base, Some(&json!([1, 2]))).is_err());
        assert!(apply_overrides(&base, Some(&json!({ "max_iterations": "many" }))).is_err());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(Strategy::parse("Exact").unwrap(), Strategy::Exact);
        assert_eq!(Strategy::parse(" heuristic ").unwrap(), Strategy::Heuristic);
        assert!(Strategy::parse("genetic").is_err());
    }

    #[test]
    fn test_feasibility_flags_missing_calcium() {
        let db = seeded_catalog();
        let response = check_feasibility(&db, &[input(10), input(11)], Some(100), &[]).unwrap();
        assert!(!response.feasible);
        assert_eq!(response.infeasible_targets.len(), 1);
        assert_eq!(response.infeasible_targets[0].nutrient.name, "Calcium");
        let names: Vec<_> = response
            .suggestions
            .iter()
            .map(|s| s.ingredient_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Limestone", "Fish Meal"]);
        assert!(response.suggestions.iter().all(|s| s.kind == SuggestionKind::AddIngredient));
    }

    #[test]
    fn test_blend_metrics_names_nutrients() {
        let db = seeded_catalog();
        let response = blend_metrics(&db, &[input(10), input(11)]).unwrap();
        assert_eq!(response.total_ratio, 100.0);
        let protein = response.nutrients.iter().find(|n| n.nutrient_id == 1).unwrap();
        assert_eq!(protein.name, "Crude Protein");
        assert!((protein.concentration - (8.5 + 46.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_blend_reports_cost_and_misses() {
        let db = seeded_catalog();
        let response = analyze_blend(&db, &[input(10), input(11)], Some(101), &[]).unwrap();
        assert!((response.cost_per_kg.unwrap() - 0.33).abs() < 1e-9);
        assert_eq!(response.deviations.len(), 1);
        assert!(response.deviations[0].over.unwrap() > 0.0);
        assert!(response.unmet_targets.is_empty());
        assert!(response.infeasible_targets.is_empty());

        let richer = TargetInput {
            nutrient_id: 1,
            target: 30.0,
            max: None,
            under_penalty_factor: None,
            over_penalty_factor: None,
        };
        let response = analyze_blend(&db, &[input(10), input(11)], Some(101), &[richer]).unwrap();
        assert_eq!(response.unmet_targets.len(), 1);
        assert_eq!(response.unmet_targets[0].target, 30.0);
    }

    #[tokio::test]
    async fn test_optimize_stage_with_each_strategy() {
        let db = seeded_catalog();
        let engine = LpEngine::shared();
        let config = test_config();

        for strategy in ["exact", "heuristic", "auto"] {
            let result = optimize_blend(&db, engine.clone(), &config, &request(&[10, 11], Some(101), strategy))
                .await
                .unwrap();
            assert!(result.success, "{}: {}", strategy, result.message);
            let protein = result.deviations.as_ref().unwrap()[0].actual.unwrap();
            assert!((protein - 20.0).abs() < 0.01 * 20.0, "{}: protein {}", strategy, protein);
        }
    }

    #[tokio::test]
    async fn test_optimize_honours_ratio_total_override() {
        let db = seeded_catalog();
        let mut req = request(&[10, 11], Some(101), "heuristic");
        req.heuristic_config = Some(json!({ "seed": 1, "ratio_total": 1.0 }));

        let result = optimize_blend(&db, LpEngine::shared(), &test_config(), &req).await.unwrap();
        let sum: f64 = result.updated_ingredients.unwrap().iter().map(|i| i.ratio).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_optimize_rejects_unknown_strategy() {
        let db = seeded_catalog();
        let err = optimize_blend(&db, LpEngine::shared(), &test_config(), &request(&[10], None, "magic"))
            .await
            .unwrap_err();
        assert!(err.contains("Unknown strategy"));
    }
}
