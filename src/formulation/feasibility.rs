//! Structural feasibility checks and ingredient suggestions
//!
//! A target is structurally infeasible when no single ingredient is rich enough
//! to reach it even undiluted: every blend is a convex combination of its
//! ingredients, so its concentration can never exceed the best single source.
//! The same holds in reverse for an upper bound below every ingredient.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    Ingredient, IngredientId, IngredientSuggestion, RatioIngredient, SuggestionKind, TargetNutrient,
};

pub const DEFAULT_TOP_N: usize = 3;

/// Range of single-ingredient concentrations for a nutrient, `None` for an empty blend
fn concentration_range(ingredients: &[RatioIngredient], nutrient_id: i64) -> Option<(f64, f64)> {
    ingredients
        .iter()
        .map(|item| item.ingredient.value_of(nutrient_id))
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Targets no weighting of `ingredients` can reach.
///
/// Returned targets carry the closest reachable concentration in `actual`.
pub fn detect_infeasible_targets(
    ingredients: &[RatioIngredient],
    targets: &[TargetNutrient],
) -> Vec<TargetNutrient> {
    targets
        .iter()
        .filter_map(|target| {
            let (lowest, highest) =
                concentration_range(ingredients, target.nutrient_id()).unwrap_or((0.0, 0.0));
            if highest < target.target {
                Some(target.with_actual(highest))
            } else if target.max.is_some() && lowest > target.upper() {
                Some(target.with_actual(lowest))
            } else {
                None
            }
        })
        .collect()
}

/// Suggestions for the structurally infeasible targets of a blend
pub fn suggest(
    pool: &[Ingredient],
    blend: &[RatioIngredient],
    targets: &[TargetNutrient],
    top_n: usize,
) -> Vec<IngredientSuggestion> {
    let infeasible = detect_infeasible_targets(blend, targets);
    suggest_for_targets(pool, blend, &infeasible, top_n)
}

/// Rank sources for each of `targets`.
///
/// Targets whose `actual` sits above their band get low-concentration
/// diluents; everything else gets the richest sources. Pool ingredients
/// already in the blend are skipped. With no pool candidate, a blend
/// ingredient that reaches the target undiluted is named for more inclusion;
/// otherwise the target has no known source.
pub fn suggest_for_targets(
    pool: &[Ingredient],
    blend: &[RatioIngredient],
    targets: &[TargetNutrient],
    top_n: usize,
) -> Vec<IngredientSuggestion> {
    let in_blend: HashSet<IngredientId> = blend.iter().map(RatioIngredient::id).collect();
    let mut suggestions = Vec::new();

    for target in targets {
        let nutrient_id = target.nutrient_id();
        let needs_less = target.actual.map_or(false, |actual| actual > target.upper());

        let mut candidates: Vec<(&Ingredient, f64)> = pool
            .iter()
            .filter(|ing| !in_blend.contains(&ing.id))
            .map(|ing| (ing, ing.value_of(nutrient_id)))
            .filter(|&(_, v)| if needs_less { v < target.upper() } else { v > 0.0 })
            .collect();

        candidates.sort_by(|a, b| {
            let by_value = if needs_less {
                a.1.partial_cmp(&b.1)
            } else {
                b.1.partial_cmp(&a.1)
            };
            by_value.unwrap_or(Ordering::Equal).then(a.0.id.cmp(&b.0.id))
        });

        let suggestion = |kind: SuggestionKind, ingredient: Option<(&Ingredient, f64)>| IngredientSuggestion {
            kind,
            ingredient_id: ingredient.map(|(ing, _)| ing.id),
            ingredient_name: ingredient.map(|(ing, _)| ing.name.clone()),
            nutrient_id,
            nutrient_name: target.nutrient.name.clone(),
            target: target.target,
            concentration: ingredient.map(|(_, v)| v),
        };

        if !candidates.is_empty() {
            suggestions.extend(
                candidates
                    .into_iter()
                    .take(top_n)
                    .map(|c| suggestion(SuggestionKind::AddIngredient, Some(c))),
            );
            continue;
        }

        let best_in_blend = blend
            .iter()
            .map(|item| (&item.ingredient, item.ingredient.value_of(nutrient_id)))
            .filter(|&(_, v)| !needs_less && v > 0.0 && v >= target.target)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        match best_in_blend {
            Some(source) => suggestions.push(suggestion(SuggestionKind::IncreaseInclusion, Some(source))),
            None => suggestions.push(suggestion(SuggestionKind::NoKnownSource, None)),
        }
    }

    suggestions
}

/// Human-readable summary of a set of infeasible targets
pub fn describe_infeasible(infeasible: &[TargetNutrient]) -> String {
    infeasible
        .iter()
        .map(|t| {
            let best = t.actual.unwrap_or(0.0);
            if best > t.upper() {
                format!(
                    "{} cannot go below {:.3} {} (max {:.3})",
                    t.nutrient.name, best, t.nutrient.unit, t.upper()
                )
            } else {
                format!(
                    "{} reaches at most {:.3} {} (target {:.3})",
                    t.nutrient.name, best, t.nutrient.unit, t.target
                )
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Suggestion settings carried by the optimizers
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    pool: Vec<Ingredient>,
    top_n: usize,
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SuggestionEngine {
    /// `pool` is the catalog suggestions are drawn from
    pub fn new(pool: Vec<Ingredient>) -> Self {
        Self {
            pool,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    pub fn suggest(&self, blend: &[RatioIngredient], targets: &[TargetNutrient]) -> Vec<IngredientSuggestion> {
        suggest(&self.pool, blend, targets, self.top_n)
    }

    pub fn suggest_for_targets(
        &self,
        blend: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> Vec<IngredientSuggestion> {
        suggest_for_targets(&self.pool, blend, targets, self.top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Composition, Nutrient};

    fn protein() -> Nutrient {
        Nutrient::new(1, "Crude Protein", "%")
    }

    fn calcium() -> Nutrient {
        Nutrient::new(2, "Calcium", "%")
    }

    fn ingredient(id: i64, name: &str, comps: Vec<(Nutrient, f64)>) -> Ingredient {
        Ingredient::new(
            id,
            name,
            comps.into_iter().map(|(n, v)| Composition::new(n, v)).collect(),
        )
    }

    fn blend_of(items: Vec<Ingredient>) -> Vec<RatioIngredient> {
        items.into_iter().map(|i| RatioIngredient::new(i, 1.0)).collect()
    }

    #[test]
    fn test_single_impossible_target() {
        let blend = blend_of(vec![ingredient(1, "Filler", vec![(protein(), 0.0)])]);
        let targets = vec![TargetNutrient::new(protein(), 50.0)];
        let infeasible = detect_infeasible_targets(&blend, &targets);
        assert_eq!(infeasible.len(), 1);
        assert_eq!(infeasible[0].actual, Some(0.0));
        assert_eq!(infeasible[0].under, Some(50.0));
    }

    #[test]
    fn test_reachable_target_not_flagged() {
        let blend = blend_of(vec![
            ingredient(1, "Corn", vec![(protein(), 8.0)]),
            ingredient(2, "Soybean Meal", vec![(protein(), 46.0)]),
        ]);
        let targets = vec![TargetNutrient::new(protein(), 20.0)];
        assert!(detect_infeasible_targets(&blend, &targets).is_empty());
    }

    #[test]
    fn test_band_below_every_ingredient() {
        let blend = blend_of(vec![ingredient(1, "Limestone", vec![(calcium(), 38.0)])]);
        let targets = vec![TargetNutrient::new(calcium(), 0.8).with_max(1.2)];
        let infeasible = detect_infeasible_targets(&blend, &targets);
        assert_eq!(infeasible.len(), 1);
        assert_eq!(infeasible[0].actual, Some(38.0));
        assert!(describe_infeasible(&infeasible).contains("cannot go below"));
    }

    #[test]
    fn test_adding_ingredient_only_shrinks_infeasible_set() {
        let targets = vec![
            TargetNutrient::new(protein(), 30.0),
            TargetNutrient::new(calcium(), 1.0),
        ];
        let mut blend = blend_of(vec![ingredient(1, "Corn", vec![(protein(), 8.0)])]);
        let before = detect_infeasible_targets(&blend, &targets).len();

        blend.push(RatioIngredient::new(ingredient(2, "Soybean Meal", vec![(protein(), 46.0)]), 1.0));
        let after = detect_infeasible_targets(&blend, &targets).len();
        assert_eq!(before, 2);
        assert_eq!(after, 1);

        blend.push(RatioIngredient::new(ingredient(3, "Limestone", vec![(calcium(), 38.0)]), 1.0));
        assert!(detect_infeasible_targets(&blend, &targets).is_empty());
    }

    #[test]
    fn test_suggest_ranks_pool_by_density() {
        let blend = blend_of(vec![ingredient(1, "Corn", vec![(protein(), 8.0)])]);
        let pool = vec![
            ingredient(1, "Corn", vec![(protein(), 8.0)]),
            ingredient(2, "Soybean Meal", vec![(protein(), 46.0)]),
            ingredient(3, "Fish Meal", vec![(protein(), 62.0)]),
            ingredient(4, "Canola Meal", vec![(protein(), 36.0)]),
            ingredient(5, "Blood Meal", vec![(protein(), 85.0)]),
            ingredient(6, "Limestone", vec![(calcium(), 38.0)]),
        ];
        let targets = vec![TargetNutrient::new(protein(), 22.0)];

        let suggestions = suggest(&pool, &blend, &targets, 3);
        let names: Vec<_> = suggestions
            .iter()
            .map(|s| s.ingredient_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Blood Meal", "Fish Meal", "Soybean Meal"]);
        assert!(suggestions.iter().all(|s| s.kind == SuggestionKind::AddIngredient));
        assert_eq!(suggestions[0].concentration, Some(85.0));
    }

    #[test]
    fn test_suggest_no_known_source() {
        let blend = blend_of(vec![ingredient(1, "Corn", vec![(protein(), 8.0)])]);
        let pool = vec![ingredient(6, "Salt", vec![(Nutrient::new(3, "Sodium", "%"), 39.0)])];
        let targets = vec![TargetNutrient::new(calcium(), 1.0)];

        let suggestions = suggest(&pool, &blend, &targets, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::NoKnownSource);
        assert_eq!(suggestions[0].ingredient_id, None);
        assert_eq!(suggestions[0].nutrient_name, "Calcium");
        assert_eq!(suggestions[0].target, 1.0);
    }

    #[test]
    fn test_suggest_empty_when_all_feasible() {
        let blend = blend_of(vec![ingredient(2, "Soybean Meal", vec![(protein(), 46.0)])]);
        let targets = vec![TargetNutrient::new(protein(), 20.0)];
        assert!(suggest(&[], &blend, &targets, 3).is_empty());
    }

    #[test]
    fn test_unmet_target_without_pool_points_at_blend_source() {
        let blend = blend_of(vec![
            ingredient(1, "Corn", vec![(protein(), 8.0)]),
            ingredient(2, "Soybean Meal", vec![(protein(), 46.0)]),
        ]);
        let unmet = vec![TargetNutrient::new(protein(), 30.0).with_actual(20.0)];
        let suggestions = suggest_for_targets(&[], &blend, &unmet, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::IncreaseInclusion);
        assert_eq!(suggestions[0].ingredient_name.as_deref(), Some("Soybean Meal"));
    }

    #[test]
    fn test_infeasible_target_without_pool_has_no_known_source() {
        let blend = blend_of(vec![ingredient(1, "Corn", vec![(protein(), 8.0)])]);
        let targets = vec![TargetNutrient::new(protein(), 30.0)];

        let suggestions = suggest(&[], &blend, &targets, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, SuggestionKind::NoKnownSource);
        assert_eq!(suggestions[0].ingredient_name, None);
        assert_eq!(suggestions[0].concentration, None);
        assert_eq!(suggestions[0].target, 30.0);

        let unmet = vec![TargetNutrient::new(protein(), 30.0).with_actual(8.0)];
        let suggestions = suggest_for_targets(&[], &blend, &unmet, 3);
        assert_eq!(suggestions[0].kind, SuggestionKind::NoKnownSource);
    }

    #[test]
    fn test_excess_target_gets_diluents() {
        let blend = blend_of(vec![ingredient(1, "Limestone", vec![(calcium(), 38.0)])]);
        let pool = vec![
            ingredient(2, "Corn", vec![(protein(), 8.0)]),
            ingredient(3, "Bone Meal", vec![(calcium(), 24.0)]),
        ];
        let targets = vec![TargetNutrient::new(calcium(), 0.8).with_max(1.2)];
        let suggestions = suggest(&pool, &blend, &targets, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].ingredient_name.as_deref(), Some("Corn"));
        assert_eq!(suggestions[0].concentration, Some(0.0));
    }
}
