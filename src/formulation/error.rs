//! Formulation errors and up-front input validation
//!
//! Optimizers never return these to callers directly; they are folded into an
//! unsuccessful [`OptimizationResult`](crate::models::OptimizationResult).

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{RatioIngredient, TargetNutrient};

#[derive(Debug, Error, PartialEq)]
pub enum FormulationError {
    #[error("No ingredients supplied; add at least one ingredient to the blend")]
    NoIngredients,

    #[error("No nutrient targets supplied; add at least one target")]
    NoTargets,

    #[error("Ingredient '{ingredient}' has a non-finite value for nutrient '{nutrient}'")]
    MalformedComposition { ingredient: String, nutrient: String },

    #[error("Ingredient '{ingredient}' lists nutrient '{nutrient}' more than once")]
    DuplicateComposition { ingredient: String, nutrient: String },

    #[error("Target for '{nutrient}' is malformed: {reason}")]
    MalformedTarget { nutrient: String, reason: String },

    #[error("Blend total must be a positive number, got {0}")]
    InvalidTotal(f64),

    #[error("Ingredient '{ingredient}' has invalid bounds: {reason}")]
    InvalidBounds { ingredient: String, reason: String },

    #[error("Minimum inclusions sum to {sum:.3}, which exceeds the blend total of {total:.3}")]
    MinimumsExceedTotal { sum: f64, total: f64 },

    #[error("Maximum inclusions sum to {sum:.3}, which cannot reach the blend total of {total:.3}")]
    MaximumsBelowTotal { sum: f64, total: f64 },

    #[error("LP solver error: {0}")]
    Solver(String),
}

pub type FormulationResult<T> = Result<T, FormulationError>;

impl From<microlp::Error> for FormulationError {
    fn from(err: microlp::Error) -> Self {
        FormulationError::Solver(err.to_string())
    }
}

/// Checks shared by both optimizers before any model is built.
///
/// `total` is the fixed blend total that `min`/`max` bounds are expressed against.
pub fn validate_inputs(
    ingredients: &[RatioIngredient],
    targets: &[TargetNutrient],
    total: f64,
) -> FormulationResult<()> {
    if !(total.is_finite() && total > 0.0) {
        return Err(FormulationError::InvalidTotal(total));
    }
    if ingredients.is_empty() {
        return Err(FormulationError::NoIngredients);
    }
    if targets.is_empty() {
        return Err(FormulationError::NoTargets);
    }

    for target in targets {
        let malformed = |reason: &str| FormulationError::MalformedTarget {
            nutrient: target.nutrient.name.clone(),
            reason: reason.to_string(),
        };
        if !target.target.is_finite() || !target.max.map_or(true, f64::is_finite) {
            return Err(malformed("target and max must be finite"));
        }
        let penalties = [target.under_weight(), target.over_weight()];
        if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(malformed("penalty factors must be finite and non-negative"));
        }
    }

    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for item in ingredients {
        let mut seen = HashSet::new();
        for composition in &item.ingredient.compositions {
            if !composition.value.is_finite() {
                return Err(FormulationError::MalformedComposition {
                    ingredient: item.name().to_string(),
                    nutrient: composition.nutrient.name.clone(),
                });
            }
            if !seen.insert(composition.nutrient.id) {
                return Err(FormulationError::DuplicateComposition {
                    ingredient: item.name().to_string(),
                    nutrient: composition.nutrient.name.clone(),
                });
            }
        }

        let min = item.min.unwrap_or(0.0);
        let max = item.max.unwrap_or(total);
        let bad_bounds = |reason: &str| FormulationError::InvalidBounds {
            ingredient: item.name().to_string(),
            reason: reason.to_string(),
        };
        if !min.is_finite() || !max.is_finite() {
            return Err(bad_bounds("bounds must be finite"));
        }
        if min < 0.0 || max < 0.0 {
            return Err(bad_bounds("bounds must be non-negative"));
        }
        if min > max {
            return Err(bad_bounds(&format!("min {} is greater than max {}", min, max)));
        }
        min_sum += min;
        max_sum += max.min(total);
    }

    let slack = 1e-9 * total.abs().max(1.0);
    if min_sum > total + slack {
        return Err(FormulationError::MinimumsExceedTotal { sum: min_sum, total });
    }
    if max_sum < total - slack {
        return Err(FormulationError::MaximumsBelowTotal { sum: max_sum, total });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Composition, Ingredient, Nutrient};

    fn protein() -> Nutrient {
        Nutrient::new(1, "Crude Protein", "%")
    }

    fn item(id: i64, value: f64) -> RatioIngredient {
        RatioIngredient::new(
            Ingredient::new(id, format!("Ingredient {}", id), vec![Composition::new(protein(), value)]),
            1.0,
        )
    }

    #[test]
    fn test_empty_inputs() {
        let targets = vec![TargetNutrient::new(protein(), 18.0)];
        assert_eq!(validate_inputs(&[], &targets, 100.0), Err(FormulationError::NoIngredients));
        assert_eq!(validate_inputs(&[item(1, 10.0)], &[], 100.0), Err(FormulationError::NoTargets));
    }

    #[test]
    fn test_minimums_exceed_total() {
        let targets = vec![TargetNutrient::new(protein(), 18.0)];
        let ingredients = vec![
            item(1, 10.0).with_bounds(Some(60.0), None),
            item(2, 20.0).with_bounds(Some(50.0), None),
        ];
        let err = validate_inputs(&ingredients, &targets, 100.0).unwrap_err();
        assert!(matches!(err, FormulationError::MinimumsExceedTotal { .. }));
        assert!(err.to_string().contains("110.000"));
    }

    #[test]
    fn test_maximums_below_total() {
        let targets = vec![TargetNutrient::new(protein(), 18.0)];
        let ingredients = vec![
            item(1, 10.0).with_bounds(None, Some(30.0)),
            item(2, 20.0).with_bounds(None, Some(30.0)),
        ];
        let err = validate_inputs(&ingredients, &targets, 100.0).unwrap_err();
        assert!(matches!(err, FormulationError::MaximumsBelowTotal { .. }));
    }

    #[test]
    fn test_duplicate_and_malformed_compositions() {
        let targets = vec![TargetNutrient::new(protein(), 18.0)];

        let mut dup = item(1, 10.0);
        dup.ingredient.compositions.push(Composition::new(protein(), 12.0));
        assert!(matches!(
            validate_inputs(&[dup], &targets, 100.0),
            Err(FormulationError::DuplicateComposition { .. })
        ));

        let nan = item(2, f64::NAN);
        assert!(matches!(
            validate_inputs(&[nan], &targets, 100.0),
            Err(FormulationError::MalformedComposition { .. })
        ));
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let targets = vec![TargetNutrient::new(protein(), 18.0).with_penalties(-1.0, 1.0)];
        assert!(matches!(
            validate_inputs(&[item(1, 10.0)], &targets, 100.0),
            Err(FormulationError::MalformedTarget { .. })
        ));
        assert_eq!(
            validate_inputs(&[item(1, 10.0)], &targets, 0.0),
            Err(FormulationError::InvalidTotal(0.0))
        );
    }

    #[test]
    fn test_inverted_bounds() {
        let targets = vec![TargetNutrient::new(protein(), 18.0)];
        let ingredients = vec![item(1, 10.0).with_bounds(Some(40.0), Some(20.0))];
        assert!(matches!(
            validate_inputs(&ingredients, &targets, 100.0),
            Err(FormulationError::InvalidBounds { .. })
        ));
    }
}
