//! Blend metrics
//!
//! Absolute nutrient totals, total mass and concentration profile of a
//! weighted set of ingredients. Keys are nutrient ids.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{NutrientId, RatioIngredient};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlendMetrics {
    /// Σ ratio × value per nutrient
    pub absolute_totals: BTreeMap<NutrientId, f64>,
    pub total_ratio: f64,
    /// absolute / total; empty when the total is not positive
    pub concentrations: BTreeMap<NutrientId, f64>,
}

impl BlendMetrics {
    /// Concentration of a nutrient, 0.0 when nothing in the blend supplies it
    pub fn concentration(&self, nutrient_id: NutrientId) -> f64 {
        self.concentrations.get(&nutrient_id).copied().unwrap_or(0.0)
    }
}

pub fn compute_blend_metrics(ingredients: &[RatioIngredient]) -> BlendMetrics {
    let mut absolute_totals: BTreeMap<NutrientId, f64> = BTreeMap::new();
    let mut total_ratio = 0.0;

    for item in ingredients {
        total_ratio += item.ratio;
        for composition in &item.ingredient.compositions {
            *absolute_totals.entry(composition.nutrient.id).or_insert(0.0) +=
                item.ratio * composition.value;
        }
    }

    let concentrations = if total_ratio > 0.0 {
        absolute_totals
            .iter()
            .map(|(&id, &amount)| (id, amount / total_ratio))
            .collect()
    } else {
        BTreeMap::new()
    };

    BlendMetrics {
        absolute_totals,
        total_ratio,
        concentrations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Composition, Ingredient, Nutrient};

    fn blend() -> Vec<RatioIngredient> {
        let protein = Nutrient::new(1, "Crude Protein", "%");
        let fat = Nutrient::new(2, "Crude Fat", "%");
        vec![
            RatioIngredient::new(
                Ingredient::new(1, "Corn", vec![
                    Composition::new(protein.clone(), 8.0),
                    Composition::new(fat.clone(), 4.0),
                ]),
                60.0,
            ),
            RatioIngredient::new(
                Ingredient::new(2, "Soybean Meal", vec![Composition::new(protein, 44.0)]),
                40.0,
            ),
        ]
    }

    #[test]
    fn test_totals_and_profile() {
        let m = compute_blend_metrics(&blend());
        assert_eq!(m.total_ratio, 100.0);
        assert!((m.absolute_totals[&1] - (480.0 + 1760.0)).abs() < 1e-9);
        assert!((m.concentration(1) - 22.4).abs() < 1e-9);
        assert!((m.concentration(2) - 2.4).abs() < 1e-9);
        assert_eq!(m.concentration(99), 0.0);
    }

    #[test]
    fn test_empty_blend() {
        let m = compute_blend_metrics(&[]);
        assert_eq!(m.total_ratio, 0.0);
        assert!(m.absolute_totals.is_empty());
        assert!(m.concentrations.is_empty());
    }

    #[test]
    fn test_zero_total_has_no_profile() {
        let mut items = blend();
        for item in items.iter_mut() {
            item.ratio = 0.0;
        }
        let m = compute_blend_metrics(&items);
        assert_eq!(m.total_ratio, 0.0);
        assert!(m.concentrations.is_empty());
        assert!(m.concentration(1).is_finite());
    }

    #[test]
    fn test_idempotent() {
        let items = blend();
        assert_eq!(compute_blend_metrics(&items), compute_blend_metrics(&items));
    }

    #[test]
    fn test_same_name_different_id_kept_apart() {
        let a = Nutrient::new(1, "Phosphorus", "%");
        let b = Nutrient::new(2, "Phosphorus", "%");
        let items = vec![RatioIngredient::new(
            Ingredient::new(1, "Dicalcium Phosphate", vec![
                Composition::new(a, 18.0),
                Composition::new(b, 12.0),
            ]),
            1.0,
        )];
        let m = compute_blend_metrics(&items);
        assert_eq!(m.concentrations.len(), 2);
        assert_eq!(m.concentration(1), 18.0);
        assert_eq!(m.concentration(2), 12.0);
    }
}
