//! Catalog MCP Tools
//!
//! Read-only views of nutrients, ingredients and program stages.

use serde::Serialize;

use crate::db::{CatalogSource, Database};
use crate::models::{AnimalProgramStage, Ingredient, Nutrient};

/// Response for list_nutrients
#[derive(Debug, Serialize)]
pub struct ListNutrientsResponse {
    pub nutrients: Vec<Nutrient>,
    pub total: usize,
}

/// One nutrient value of an ingredient, flattened for display
#[derive(Debug, Serialize)]
pub struct CompositionSummary {
    pub nutrient_id: i64,
    pub nutrient: String,
    pub unit: String,
    pub value: f64,
}

/// Ingredient entry in list results
#[derive(Debug, Serialize)]
pub struct IngredientSummary {
    pub id: i64,
    pub name: String,
    pub cost_per_kg: Option<f64>,
    pub compositions: Vec<CompositionSummary>,
}

impl IngredientSummary {
    fn new(ingredient: Ingredient, cost_per_kg: Option<f64>) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            cost_per_kg,
            compositions: ingredient
                .compositions
                .into_iter()
                .map(|c| CompositionSummary {
                    nutrient_id: c.nutrient.id,
                    nutrient: c.nutrient.name,
                    unit: c.nutrient.unit,
                    value: c.value,
                })
                .collect(),
        }
    }
}

/// Response for list_ingredients
#[derive(Debug, Serialize)]
pub struct ListIngredientsResponse {
    pub ingredients: Vec<IngredientSummary>,
    pub total: usize,
}

/// Stage entry in list results
#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub id: i64,
    pub program: String,
    pub name: String,
    pub stage_order: i64,
    pub target_count: usize,
}

/// Response for list_program_stages
#[derive(Debug, Serialize)]
pub struct ListStagesResponse {
    pub stages: Vec<StageSummary>,
    pub total: usize,
}

pub fn list_nutrients(db: &Database) -> Result<ListNutrientsResponse, String> {
    let nutrients = db
        .nutrients()
        .map_err(|e| format!("Failed to list nutrients: {}", e))?;
    let total = nutrients.len();
    Ok(ListNutrientsResponse { nutrients, total })
}

pub fn list_ingredients(
    db: &Database,
    query: Option<&str>,
    limit: i64,
) -> Result<ListIngredientsResponse, String> {
    let limit = limit.min(500).max(1) as usize;
    let rows = db
        .with_conn(|conn| Ingredient::list_with_costs(conn, query))
        .map_err(|e| format!("Failed to list ingredients: {}", e))?;

    let ingredients: Vec<IngredientSummary> = rows
        .into_iter()
        .take(limit)
        .map(|(ingredient, cost)| IngredientSummary::new(ingredient, cost))
        .collect();
    let total = ingredients.len();
    Ok(ListIngredientsResponse { ingredients, total })
}

pub fn list_program_stages(db: &Database) -> Result<ListStagesResponse, String> {
    let stages: Vec<StageSummary> = db
        .program_stages()
        .map_err(|e| format!("Failed to list program stages: {}", e))?
        .into_iter()
        .map(|s| StageSummary {
            id: s.id,
            program: s.program_name,
            name: s.name,
            stage_order: s.stage_order,
            target_count: s.targets.len(),
        })
        .collect();
    let total = stages.len();
    Ok(ListStagesResponse { stages, total })
}

pub fn get_program_stage(db: &Database, id: i64) -> Result<AnimalProgramStage, String> {
    db.with_conn(|conn| AnimalProgramStage::get_by_id(conn, id))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::fixtures::seeded_catalog;

    #[test]
    fn test_list_ingredients_filters_and_limits() {
        let db = seeded_catalog();

        let all = list_ingredients(&db, None, 50).unwrap();
        assert_eq!(all.total, 4);

        let meals = list_ingredients(&db, Some("Meal"), 50).unwrap();
        let names: Vec<_> = meals.ingredients.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Fish Meal", "Soybean Meal"]);
        assert_eq!(meals.ingredients[1].cost_per_kg, Some(0.45));

        assert_eq!(list_ingredients(&db, None, 2).unwrap().total, 2);
    }

    #[test]
    fn test_stage_listing_and_lookup() {
        let db = seeded_catalog();
        let stages = list_program_stages(&db).unwrap();
        assert_eq!(stages.total, 2);
        assert_eq!(stages.stages[0].name, "Starter");
        assert_eq!(stages.stages[0].target_count, 2);

        let grower = get_program_stage(&db, 101).unwrap();
        assert_eq!(grower.program_name, "Broiler");
        assert!(get_program_stage(&db, 999).unwrap_err().contains("not found"));
    }

    #[test]
    fn test_list_nutrients() {
        let db = seeded_catalog();
        let response = list_nutrients(&db).unwrap();
        assert_eq!(response.total, 3);
    }
}
