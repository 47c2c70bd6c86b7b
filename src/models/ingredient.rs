//! Ingredient model
//!
//! Feed ingredients with their nutrient composition, and the ratio-annotated
//! form the optimizers read and write.

use std::collections::HashMap;

use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::{Nutrient, NutrientId};

/// Stable ingredient key
pub type IngredientId = i64;

/// Concentration of one nutrient in one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub nutrient: Nutrient,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

impl Composition {
    pub fn new(nutrient: Nutrient, value: f64) -> Self {
        Self {
            nutrient,
            value,
            basis: None,
            table: None,
        }
    }
}

/// A feed ingredient with its composition profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    #[serde(default)]
    pub compositions: Vec<Composition>,
}

impl Ingredient {
    pub fn new(id: IngredientId, name: impl Into<String>, compositions: Vec<Composition>) -> Self {
        Self {
            id,
            name: name.into(),
            compositions,
        }
    }

    /// Concentration of a nutrient, 0.0 when the ingredient does not list it
    pub fn value_of(&self, nutrient_id: NutrientId) -> f64 {
        self.compositions
            .iter()
            .find(|c| c.nutrient.id == nutrient_id)
            .map(|c| c.value)
            .unwrap_or(0.0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<(Self, Option<f64>)> {
        Ok((
            Self {
                id: row.get("id")?,
                name: row.get("name")?,
                compositions: Vec::new(),
            },
            row.get("cost_per_kg")?,
        ))
    }

    /// List ingredients with compositions joined, optionally filtered by name
    pub fn list(conn: &Connection, query: Option<&str>) -> DbResult<Vec<Self>> {
        Ok(Self::list_with_costs(conn, query)?
            .into_iter()
            .map(|(ingredient, _)| ingredient)
            .collect())
    }

    /// Like [`Ingredient::list`], also returning each ingredient's catalog cost
    pub fn list_with_costs(conn: &Connection, query: Option<&str>) -> DbResult<Vec<(Self, Option<f64>)>> {
        let mut rows = match query {
            Some(q) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM ingredients WHERE name LIKE ?1 ORDER BY name, id",
                )?;
                let rows = stmt
                    .query_map([format!("%{}%", q)], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM ingredients ORDER BY name, id")?;
                let rows = stmt
                    .query_map([], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        let mut compositions = load_compositions(conn)?;
        for (ingredient, _) in rows.iter_mut() {
            ingredient.compositions = compositions.remove(&ingredient.id).unwrap_or_default();
        }
        Ok(rows)
    }

    /// Fetch specific ingredients, preserving the requested order
    pub fn get_by_ids(conn: &Connection, ids: &[IngredientId]) -> DbResult<Vec<(Self, Option<f64>)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT * FROM ingredients WHERE id IN ({})", placeholders);

        let mut stmt = conn.prepare(&sql)?;
        let mut found: HashMap<IngredientId, (Self, Option<f64>)> = stmt
            .query_map(params_from_iter(ids.iter()), Self::from_row)?
            .map(|r| r.map(|(ingredient, cost)| (ingredient.id, (ingredient, cost))))
            .collect::<Result<_, _>>()?;

        let mut compositions = load_compositions(conn)?;
        ids.iter()
            .map(|id| -> DbResult<(Self, Option<f64>)> {
                let (mut ingredient, cost) = found
                    .remove(id)
                    .ok_or(DbError::NotFound { kind: "Ingredient", id: *id })?;
                ingredient.compositions = compositions.remove(id).unwrap_or_default();
                Ok((ingredient, cost))
            })
            .collect()
    }
}

/// All compositions grouped by ingredient, with nutrients joined
fn load_compositions(conn: &Connection) -> DbResult<HashMap<IngredientId, Vec<Composition>>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.ingredient_id, c.value, c.basis, c.source_table,
               n.id, n.name, n.unit, n.category, n.description
        FROM ingredient_compositions c
        JOIN nutrients n ON n.id = c.nutrient_id
        ORDER BY c.ingredient_id, n.id
        "#,
    )?;

    let mut grouped: HashMap<IngredientId, Vec<Composition>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        let ingredient_id: IngredientId = row.get(0)?;
        let composition = Composition {
            value: row.get(1)?,
            basis: row.get(2)?,
            table: row.get(3)?,
            nutrient: Nutrient {
                id: row.get(4)?,
                name: row.get(5)?,
                unit: row.get(6)?,
                category: row.get(7)?,
                description: row.get(8)?,
            },
        };
        Ok((ingredient_id, composition))
    })?;

    for row in rows {
        let (ingredient_id, composition) = row?;
        grouped.entry(ingredient_id).or_default().push(composition);
    }
    Ok(grouped)
}

/// An ingredient with its current inclusion level in a blend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioIngredient {
    #[serde(flatten)]
    pub ingredient: Ingredient,
    #[serde(default)]
    pub ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RatioIngredient {
    pub fn new(ingredient: Ingredient, ratio: f64) -> Self {
        Self {
            ingredient,
            ratio,
            cost_per_kg: None,
            min: None,
            max: None,
        }
    }

    pub fn with_cost(mut self, cost_per_kg: f64) -> Self {
        self.cost_per_kg = Some(cost_per_kg);
        self
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn id(&self) -> IngredientId {
        self.ingredient.id
    }

    pub fn name(&self) -> &str {
        &self.ingredient.name
    }
}
