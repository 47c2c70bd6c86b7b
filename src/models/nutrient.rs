//! Nutrient model
//!
//! Immutable reference data for everything the optimizers measure.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Stable nutrient key. Names are display-only and may collide.
pub type NutrientId = i64;

/// A nutrient tracked by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub id: NutrientId,
    pub name: String,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Nutrient {
    pub fn new(id: NutrientId, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            unit: unit.into(),
            category: None,
            description: None,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            unit: row.get("unit")?,
            category: row.get("category")?,
            description: row.get("description")?,
        })
    }

    /// List all nutrients ordered by name
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM nutrients ORDER BY name, id")?;
        let nutrients = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nutrients)
    }

    /// Get a nutrient by ID
    pub fn get_by_id(conn: &Connection, id: NutrientId) -> DbResult<Self> {
        let mut stmt = conn.prepare("SELECT * FROM nutrients WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(nutrient) => Ok(nutrient),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(DbError::NotFound {
                kind: "Nutrient",
                id,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
