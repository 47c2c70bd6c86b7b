//! Animal program model
//!
//! A feeding program is split into stages (starter, grower, finisher...), each
//! carrying the nutrient targets a blend for that stage should meet.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};
use super::{Nutrient, TargetNutrient};

/// Nutrient requirement of one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTarget {
    pub nutrient: Nutrient,
    pub target: f64,
    pub max: Option<f64>,
    pub under_penalty_factor: Option<f64>,
    pub over_penalty_factor: Option<f64>,
}

/// A stage of an animal feeding program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalProgramStage {
    pub id: i64,
    pub program_id: i64,
    pub program_name: String,
    pub name: String,
    pub stage_order: i64,
    pub description: Option<String>,
    pub targets: Vec<StageTarget>,
}

impl AnimalProgramStage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            program_id: row.get("program_id")?,
            program_name: row.get("program_name")?,
            name: row.get("name")?,
            stage_order: row.get("stage_order")?,
            description: row.get("description")?,
            targets: Vec::new(),
        })
    }

    /// Get a stage with its targets
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Self> {
        let mut stmt = conn.prepare(
            r#"
            SELECT s.*, p.name AS program_name
            FROM animal_program_stages s
            JOIN animal_programs p ON p.id = s.program_id
            WHERE s.id = ?1
            "#,
        )?;

        let mut stage = match stmt.query_row([id], Self::from_row) {
            Ok(stage) => stage,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(DbError::NotFound { kind: "Program stage", id });
            }
            Err(e) => return Err(e.into()),
        };
        stage.targets = load_targets(conn, id)?;
        Ok(stage)
    }

    /// List all stages, ordered by program then stage order
    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT s.*, p.name AS program_name
            FROM animal_program_stages s
            JOIN animal_programs p ON p.id = s.program_id
            ORDER BY p.name, s.stage_order, s.id
            "#,
        )?;
        let mut stages = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for stage in stages.iter_mut() {
            stage.targets = load_targets(conn, stage.id)?;
        }
        Ok(stages)
    }

    /// Targets for this stage in the form the optimizers take
    pub fn to_targets(&self) -> Vec<TargetNutrient> {
        self.targets
            .iter()
            .map(|t| TargetNutrient {
                max: t.max,
                under_penalty_factor: t.under_penalty_factor,
                over_penalty_factor: t.over_penalty_factor,
                ..TargetNutrient::new(t.nutrient.clone(), t.target)
            })
            .collect()
    }
}

fn load_targets(conn: &Connection, stage_id: i64) -> DbResult<Vec<StageTarget>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT t.target, t.max, t.under_penalty_factor, t.over_penalty_factor,
               n.id, n.name, n.unit, n.category, n.description
        FROM stage_nutrient_targets t
        JOIN nutrients n ON n.id = t.nutrient_id
        WHERE t.stage_id = ?1
        ORDER BY n.id
        "#,
    )?;

    let targets = stmt
        .query_map([stage_id], |row| {
            Ok(StageTarget {
                target: row.get(0)?,
                max: row.get(1)?,
                under_penalty_factor: row.get(2)?,
                over_penalty_factor: row.get(3)?,
                nutrient: Nutrient {
                    id: row.get(4)?,
                    name: row.get(5)?,
                    unit: row.get(6)?,
                    category: row.get(7)?,
                    description: row.get(8)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(targets)
}
