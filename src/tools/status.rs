//! Ration Status Tool
//!
//! Provides runtime status information about the ration service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use crate::build_info::BuildInfo;
use crate::db::migrations::get_schema_version;
use crate::db::Database;
use crate::formulation::LpEngine;

/// Formulation workflow instructions for AI assistants
pub const FORMULATION_INSTRUCTIONS: &str = r#"
# Ration Formulation Instructions

## Overview

A ration is a blend of ingredients whose nutrient concentrations should hit a
set of targets. Ratios are parts of a 100-part blend (percent inclusion).

1. **Nutrients** - `list_nutrients` returns ids, names and units
2. **Ingredients** - `list_ingredients` returns compositions and cost per kg
3. **Targets** - either pick an animal program stage (`list_program_stages`,
   `get_program_stage`) or pass explicit targets `{nutrient_id, target, max?}`

## Workflow

1. Choose the ingredient ids you want in the blend. Add `min`/`max` inclusion
   bounds where the diet requires them (e.g. limestone max 3).
2. Call `check_feasibility` first. Any target listed there cannot be reached
   by any mix of the chosen ingredients; follow the suggestions before solving.
3. Call `optimize_blend`:
   - `strategy: "exact"` solves a linear program for the cheapest blend with
     the smallest weighted miss.
   - `strategy: "heuristic"` runs a local search that ignores cost.
   - `strategy: "auto"` (default) runs exact and falls back to heuristic.
4. Read `unmet_targets`. `success: true` means the solver produced a blend;
   targets can still be missed. Use `suggestions` to fix them.
5. `blend_metrics` reports the nutrient profile of any ratios you propose.

## Bands

A target with `max` is met anywhere in `[target, max]`. Without `max` the
target is a point goal and both directions count as a miss.
"#;

/// Runtime status of the ration service
#[derive(Debug, Clone, Serialize)]
pub struct RationStatus {
    /// Build information
    pub name: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub schema_version: Option<i32>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub lp_engine_loaded: bool,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    pub fn get_status(&self, db: &Database, engine: &LpEngine) -> RationStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());
        let schema_version = db.with_conn(get_schema_version).ok();

        RationStatus {
            name: build_info.name,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            schema_version,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: std::process::id(),
            lp_engine_loaded: engine.is_loaded(),
        }
    }
}
