//! Database migrations
//!
//! Schema creation for the feed catalog.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    tracing::debug!(version = SCHEMA_VERSION, "catalog schema up to date");
    Ok(())
}

/// Highest applied schema version (0 for a fresh database)
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration v1: Initial catalog schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- NUTRIENTS
        -- Reference data; values across ingredients share one basis
        -- ============================================
        CREATE TABLE nutrients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            unit TEXT NOT NULL,                  -- e.g., "%", "MJ/kg", "g/kg"
            category TEXT,                       -- e.g., "protein", "mineral"
            description TEXT
        );

        CREATE INDEX idx_nutrients_name ON nutrients(name);

        -- ============================================
        -- INGREDIENTS
        -- ============================================
        CREATE TABLE ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            cost_per_kg REAL,                    -- nullable, default cost for blends
            notes TEXT
        );

        CREATE INDEX idx_ingredients_name ON ingredients(name);

        -- ============================================
        -- INGREDIENT COMPOSITIONS
        -- One value per (ingredient, nutrient) pair
        -- ============================================
        CREATE TABLE ingredient_compositions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ingredient_id INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE CASCADE,
            nutrient_id INTEGER NOT NULL REFERENCES nutrients(id) ON DELETE RESTRICT,
            value REAL NOT NULL,
            basis TEXT,                          -- e.g., "as-fed", "dry matter"
            source_table TEXT,                   -- provenance, e.g., "NRC 2012"
            UNIQUE(ingredient_id, nutrient_id)
        );

        CREATE INDEX idx_compositions_ingredient ON ingredient_compositions(ingredient_id);

        -- ============================================
        -- ANIMAL PROGRAMS
        -- Feeding programs split into stages with nutrient targets
        -- ============================================
        CREATE TABLE animal_programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            species TEXT,
            description TEXT
        );

        CREATE TABLE animal_program_stages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            program_id INTEGER NOT NULL REFERENCES animal_programs(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            stage_order INTEGER NOT NULL DEFAULT 0,
            description TEXT
        );

        CREATE INDEX idx_stages_program ON animal_program_stages(program_id);

        CREATE TABLE stage_nutrient_targets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stage_id INTEGER NOT NULL REFERENCES animal_program_stages(id) ON DELETE CASCADE,
            nutrient_id INTEGER NOT NULL REFERENCES nutrients(id) ON DELETE RESTRICT,
            target REAL NOT NULL,
            max REAL,
            under_penalty_factor REAL,
            over_penalty_factor REAL,
            UNIQUE(stage_id, nutrient_id)
        );
        "#,
    )?;

    Ok(())
}
