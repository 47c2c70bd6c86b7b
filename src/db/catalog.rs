//! Read-only catalog access
//!
//! The optimizers never touch the database; callers resolve ingredients,
//! nutrients and program stages through this trait and hand plain values over.

use super::{Database, DbResult};
use crate::models::{AnimalProgramStage, Ingredient, Nutrient};

/// Read accessor for reference data
pub trait CatalogSource {
    fn ingredients(&self) -> DbResult<Vec<Ingredient>>;
    fn nutrients(&self) -> DbResult<Vec<Nutrient>>;
    fn program_stages(&self) -> DbResult<Vec<AnimalProgramStage>>;
}

impl CatalogSource for Database {
    fn ingredients(&self) -> DbResult<Vec<Ingredient>> {
        self.with_conn(|conn| Ingredient::list(conn, None))
    }

    fn nutrients(&self) -> DbResult<Vec<Nutrient>> {
        self.with_conn(Nutrient::list)
    }

    fn program_stages(&self) -> DbResult<Vec<AnimalProgramStage>> {
        self.with_conn(AnimalProgramStage::list)
    }
}
