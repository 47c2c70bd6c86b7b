//! Database module
//!
//! Handles the SQLite feed catalog: connection, migrations and read access.

pub mod catalog;
pub mod connection;
pub mod migrations;

pub use catalog::CatalogSource;
pub use connection::{Database, DbError, DbResult};
