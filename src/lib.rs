//! Ration Formulation Engine Library
//!
//! Feed catalog access, blend metrics, feasibility analysis and the exact and
//! heuristic blend optimizers.

pub mod build_info;
pub mod config;
pub mod db;
pub mod formulation;
pub mod mcp;
pub mod models;
pub mod tools;
