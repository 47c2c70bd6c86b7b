//! Ration Tools module
//!
//! MCP tool implementations for the ration formulation engine.

pub mod catalog;
pub mod formulation;
pub mod status;
