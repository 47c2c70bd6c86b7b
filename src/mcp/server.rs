//! Ration MCP Server Implementation
//!
//! Implements the MCP server with all formulation tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::db::Database;
use crate::formulation::LpEngine;
use crate::tools::catalog;
use crate::tools::formulation::{self, BlendIngredientInput, FormulationRequest, TargetInput};
use crate::tools::status::StatusTracker;

/// Ration MCP Service
#[derive(Clone)]
pub struct RationService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    /// Loaded on the first exact solve, then shared by every call
    engine: Arc<LpEngine>,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<RationService>,
}

impl RationService {
    pub fn new(database_path: PathBuf, database: Database, config: AppConfig) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            engine: LpEngine::shared(),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListIngredientsParams {
    /// Case-insensitive name filter
    pub query: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 { 100 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetProgramStageParams {
    /// Program stage ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BlendMetricsParams {
    /// Ingredients with their ratios
    pub ingredients: Vec<BlendIngredientInput>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BlendTargetsParams {
    pub ingredients: Vec<BlendIngredientInput>,
    /// Program stage whose targets to use
    pub stage_id: Option<i64>,
    /// Explicit targets; these replace stage targets for the same nutrient
    #[serde(default)]
    pub targets: Vec<TargetInput>,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl RationService {
    // --- Status ---

    #[tool(description = "Get the current status of the ration service including build info, database status and whether the LP engine is loaded")]
    async fn ration_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.database, &self.engine);
        to_json(&status)
    }

    #[tool(description = "Get step-by-step instructions for formulating a ration. Call this before the first formulation in a session.")]
    fn formulation_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::FORMULATION_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(FORMULATION_INSTRUCTIONS)]))
    }

    // --- Catalog ---

    #[tool(description = "List all nutrients in the catalog with ids and units")]
    fn list_nutrients(&self) -> Result<CallToolResult, McpError> {
        let result = catalog::list_nutrients(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List ingredients with their nutrient compositions and cost per kg, optionally filtered by name")]
    fn list_ingredients(&self, Parameters(p): Parameters<ListIngredientsParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::list_ingredients(&self.database, p.query.as_deref(), p.limit)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "List animal program stages (e.g. broiler starter, grower) that carry nutrient targets")]
    fn list_program_stages(&self) -> Result<CallToolResult, McpError> {
        let result = catalog::list_program_stages(&self.database)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a program stage with its full list of nutrient targets")]
    fn get_program_stage(&self, Parameters(p): Parameters<GetProgramStageParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::get_program_stage(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- Formulation ---

    #[tool(description = "Compute total ratio, absolute nutrient amounts and concentrations for a blend")]
    fn blend_metrics(&self, Parameters(p): Parameters<BlendMetricsParams>) -> Result<CallToolResult, McpError> {
        let result = formulation::blend_metrics(&self.database, &p.ingredients)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Check which targets no mix of the given ingredients can reach, with catalog ingredients that would fix them")]
    fn check_feasibility(&self, Parameters(p): Parameters<BlendTargetsParams>) -> Result<CallToolResult, McpError> {
        let result = formulation::check_feasibility(&self.database, &p.ingredients, p.stage_id, &p.targets)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Evaluate a blend at the given ratios against targets: deviations, unmet targets, blend cost and suggestions")]
    fn analyze_blend(&self, Parameters(p): Parameters<BlendTargetsParams>) -> Result<CallToolResult, McpError> {
        let result = formulation::analyze_blend(&self.database, &p.ingredients, p.stage_id, &p.targets)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Optimize blend ratios to meet nutrient targets. strategy: exact (least-cost LP), heuristic (local search) or auto (exact, falling back to heuristic). Check unmet_targets even when success is true.")]
    async fn optimize_blend(&self, Parameters(p): Parameters<FormulationRequest>) -> Result<CallToolResult, McpError> {
        let result = formulation::optimize_blend(&self.database, self.engine.clone(), &self.config, &p)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for RationService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "ration".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Ration Formulation Engine".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Ration Formulation Engine - livestock feed blend optimization. \
                 Call formulation_instructions first. \
                 Catalog: list_nutrients, list_ingredients, list_program_stages, get_program_stage. \
                 Formulation: blend_metrics, check_feasibility, analyze_blend, optimize_blend. \
                 Ratios are parts of a 100-part blend. Targets come from a stage_id, explicit targets, or both."
                    .into(),
            ),
        }
    }
}
