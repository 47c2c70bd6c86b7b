//! Blend formulation: metrics, feasibility and the two optimizers

pub mod config;
pub mod error;
pub mod exact;
pub mod feasibility;
pub mod heuristic;
pub mod metrics;
pub mod strategy;

pub use config::{ExactConfig, HeuristicConfig, DEFAULT_RATIO_TOTAL};
pub use error::{validate_inputs, FormulationError, FormulationResult};
pub use exact::{ExactOptimizer, LpBackend, LpEngine};
pub use feasibility::{
    describe_infeasible, detect_infeasible_targets, suggest, suggest_for_targets, SuggestionEngine,
    DEFAULT_TOP_N,
};
pub use heuristic::HeuristicOptimizer;
pub use metrics::{compute_blend_metrics, BlendMetrics};
pub use strategy::{BlendOptimizer, FallbackOptimizer};
