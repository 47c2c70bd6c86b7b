//! Optimizer tunables
//!
//! Both structs deserialize with per-field defaults so callers can override
//! only what they care about.

use serde::{Deserialize, Serialize};

/// Blend total that ratios are reported against (percent)
pub const DEFAULT_RATIO_TOTAL: f64 = 100.0;

/// Settings for the goal-programming LP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExactConfig {
    /// Fixed total the returned ratios sum to
    pub ratio_total: f64,
    /// Objective weight applied to every over/under deviation variable
    pub deviation_weight: f64,
    /// `under` deviations at or below this are considered met
    pub unmet_tolerance: f64,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            ratio_total: DEFAULT_RATIO_TOTAL,
            deviation_weight: 1000.0,
            unmet_tolerance: 1e-6,
        }
    }
}

/// Settings for the coordinate-descent search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Fixed total the returned ratios are scaled to
    pub ratio_total: f64,
    pub max_iterations: usize,
    /// Cost below which targets count as met
    pub tolerance: f64,
    /// Floor every ingredient is held at, as a fraction of the blend
    pub min_ratio: f64,
    /// Weight change per move, in `ratio_total` units
    pub initial_step_size: f64,
    pub min_step_size: f64,
    pub step_size_decay_factor: f64,
    /// Iterations without improvement before the step size shrinks
    pub step_size_improvement_threshold: usize,
    /// Consecutive negligible-improvement iterations before giving up
    pub max_stagnation: usize,
    /// Blends whose total weight falls below this fraction of `ratio_total` are degenerate
    pub min_total_ratio: f64,
    pub degenerate_penalty: f64,
    /// Added to |target| when computing relative error
    pub epsilon: f64,
    /// Seed for the sweep-order shuffle; entropy when absent
    pub seed: Option<u64>,
    /// Wall-clock budget, polled once per iteration
    pub time_limit_ms: Option<u64>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            ratio_total: DEFAULT_RATIO_TOTAL,
            max_iterations: 2000,
            tolerance: 1e-6,
            min_ratio: 0.001,
            initial_step_size: 0.1,
            min_step_size: 0.02,
            step_size_decay_factor: 0.9,
            step_size_improvement_threshold: 30,
            max_stagnation: 20,
            min_total_ratio: 0.01,
            degenerate_penalty: 1e6,
            epsilon: 1e-9,
            seed: None,
            time_limit_ms: None,
        }
    }
}
