//! Exact optimizer: goal programming over a simplex LP
//!
//! Each target becomes a soft constraint with an `over` and an `under`
//! deviation variable, so the LP always has a feasible point and the solver
//! returns the cheapest blend with the smallest weighted miss.
//!
//! ```text
//! minimise   Σ cost_i·f_i + Σ w·(u_j·under_j + o_j·over_j)
//! subject to Σ f_i·v_ij − over_j + under_j = target_j      (point targets)
//!            Σ f_i·v_ij + under_j ≥ target_j                (banded targets)
//!            Σ f_i·v_ij − over_j  ≤ max_j
//!            Σ f_i = 1,   min_i/T ≤ f_i ≤ max_i/T
//! ```

use std::sync::Arc;
use std::time::Instant;

use microlp::{ComparisonOp, OptimizationDirection, Problem, Solution, Variable};
use serde_json::json;
use tokio::sync::OnceCell;

use super::config::ExactConfig;
use super::error::{validate_inputs, FormulationError};
use super::feasibility::{describe_infeasible, detect_infeasible_targets, SuggestionEngine};
use super::metrics::compute_blend_metrics;
use crate::models::{OptimizationResult, RatioIngredient, TargetNutrient};

pub const STRATEGY_NAME: &str = "exact";

/// A loaded simplex backend. Never mutated after construction.
#[derive(Debug)]
pub struct LpBackend {
    name: &'static str,
    loaded_at: Instant,
}

impl LpBackend {
    async fn load() -> Self {
        let backend = Self {
            name: "microlp",
            loaded_at: Instant::now(),
        };
        tracing::info!(backend = backend.name, "LP engine loaded");
        backend
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    fn solve(&self, problem: &Problem) -> Result<Solution, FormulationError> {
        Ok(problem.solve()?)
    }
}

/// Caller-owned handle to the LP backend.
///
/// The backend is loaded on first use and then shared; wrap the engine in an
/// `Arc` and hand it to every optimizer that needs it.
#[derive(Debug, Default)]
pub struct LpEngine {
    backend: OnceCell<LpBackend>,
}

impl LpEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The loaded backend, loading it on the first call
    pub async fn backend(&self) -> &LpBackend {
        self.backend.get_or_init(LpBackend::load).await
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.initialized()
    }
}

/// The LP for one optimization call, with handles to read the answer back
struct BlendModel {
    problem: Problem,
    fractions: Vec<Variable>,
    /// (under, over) per target
    deviations: Vec<(Variable, Variable)>,
}

impl BlendModel {
    fn build(ingredients: &[RatioIngredient], targets: &[TargetNutrient], config: &ExactConfig) -> Self {
        let total = config.ratio_total;
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        let fractions: Vec<Variable> = ingredients
            .iter()
            .map(|item| {
                let lo = item.min.unwrap_or(0.0) / total;
                let hi = item.max.map_or(1.0, |max| (max / total).min(1.0));
                problem.add_var(item.cost_per_kg.unwrap_or(0.0), (lo, hi))
            })
            .collect();

        let mut deviations = Vec::with_capacity(targets.len());
        for target in targets {
            let under = problem.add_var(
                config.deviation_weight * target.under_weight(),
                (0.0, f64::INFINITY),
            );
            let over = problem.add_var(
                config.deviation_weight * target.over_weight(),
                (0.0, f64::INFINITY),
            );

            let supply: Vec<(Variable, f64)> = fractions
                .iter()
                .zip(ingredients)
                .map(|(&f, item)| (f, item.ingredient.value_of(target.nutrient_id())))
                .filter(|&(_, v)| v != 0.0)
                .collect();

            if target.upper() > target.target {
                let mut lower = supply.clone();
                lower.push((under, 1.0));
                problem.add_constraint(lower, ComparisonOp::Ge, target.target);

                let mut upper = supply;
                upper.push((over, -1.0));
                problem.add_constraint(upper, ComparisonOp::Le, target.upper());
            } else {
                let mut goal = supply;
                goal.push((over, -1.0));
                goal.push((under, 1.0));
                problem.add_constraint(goal, ComparisonOp::Eq, target.target);
            }
            deviations.push((under, over));
        }

        let mass: Vec<(Variable, f64)> = fractions.iter().map(|&f| (f, 1.0)).collect();
        problem.add_constraint(mass, ComparisonOp::Eq, 1.0);

        Self {
            problem,
            fractions,
            deviations,
        }
    }
}

/// Goal-programming optimizer backed by an [`LpEngine`]
#[derive(Debug, Clone)]
pub struct ExactOptimizer {
    engine: Arc<LpEngine>,
    config: ExactConfig,
    suggestions: SuggestionEngine,
}

impl ExactOptimizer {
    pub fn new(engine: Arc<LpEngine>) -> Self {
        Self {
            engine,
            config: ExactConfig::default(),
            suggestions: SuggestionEngine::default(),
        }
    }

    pub fn with_config(mut self, config: ExactConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_suggestions(mut self, suggestions: SuggestionEngine) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn config(&self) -> &ExactConfig {
        &self.config
    }

    /// Solve for the cheapest blend that best meets `targets`.
    ///
    /// Never panics or errors: bad input and solver failures come back as an
    /// unsuccessful result with an explanation.
    pub async fn optimize(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> OptimizationResult {
        if let Err(err) = validate_inputs(ingredients, targets, self.config.ratio_total) {
            tracing::warn!(error = %err, "rejecting blend before solving");
            return OptimizationResult::failure(err.to_string()).with_strategy(STRATEGY_NAME);
        }

        let infeasible = detect_infeasible_targets(ingredients, targets);
        if !infeasible.is_empty() {
            tracing::info!(
                count = infeasible.len(),
                "structurally infeasible targets, solving for best effort"
            );
        }

        let backend = self.engine.backend().await;
        let model = BlendModel::build(ingredients, targets, &self.config);
        tracing::debug!(
            ingredients = ingredients.len(),
            targets = targets.len(),
            "solving goal-programming LP"
        );

        let solution = match backend.solve(&model.problem) {
            Ok(solution) => solution,
            Err(err) => {
                tracing::warn!(error = %err, "LP solve failed");
                let mut message = format!("Optimization failed: {}", err);
                if !infeasible.is_empty() {
                    message.push_str(&format!(". {}", describe_infeasible(&infeasible)));
                }
                return OptimizationResult::failure(message)
                    .with_strategy(STRATEGY_NAME)
                    .with_suggestions(self.suggestions.suggest(ingredients, targets));
            }
        };

        self.report(ingredients, targets, &model, &solution, backend, &infeasible)
    }

    fn report(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
        model: &BlendModel,
        solution: &Solution,
        backend: &LpBackend,
        infeasible: &[TargetNutrient],
    ) -> OptimizationResult {
        let total = self.config.ratio_total;

        let updated: Vec<RatioIngredient> = ingredients
            .iter()
            .zip(&model.fractions)
            .map(|(item, &f)| {
                let lo = item.min.unwrap_or(0.0);
                let hi = item.max.unwrap_or(total).max(lo);
                let mut updated = item.clone();
                updated.ratio = (solution[f].max(0.0) * total).clamp(lo, hi);
                updated
            })
            .collect();

        let metrics = compute_blend_metrics(&updated);
        let deviations: Vec<TargetNutrient> = targets
            .iter()
            .map(|t| t.with_actual(metrics.concentration(t.nutrient_id())))
            .collect();

        let unmet: Vec<TargetNutrient> = deviations
            .iter()
            .filter(|d| d.is_unmet(self.config.unmet_tolerance))
            .cloned()
            .collect();

        let mut message = if unmet.is_empty() {
            format!("Optimal blend found; all {} targets met", targets.len())
        } else {
            let names: Vec<&str> = unmet.iter().map(|t| t.nutrient.name.as_str()).collect();
            format!(
                "Best-effort blend found; {} of {} targets unmet: {}",
                unmet.len(),
                targets.len(),
                names.join(", ")
            )
        };
        if !infeasible.is_empty() {
            message.push_str(&format!(". Structurally infeasible: {}", describe_infeasible(infeasible)));
        }

        let fractions: Vec<serde_json::Value> = ingredients
            .iter()
            .zip(&model.fractions)
            .map(|(item, &f)| json!({ "ingredient_id": item.id(), "fraction": solution[f] }))
            .collect();
        let lp_deviations: Vec<serde_json::Value> = targets
            .iter()
            .zip(&model.deviations)
            .map(|(t, &(under, over))| {
                json!({ "nutrient_id": t.nutrient_id(), "under": solution[under], "over": solution[over] })
            })
            .collect();
        let solver_output = json!({
            "backend": backend.name(),
            "objective": solution.objective(),
            "fractions": fractions,
            "deviations": lp_deviations,
        });

        tracing::info!(
            objective = solution.objective(),
            unmet = unmet.len(),
            "exact blend solved"
        );

        let suggestions = if unmet.is_empty() {
            None
        } else {
            Some(self.suggestions.suggest_for_targets(ingredients, &unmet))
        };

        OptimizationResult {
            success: true,
            message,
            strategy: Some(STRATEGY_NAME.to_string()),
            updated_ingredients: Some(updated),
            suggestions,
            solver_output: Some(solver_output),
            deviations: Some(deviations),
            unmet_targets: Some(unmet),
            search: None,
        }
    }
}
