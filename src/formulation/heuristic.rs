//! Heuristic optimizer: coordinate-descent local search
//!
//! Works on unnormalised inclusion weights in `ratio_total` units, so step
//! sizes are percentage points of the blend by default. Each sweep visits the
//! ingredients in a shuffled order and applies the best of three moves
//! (increase, decrease, snap to floor) if it lowers the cost. Without
//! inclusion bounds nutrient totals are kept up to date incrementally so a
//! move costs O(targets) to evaluate. With bounds every move is scored on the
//! projection of the weights onto `[min, max]`, which is the blend `report`
//! returns.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::config::HeuristicConfig;
use super::error::validate_inputs;
use super::feasibility::{describe_infeasible, detect_infeasible_targets, SuggestionEngine};
use super::metrics::compute_blend_metrics;
use crate::models::{OptimizationResult, RatioIngredient, SearchStats, StopReason, TargetNutrient};

pub const STRATEGY_NAME: &str = "heuristic";

/// Weighted relative miss of one target, zero inside its band
fn target_error(target: &TargetNutrient, actual: f64, epsilon: f64) -> f64 {
    if actual < target.target {
        let rel = (target.target - actual) / (target.target.abs() + epsilon);
        target.under_weight() * rel * rel
    } else if actual > target.upper() {
        let upper = target.upper();
        let rel = (actual - upper) / (upper.abs() + epsilon);
        target.over_weight() * rel * rel
    } else {
        0.0
    }
}

/// Scale `raw` to sum to `total` while keeping each entry within `[lo, hi]`.
///
/// Entries that hit a bound are pinned and the remainder is redistributed
/// over the free entries in proportion to their raw weight.
fn project_to_total(raw: &[f64], lo: &[f64], hi: &[f64], total: f64) -> Vec<f64> {
    let n = raw.len();
    let mut out = vec![0.0; n];
    let mut pinned = vec![false; n];

    for _ in 0..=n {
        let pinned_sum: f64 = (0..n).filter(|&i| pinned[i]).map(|i| out[i]).sum();
        let free: Vec<usize> = (0..n).filter(|&i| !pinned[i]).collect();
        if free.is_empty() {
            break;
        }
        let remaining = total - pinned_sum;
        let free_raw: f64 = free.iter().map(|&i| raw[i].max(0.0)).sum();
        for &i in &free {
            out[i] = if free_raw > 0.0 {
                raw[i].max(0.0) * remaining / free_raw
            } else {
                remaining / free.len() as f64
            };
        }

        let mut changed = false;
        for &i in &free {
            if out[i] < lo[i] {
                out[i] = lo[i];
                pinned[i] = true;
                changed = true;
            } else if out[i] > hi[i] {
                out[i] = hi[i];
                pinned[i] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    out
}

/// Per-ingredient `[min, max]` in ratio units
fn inclusion_bounds(ingredients: &[RatioIngredient], total: f64) -> (Vec<f64>, Vec<f64>) {
    let lo: Vec<f64> = ingredients.iter().map(|i| i.min.unwrap_or(0.0)).collect();
    let hi: Vec<f64> = ingredients
        .iter()
        .zip(&lo)
        .map(|(i, &lo)| i.max.unwrap_or(total).max(lo))
        .collect();
    (lo, hi)
}

/// Mutable search state over a fixed ingredient × target value matrix
struct Search<'a> {
    targets: &'a [TargetNutrient],
    config: &'a HeuristicConfig,
    /// values[i][t]: concentration of target t's nutrient in ingredient i
    values: Vec<Vec<f64>>,
    lo: Vec<f64>,
    hi: Vec<f64>,
    /// Some ingredient carries a min or max, so moves are scored on the projected blend
    bounded: bool,
    floor: f64,
    weights: Vec<f64>,
    /// Σ weight × value per target
    totals: Vec<f64>,
    total: f64,
    cost: f64,
}

impl<'a> Search<'a> {
    fn new(ingredients: &[RatioIngredient], targets: &'a [TargetNutrient], config: &'a HeuristicConfig) -> Self {
        let n = ingredients.len();
        let values: Vec<Vec<f64>> = ingredients
            .iter()
            .map(|item| {
                targets
                    .iter()
                    .map(|t| item.ingredient.value_of(t.nutrient_id()))
                    .collect()
            })
            .collect();

        let (lo, hi) = inclusion_bounds(ingredients, config.ratio_total);
        let bounded = ingredients.iter().any(|i| i.min.is_some() || i.max.is_some());
        let floor = config.min_ratio * config.ratio_total;
        let weights = vec![(config.ratio_total / n as f64).max(floor); n];

        let totals: Vec<f64> = (0..targets.len())
            .map(|t| weights.iter().zip(&values).map(|(w, v)| w * v[t]).sum())
            .collect();
        let total: f64 = weights.iter().sum();

        let mut search = Self {
            targets,
            config,
            values,
            lo,
            hi,
            bounded,
            floor,
            weights,
            totals,
            total,
            cost: 0.0,
        };
        search.cost = search.cost_after(None);
        search
    }

    /// Nutrient profile of the blend after projecting the (moved) weights onto the bounds
    fn projected_profile(&self, moved: Option<(usize, f64)>) -> Vec<f64> {
        let mut weights = self.weights.clone();
        if let Some((i, delta)) = moved {
            weights[i] += delta;
        }
        let scale = self.config.ratio_total;
        let ratios = project_to_total(&weights, &self.lo, &self.hi, scale);
        (0..self.targets.len())
            .map(|t| ratios.iter().zip(&self.values).map(|(r, v)| r * v[t]).sum::<f64>() / scale)
            .collect()
    }

    /// Cost of the current state, or of the state after moving ingredient `i` by `delta`
    fn cost_after(&self, moved: Option<(usize, f64)>) -> f64 {
        let cfg = self.config;
        let total = self.total + moved.map_or(0.0, |(_, delta)| delta);
        if total <= 0.0 {
            return cfg.degenerate_penalty * (1 + self.targets.len()) as f64;
        }

        let mut cost = if self.bounded {
            self.targets
                .iter()
                .zip(self.projected_profile(moved))
                .map(|(target, actual)| target_error(target, actual, cfg.epsilon))
                .sum::<f64>()
        } else {
            let mut cost = 0.0;
            for (t, target) in self.targets.iter().enumerate() {
                let amount = match moved {
                    Some((i, delta)) => self.totals[t] + delta * self.values[i][t],
                    None => self.totals[t],
                };
                cost += target_error(target, amount / total, cfg.epsilon);
            }
            cost
        };
        if total < cfg.min_total_ratio * cfg.ratio_total {
            cost += cfg.degenerate_penalty;
        }
        cost
    }

    /// Try the three moves on ingredient `i`; returns whether one was applied
    fn improve(&mut self, i: usize, step: f64) -> bool {
        let current = self.weights[i];
        let floor = self.floor;
        let down = (current - step).max(floor);

        let mut moves = vec![step];
        if down < current {
            moves.push(down - current);
        }
        if current > floor && down != floor {
            moves.push(floor - current);
        }

        let mut best: Option<(f64, f64)> = None;
        for delta in moves {
            let cost = self.cost_after(Some((i, delta)));
            if cost < best.map_or(self.cost, |(_, c)| c) {
                best = Some((delta, cost));
            }
        }

        match best {
            Some((delta, cost)) => {
                self.weights[i] += delta;
                for (t, amount) in self.totals.iter_mut().enumerate() {
                    *amount += delta * self.values[i][t];
                }
                self.total += delta;
                self.cost = cost;
                true
            }
            None => false,
        }
    }
}

/// Coordinate-descent optimizer
#[derive(Debug, Clone, Default)]
pub struct HeuristicOptimizer {
    config: HeuristicConfig,
    suggestions: SuggestionEngine,
}

impl HeuristicOptimizer {
    pub fn new(config: HeuristicConfig) -> Self {
        Self {
            config,
            suggestions: SuggestionEngine::default(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: SuggestionEngine) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Search for ratios that bring the blend close to `targets`.
    ///
    /// Uses the configured seed when present, otherwise OS entropy.
    pub fn analyze(&self, ingredients: &[RatioIngredient], targets: &[TargetNutrient]) -> OptimizationResult {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.analyze_with_rng(ingredients, targets, &mut rng)
    }

    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
        rng: &mut R,
    ) -> OptimizationResult {
        let cfg = &self.config;
        if let Err(err) = validate_inputs(ingredients, targets, cfg.ratio_total) {
            tracing::warn!(error = %err, "rejecting blend before search");
            return OptimizationResult::failure(err.to_string()).with_strategy(STRATEGY_NAME);
        }

        let mut search = Search::new(ingredients, targets, cfg);
        let mut best_weights = search.weights.clone();
        let mut best_cost = search.cost;
        let mut best_total = search.total;

        let deadline = cfg.time_limit_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut step = cfg.initial_step_size.max(cfg.min_step_size);
        let mut order: Vec<usize> = (0..ingredients.len()).collect();
        let mut iterations = 0;
        let mut without_improvement = 0;
        let mut stagnant = 0;

        let stop_reason = loop {
            if best_cost < cfg.tolerance {
                break StopReason::Converged;
            }
            if iterations >= cfg.max_iterations {
                break StopReason::MaxIterations;
            }
            if deadline.map_or(false, |d| Instant::now() >= d) {
                break StopReason::TimeLimit;
            }

            let previous = search.cost;
            order.shuffle(rng);
            for &i in &order {
                search.improve(i, step);
            }
            iterations += 1;

            if search.cost < best_cost {
                best_cost = search.cost;
                best_weights.clone_from(&search.weights);
                best_total = search.total;
            }

            if search.cost < previous {
                without_improvement = 0;
            } else {
                without_improvement += 1;
                if without_improvement >= cfg.step_size_improvement_threshold {
                    step = (step * cfg.step_size_decay_factor).max(cfg.min_step_size);
                    without_improvement = 0;
                }
            }

            if step <= cfg.min_step_size {
                if previous - search.cost < cfg.tolerance * previous {
                    stagnant += 1;
                } else {
                    stagnant = 0;
                }
                if stagnant >= cfg.max_stagnation {
                    break StopReason::Stagnated;
                }
            }
        };

        tracing::debug!(
            iterations,
            best_cost,
            step,
            reason = ?stop_reason,
            "heuristic search finished"
        );

        let stats = SearchStats {
            iterations,
            best_cost,
            final_step_size: step,
            stop_reason,
        };
        self.report(ingredients, targets, &best_weights, best_total, stats)
    }

    fn report(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
        best_weights: &[f64],
        best_total: f64,
        mut stats: SearchStats,
    ) -> OptimizationResult {
        let cfg = &self.config;
        let (lo, hi) = inclusion_bounds(ingredients, cfg.ratio_total);
        let scaled = project_to_total(best_weights, &lo, &hi, cfg.ratio_total);

        let updated: Vec<RatioIngredient> = ingredients
            .iter()
            .zip(scaled)
            .map(|(item, ratio)| {
                let mut updated = item.clone();
                updated.ratio = ratio;
                updated
            })
            .collect();

        let metrics = compute_blend_metrics(&updated);
        let deviations: Vec<TargetNutrient> = targets
            .iter()
            .map(|t| t.with_actual(metrics.concentration(t.nutrient_id())))
            .collect();

        let errors: Vec<f64> = deviations
            .iter()
            .map(|d| target_error(d, d.actual.unwrap_or(0.0), cfg.epsilon))
            .collect();
        let final_cost: f64 = errors.iter().sum();
        stats.best_cost = final_cost;

        let unmet: Vec<TargetNutrient> = deviations
            .iter()
            .zip(&errors)
            .filter(|(_, e)| **e >= cfg.tolerance)
            .map(|(d, _)| d.clone())
            .collect();

        let degenerate = best_total < cfg.min_total_ratio * cfg.ratio_total;
        let success = final_cost < cfg.tolerance && !degenerate;

        let mut message = if degenerate {
            format!(
                "Search collapsed to a near-empty blend (total weight {:.4}); result is not usable",
                best_total
            )
        } else if success {
            format!(
                "Heuristic search met all {} targets after {} iterations",
                targets.len(),
                stats.iterations
            )
        } else {
            let names: Vec<&str> = unmet.iter().map(|t| t.nutrient.name.as_str()).collect();
            format!(
                "Heuristic search stopped ({:?}) after {} iterations with cost {:.6}; {} of {} targets outside tolerance: {}",
                stats.stop_reason,
                stats.iterations,
                final_cost,
                unmet.len(),
                targets.len(),
                names.join(", ")
            )
        };

        let infeasible = detect_infeasible_targets(ingredients, targets);
        if !infeasible.is_empty() {
            message.push_str(&format!(". Structurally infeasible: {}", describe_infeasible(&infeasible)));
        }

        if success {
            tracing::info!(iterations = stats.iterations, "heuristic blend found");
        } else {
            tracing::info!(
                iterations = stats.iterations,
                cost = final_cost,
                unmet = unmet.len(),
                "heuristic search ended without meeting all targets"
            );
        }

        let suggestions = self.suggestions.suggest_for_targets(ingredients, &unmet);

        OptimizationResult {
            success,
            message,
            strategy: Some(STRATEGY_NAME.to_string()),
            updated_ingredients: Some(updated),
            suggestions: Some(suggestions),
            solver_output: None,
            deviations: Some(deviations),
            unmet_targets: Some(unmet),
            search: Some(stats),
        }
    }
}
