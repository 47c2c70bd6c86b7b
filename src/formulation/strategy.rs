//! Optimizer strategy interface

use async_trait::async_trait;

use super::exact::{self, ExactOptimizer};
use super::heuristic::{self, HeuristicOptimizer};
use crate::models::{OptimizationResult, RatioIngredient, TargetNutrient};

/// Anything that can turn ingredients and targets into an [`OptimizationResult`]
#[async_trait]
pub trait BlendOptimizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn optimize(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> OptimizationResult;
}

#[async_trait]
impl BlendOptimizer for ExactOptimizer {
    fn name(&self) -> &'static str {
        exact::STRATEGY_NAME
    }

    async fn optimize(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> OptimizationResult {
        ExactOptimizer::optimize(self, ingredients, targets).await
    }
}

#[async_trait]
impl BlendOptimizer for HeuristicOptimizer {
    fn name(&self) -> &'static str {
        heuristic::STRATEGY_NAME
    }

    async fn optimize(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> OptimizationResult {
        self.analyze(ingredients, targets)
    }
}

/// Runs `fallback` only when `primary` comes back unsuccessful
pub struct FallbackOptimizer {
    primary: Box<dyn BlendOptimizer>,
    fallback: Box<dyn BlendOptimizer>,
}

impl FallbackOptimizer {
    pub fn new(primary: Box<dyn BlendOptimizer>, fallback: Box<dyn BlendOptimizer>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl BlendOptimizer for FallbackOptimizer {
    fn name(&self) -> &'static str {
        "auto"
    }

    async fn optimize(
        &self,
        ingredients: &[RatioIngredient],
        targets: &[TargetNutrient],
    ) -> OptimizationResult {
        let first = self.primary.optimize(ingredients, targets).await;
        if first.success {
            return first;
        }

        tracing::info!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            reason = %first.message,
            "primary optimizer failed, falling back"
        );
        let mut second = self.fallback.optimize(ingredients, targets).await;
        second.message = format!(
            "{} failed ({}); {}: {}",
            self.primary.name(),
            first.message,
            self.fallback.name(),
            second.message
        );
        second
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulation::{HeuristicConfig, LpEngine};
    use crate::models::{Composition, Ingredient, Nutrient};

    /// Always fails with a fixed message
    struct Broken;

    #[async_trait]
    impl BlendOptimizer for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn optimize(&self, _: &[RatioIngredient], _: &[TargetNutrient]) -> OptimizationResult {
            OptimizationResult::failure("engine offline")
        }
    }

    fn scenario() -> (Vec<RatioIngredient>, Vec<TargetNutrient>) {
        let protein = Nutrient::new(1, "Crude Protein", "%");
        let ingredients = vec![
            RatioIngredient::new(
                Ingredient::new(1, "A", vec![Composition::new(protein.clone(), 10.0)]),
                1.0,
            ),
            RatioIngredient::new(
                Ingredient::new(2, "B", vec![Composition::new(protein.clone(), 20.0)]),
                1.0,
            ),
        ];
        (ingredients, vec![TargetNutrient::new(protein, 15.0)])
    }

    fn heuristic() -> Box<dyn BlendOptimizer> {
        Box::new(HeuristicOptimizer::new(HeuristicConfig {
            seed: Some(1),
            ..HeuristicConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_trait_objects_dispatch() {
        let (ingredients, targets) = scenario();
        let optimizers: Vec<Box<dyn BlendOptimizer>> = vec![
            Box::new(ExactOptimizer::new(LpEngine::shared())),
            heuristic(),
        ];
        for optimizer in &optimizers {
            let result = optimizer.optimize(&ingredients, &targets).await;
            assert!(result.success, "{}: {}", optimizer.name(), result.message);
            assert_eq!(result.strategy.as_deref(), Some(optimizer.name()));
        }
    }

    #[tokio::test]
    async fn test_fallback_skipped_on_success() {
        let (ingredients, targets) = scenario();
        let auto = FallbackOptimizer::new(Box::new(ExactOptimizer::new(LpEngine::shared())), Box::new(Broken));
        let result = auto.optimize(&ingredients, &targets).await;
        assert!(result.success);
        assert_eq!(result.strategy.as_deref(), Some("exact"));
    }

    #[tokio::test]
    async fn test_fallback_runs_after_failure() {
        let (ingredients, targets) = scenario();
        let auto = FallbackOptimizer::new(Box::new(Broken), heuristic());
        let result = auto.optimize(&ingredients, &targets).await;
        assert!(result.success);
        assert_eq!(result.strategy.as_deref(), Some("heuristic"));
        assert!(result.message.starts_with("broken failed (engine offline)"));
    }
}
