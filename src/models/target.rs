//! Target nutrient model

use serde::{Deserialize, Serialize};

use super::{Nutrient, NutrientId};

/// A desired nutrient concentration, optionally banded by `max`
///
/// `actual`, `over` and `under` are filled in by the optimizers when the
/// target is returned as part of a deviation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetNutrient {
    #[serde(flatten)]
    pub nutrient: Nutrient,
    pub target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub under: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub under_penalty_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_penalty_factor: Option<f64>,
}

impl TargetNutrient {
    pub fn new(nutrient: Nutrient, target: f64) -> Self {
        Self {
            nutrient,
            target,
            max: None,
            actual: None,
            over: None,
            under: None,
            under_penalty_factor: None,
            over_penalty_factor: None,
        }
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_penalties(mut self, under: f64, over: f64) -> Self {
        self.under_penalty_factor = Some(under);
        self.over_penalty_factor = Some(over);
        self
    }

    pub fn nutrient_id(&self) -> NutrientId {
        self.nutrient.id
    }

    /// Upper edge of the acceptable band. Without a usable `max` this is the target itself.
    pub fn upper(&self) -> f64 {
        match self.max {
            Some(max) if max >= self.target => max,
            _ => self.target,
        }
    }

    pub fn under_weight(&self) -> f64 {
        self.under_penalty_factor.unwrap_or(1.0)
    }

    pub fn over_weight(&self) -> f64 {
        self.over_penalty_factor.unwrap_or(1.0)
    }

    /// Copy of this target annotated with an achieved concentration
    pub fn with_actual(&self, actual: f64) -> Self {
        let mut reported = self.clone();
        reported.actual = Some(actual);
        reported.under = Some((self.target - actual).max(0.0));
        reported.over = Some((actual - self.upper()).max(0.0));
        reported
    }

    /// Whether an annotated target falls short, or exceeds an explicit band,
    /// by more than `tolerance` relative to `max(|target|, 1)`.
    ///
    /// Overshooting a point target counts as met.
    pub fn is_unmet(&self, tolerance: f64) -> bool {
        let scale = self.target.abs().max(1.0);
        let short = self.under.unwrap_or(0.0) > tolerance * scale;
        let excess = self.max.is_some() && self.over.unwrap_or(0.0) > tolerance * scale;
        short || excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_actual_under() {
        let t = TargetNutrient::new(Nutrient::new(1, "Crude Protein", "%"), 18.0);
        let r = t.with_actual(15.0);
        assert_eq!(r.actual, Some(15.0));
        assert!((r.under.unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(r.over, Some(0.0));
    }

    #[test]
    fn test_with_actual_inside_band() {
        let t = TargetNutrient::new(Nutrient::new(2, "Calcium", "%"), 0.8).with_max(1.2);
        let r = t.with_actual(1.0);
        assert_eq!(r.under, Some(0.0));
        assert_eq!(r.over, Some(0.0));

        let r = t.with_actual(1.5);
        assert!((r.over.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unmet_counts_shortfall_and_band_excess() {
        let protein = TargetNutrient::new(Nutrient::new(1, "Crude Protein", "%"), 20.0);
        assert!(protein.with_actual(19.0).is_unmet(1e-6));
        assert!(!protein.with_actual(27.0).is_unmet(1e-6));
        assert!(!protein.with_actual(20.0 - 1e-7).is_unmet(1e-6));

        let calcium = TargetNutrient::new(Nutrient::new(2, "Calcium", "%"), 0.8).with_max(1.2);
        assert!(calcium.with_actual(1.5).is_unmet(1e-6));
        assert!(!calcium.with_actual(1.0).is_unmet(1e-6));
    }

    #[test]
    fn test_max_below_target_is_ignored() {
        let t = TargetNutrient::new(Nutrient::new(3, "Fat", "%"), 5.0).with_max(4.0);
        assert_eq!(t.upper(), 5.0);
    }
}
