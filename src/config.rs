//! Process configuration
//!
//! Everything comes from the environment; unset variables fall back to
//! defaults that work from a source checkout.

use std::path::PathBuf;

use crate::formulation::{ExactConfig, HeuristicConfig};

pub const DATABASE_PATH_VAR: &str = "RATION_DATABASE_PATH";
pub const HEURISTIC_SEED_VAR: &str = "RATION_HEURISTIC_SEED";
pub const DEVIATION_WEIGHT_VAR: &str = "RATION_DEVIATION_WEIGHT";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub heuristic_seed: Option<u64>,
    pub deviation_weight: Option<f64>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(DATABASE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let heuristic_seed = lookup(HEURISTIC_SEED_VAR)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| format!("{} must be an unsigned integer: {}", HEURISTIC_SEED_VAR, e))
            })
            .transpose()?;

        let deviation_weight = lookup(DEVIATION_WEIGHT_VAR)
            .map(|raw| match raw.trim().parse::<f64>() {
                Ok(w) if w.is_finite() && w > 0.0 => Ok(w),
                Ok(w) => Err(format!("{} must be a positive number, got {}", DEVIATION_WEIGHT_VAR, w)),
                Err(e) => Err(format!("{} must be a number: {}", DEVIATION_WEIGHT_VAR, e)),
            })
            .transpose()?;

        Ok(Self {
            database_path,
            heuristic_seed,
            deviation_weight,
        })
    }

    /// LP settings with environment overrides applied
    pub fn exact_config(&self) -> ExactConfig {
        let mut config = ExactConfig::default();
        if let Some(weight) = self.deviation_weight {
            config.deviation_weight = weight;
        }
        config
    }

    /// Search settings with environment overrides applied
    pub fn heuristic_config(&self) -> HeuristicConfig {
        HeuristicConfig {
            seed: self.heuristic_seed,
            ..HeuristicConfig::default()
        }
    }
}

/// `data/ration.db` next to the project root
fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(grandparent) = path.parent().and_then(|p| p.parent()) {
            path = grandparent.to_path_buf();
        }
    }

    path.push("data");
    path.push("ration.db");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.database_path.ends_with("data/ration.db"));
        assert_eq!(config.heuristic_seed, None);
        assert_eq!(config.exact_config(), ExactConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_PATH_VAR, "/tmp/feed.db"),
            (HEURISTIC_SEED_VAR, "42"),
            (DEVIATION_WEIGHT_VAR, "250"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/feed.db"));
        assert_eq!(config.heuristic_config().seed, Some(42));
        assert_eq!(config.exact_config().deviation_weight, 250.0);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[(HEURISTIC_SEED_VAR, "-1")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(DEVIATION_WEIGHT_VAR, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(DEVIATION_WEIGHT_VAR, "heavy")])).is_err());
    }
}
