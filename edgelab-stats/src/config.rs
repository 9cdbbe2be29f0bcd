//! Serializable analysis configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable parameters for one analysis run.
///
/// Every field has a documented default; a TOML file only needs the keys it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Max |vwap_up - vwap_down| for the symmetric subset, in dollars.
    pub symmetric_gap_threshold: f64,
    /// Minimum symmetric-subset size for a stable null.
    pub min_subset_size: usize,
    /// Two-sided z cutoff separating signal from noise.
    pub z_cutoff: f64,
    /// Number of quantile strata on price-implied win probability.
    pub strata: usize,
    /// Permutation trials forming the empirical null.
    pub permutation_trials: usize,
    /// Minimum markets per stratum; thinner strata are excluded.
    pub min_stratum_size: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
    /// Absolute tolerance on the decomposition residual.
    pub residual_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symmetric_gap_threshold: 0.05,
            min_subset_size: 30,
            z_cutoff: 1.96,
            strata: 20,
            permutation_trials: 10_000,
            min_stratum_size: 5,
            seed: 42,
            residual_tolerance: edgelab_core::RESIDUAL_TOLERANCE,
        }
    }
}

impl AnalysisConfig {
    /// Load from a TOML file, filling unspecified keys with defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
