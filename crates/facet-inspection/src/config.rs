//! Configuration consumed by the inspection core
//!
//! [`InspectionConfig`] deserialises with per-field defaults, so a caller can
//! supply only the fields it cares about. Loading it from a file is the
//! caller's job.
//!
//! ```
//! use facet_inspection::config::{InspectionConfig, SynergyStatistic};
//!
//! let config = InspectionConfig {
//!     n_bootstrap: 1000,
//!     seed: 42,
//!     ..InspectionConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.synergy_statistic, SynergyStatistic::RootMeanSquare);
//! assert_eq!(config.percentile_bounds(), (10.0, 90.0));
//! ```

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("confidence_level={value} must lie strictly between 0 and 1")]
    ConfidenceLevel { value: f64 },
    #[display("min_successful_folds must be at least 1")]
    MinSuccessfulFolds,
    #[display("zero_variance_tolerance={value} must be finite and non-negative")]
    ZeroVarianceTolerance { value: f64 },
}

/// Statistic that collapses a per-observation score vector into one
/// magnitude.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyStatistic {
    /// `sqrt(mean(x²))`; weighs large attributions more heavily.
    #[default]
    RootMeanSquare,
    /// `mean(|x|)`.
    MeanAbsolute,
}

impl SynergyStatistic {
    /// Applies the statistic; an empty sample has magnitude 0.
    #[must_use]
    pub fn apply(self, values: &[f64]) -> f64 {
        let magnitude = match self {
            Self::RootMeanSquare => facet_stats::descriptive::root_mean_square(values),
            Self::MeanAbsolute => facet_stats::descriptive::mean_absolute(values),
        };
        magnitude.unwrap_or(0.0)
    }
}

/// Strategy used to merge clusters of redundant features.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageStrategy {
    /// Mean pairwise dissimilarity between cluster members.
    #[default]
    Average,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Number of bootstrap resamples over folds; 0 disables bootstrapping.
    pub n_bootstrap: usize,
    /// Probability mass of the reported central interval.
    pub confidence_level: f64,
    /// Seed of the bootstrap resampling.
    pub seed: u64,
    pub linkage: LinkageStrategy,
    pub synergy_statistic: SynergyStatistic,
    /// Folds that must decompose successfully for an aggregation to proceed.
    pub min_successful_folds: usize,
    /// Variance, relative to the mean square `mean(x²)`, at or below which a
    /// feature's main effects count as constant. The test is independent of
    /// the scale of the scores; an all-zero column is always constant.
    pub zero_variance_tolerance: f64,
    /// Worker threads for fold decomposition and bootstrapping; `None` uses
    /// the available parallelism.
    pub n_workers: Option<NonZeroUsize>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            n_bootstrap: 0,
            confidence_level: 0.8,
            seed: 0,
            linkage: LinkageStrategy::Average,
            synergy_statistic: SynergyStatistic::RootMeanSquare,
            min_successful_folds: 2,
            zero_variance_tolerance: 1e-12,
            n_workers: None,
        }
    }
}

impl InspectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::ConfidenceLevel {
                value: self.confidence_level,
            });
        }
        if self.min_successful_folds == 0 {
            return Err(ConfigError::MinSuccessfulFolds);
        }
        if !(self.zero_variance_tolerance.is_finite() && self.zero_variance_tolerance >= 0.0) {
            return Err(ConfigError::ZeroVarianceTolerance {
                value: self.zero_variance_tolerance,
            });
        }
        Ok(())
    }

    /// Lower and upper percentile (0-100) of the bootstrap interval.
    #[must_use]
    pub fn percentile_bounds(&self) -> (f64, f64) {
        let tail = (1.0 - self.confidence_level) / 2.0;
        (
            round_percentile(tail * 100.0),
            round_percentile((1.0 - tail) * 100.0),
        )
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.n_workers
            .or_else(|| std::thread::available_parallelism().ok())
            .map_or(1, NonZeroUsize::get)
    }
}

// (1 - 0.8) / 2 * 100 is 9.999999999999998 in f64
fn round_percentile(p: f64) -> f64 {
    (p * 1e9).round() / 1e9
}
