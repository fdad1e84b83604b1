//! End-to-end inspection over a set of cross-validation folds.
//!
//! [`Inspector`] decomposes the folds on a pool of scoped threads, aggregates
//! the successful folds, ranks the features and clusters them by
//! redundancy. Folds share no mutable state while they are decomposed;
//! outcomes are collected in fold order.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use serde::Serialize;
use tracing::info;

use crate::{
    aggregate::{AggregateError, AggregatedResult, FoldAggregator},
    cluster::{ClusterError, Linkage, RedundancyClusterer},
    config::{ConfigError, InspectionConfig},
    decompose::{DecomposeError, FoldResult, PairwiseDecomposer},
    feature_set::FeatureSet,
    observation::{Interactions, MainEffects},
    rank::{ImportanceRanker, RankedFeature},
};

/// Attribution scores of one fold's test set.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldInput {
    pub features: FeatureSet,
    pub main_effects: MainEffects,
    pub interactions: Interactions,
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum InspectError {
    #[display("invalid configuration: {_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Aggregate(AggregateError),
    #[display("{_0}")]
    Cluster(ClusterError),
}

/// Aggregated decomposition of all folds, with its ranking and linkage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub result: AggregatedResult,
    pub ranking: Vec<RankedFeature>,
    pub linkage: Linkage,
}

/// Runs the full inspection.
///
/// # Examples
///
/// ```
/// use facet_inspection::{
///     config::InspectionConfig,
///     feature_set::FeatureSet,
///     observation::{Interactions, MainEffects},
///     pipeline::{FoldInput, Inspector},
/// };
///
/// let fold = |seed: f64| FoldInput {
///     features: FeatureSet::new(["a", "b"]).unwrap(),
///     main_effects: MainEffects::from_rows(&[
///         vec![1.0 + seed, 0.5],
///         vec![-1.0, -0.5 + seed],
///         vec![2.0, 1.0],
///     ])
///     .unwrap(),
///     interactions: Interactions::zeros(3, 2),
/// };
///
/// let inspector = Inspector::new(InspectionConfig::default()).unwrap();
/// let inspection = inspector.run(&[fold(0.0), fold(0.1)]).unwrap();
///
/// assert_eq!(inspection.result.n_folds(), 2);
/// assert_eq!(inspection.ranking.len(), 2);
/// assert_eq!(inspection.linkage.merges().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Inspector {
    config: InspectionConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Inspector {
    pub fn new(config: InspectionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Aborts with [`AggregateError::Cancelled`] once `flag` is set.
    ///
    /// The flag is checked before each fold is decomposed and before each
    /// chunk of bootstrap resamples.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[must_use]
    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Decomposes the folds in parallel, splitting them into contiguous
    /// chunks over the configured number of workers.
    ///
    /// Per-fold failures are returned in place, not raised.
    pub fn decompose_folds(
        &self,
        folds: &[FoldInput],
    ) -> Result<Vec<Result<FoldResult, DecomposeError>>, AggregateError> {
        let decomposer = PairwiseDecomposer::new(&self.config);
        let chunk_size = folds.len().div_ceil(self.config.worker_count()).max(1);
        let mut outcomes = vec![None; folds.len()];

        thread::scope(|s| {
            let chunks = folds.chunks(chunk_size).zip(outcomes.chunks_mut(chunk_size));
            for (folds, outcomes) in chunks {
                s.spawn(move || {
                    for (fold, outcome) in folds.iter().zip(outcomes) {
                        if self.is_cancelled() {
                            return;
                        }
                        *outcome = Some(decomposer.decompose(
                            &fold.main_effects,
                            &fold.interactions,
                            &fold.features,
                        ));
                    }
                });
            }
        });

        outcomes
            .into_iter()
            .map(|outcome| outcome.ok_or(AggregateError::Cancelled))
            .collect()
    }

    /// Decomposes and aggregates the folds.
    pub fn aggregate(&self, folds: &[FoldInput]) -> Result<AggregatedResult, AggregateError> {
        let outcomes = self.decompose_folds(folds)?;
        let mut aggregator = FoldAggregator::new(&self.config);
        if let Some(flag) = &self.cancel {
            aggregator = aggregator.with_cancel_flag(Arc::clone(flag));
        }
        aggregator.aggregate_outcomes(outcomes)
    }

    /// Decomposes, aggregates, ranks and clusters the folds.
    pub fn run(&self, folds: &[FoldInput]) -> Result<Inspection, InspectError> {
        let result = self.aggregate(folds)?;
        let ranking = ImportanceRanker.rank(&result);
        let linkage = RedundancyClusterer::new(&self.config).cluster(result.redundancy().mean())?;
        info!(
            folds = result.n_folds(),
            features = result.features().len(),
            top = ranking.first().map(|f| f.name.as_str()),
            "inspection finished"
        );
        Ok(Inspection {
            result,
            ranking,
            linkage,
        })
    }
}
