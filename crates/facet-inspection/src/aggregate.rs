//! Aggregation of per-fold decompositions into ensemble matrices.
//!
//! Folds may see different feature subsets. The aggregated result is indexed
//! by the canonical feature set, the union of all fold sets in first-seen
//! order, and every cell is averaged only over the folds that measured it.
//! A cell no fold measured stays "no data".
//!
//! With bootstrapping enabled, folds are resampled with replacement and the
//! per-cell means of the resamples give a central confidence interval
//! around the plain mean.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use facet_stats::percentiles::Percentiles;
use rand::Rng as _;
use rand_pcg::Pcg32;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::InspectionConfig,
    decompose::{DecomposeError, FoldResult},
    feature_set::FeatureSet,
    score_matrix::{ScoreMatrix, assert_permutation},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
pub enum AggregateError {
    #[display("no folds to aggregate")]
    NoFolds,
    #[display("only {succeeded} of {total} folds succeeded, at least {required} required")]
    InsufficientFolds {
        succeeded: usize,
        total: usize,
        required: usize,
    },
    #[display("aggregation cancelled")]
    Cancelled,
}

/// A fold whose decomposition failed, by position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFold {
    pub index: usize,
    pub error: DecomposeError,
}

/// One aggregated quantity over the canonical feature set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMatrix {
    mean: ScoreMatrix,
    lower: Option<ScoreMatrix>,
    upper: Option<ScoreMatrix>,
    fold_counts: Vec<Vec<usize>>,
}

impl AggregatedMatrix {
    /// Per-cell mean over the folds that measured the cell.
    #[must_use]
    pub fn mean(&self) -> &ScoreMatrix {
        &self.mean
    }

    /// Lower bootstrap bound; `None` when bootstrapping is disabled.
    #[must_use]
    pub fn lower(&self) -> Option<&ScoreMatrix> {
        self.lower.as_ref()
    }

    /// Upper bootstrap bound; `None` when bootstrapping is disabled.
    #[must_use]
    pub fn upper(&self) -> Option<&ScoreMatrix> {
        self.upper.as_ref()
    }

    /// Number of folds that measured cell `(i, j)`.
    #[must_use]
    pub fn fold_count(&self, i: usize, j: usize) -> usize {
        self.fold_counts[i][j]
    }

    /// Bootstrap interval of cell `(i, j)`, if computed and measured.
    #[must_use]
    pub fn bounds(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        let lower = self.lower.as_ref()?.get(i, j)?;
        let upper = self.upper.as_ref()?.get(i, j)?;
        Some((lower, upper))
    }

    fn reordered(&self, order: &[usize]) -> Self {
        Self {
            mean: self.mean.reordered(order),
            lower: self.lower.as_ref().map(|m| m.reordered(order)),
            upper: self.upper.as_ref().map(|m| m.reordered(order)),
            fold_counts: order
                .iter()
                .map(|&i| order.iter().map(|&j| self.fold_counts[i][j]).collect())
                .collect(),
        }
    }
}

/// Aggregated total importance of one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub name: String,
    pub mean: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub fold_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    features: FeatureSet,
    synergy: AggregatedMatrix,
    redundancy: AggregatedMatrix,
    independence: AggregatedMatrix,
    importance: Vec<FeatureImportance>,
    n_folds: usize,
    failed_folds: Vec<FailedFold>,
}

impl AggregatedResult {
    /// The canonical feature set all matrices are indexed by.
    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    #[must_use]
    pub fn synergy(&self) -> &AggregatedMatrix {
        &self.synergy
    }

    #[must_use]
    pub fn redundancy(&self) -> &AggregatedMatrix {
        &self.redundancy
    }

    #[must_use]
    pub fn independence(&self) -> &AggregatedMatrix {
        &self.independence
    }

    /// Importance per canonical feature.
    #[must_use]
    pub fn importance(&self) -> &[FeatureImportance] {
        &self.importance
    }

    /// Number of folds that contributed.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    #[must_use]
    pub fn failed_folds(&self) -> &[FailedFold] {
        &self.failed_folds
    }

    /// Permutes every matrix and the importance vector into a presentation
    /// order: feature `k` of the result is feature `order[k]` of `self`.
    ///
    /// # Panics
    ///
    /// Panics if `order` is not a permutation of the canonical indices.
    #[must_use]
    pub fn reordered(&self, order: &[usize]) -> Self {
        assert_permutation(order, self.features.len());
        let synergy = self.synergy.reordered(order);
        Self {
            features: synergy.mean.features().clone(),
            synergy,
            redundancy: self.redundancy.reordered(order),
            independence: self.independence.reordered(order),
            importance: order.iter().map(|&i| self.importance[i].clone()).collect(),
            n_folds: self.n_folds,
            failed_folds: self.failed_folds.clone(),
        }
    }
}

/// Combines fold results into an [`AggregatedResult`].
///
/// # Examples
///
/// ```
/// use facet_inspection::{
///     aggregate::FoldAggregator, config::InspectionConfig, decompose::FoldResult,
///     feature_set::FeatureSet, score_matrix::ScoreMatrix,
/// };
///
/// let fold = |names: &[&str], redundancy: f64| {
///     let features = FeatureSet::new(names.iter().copied()).unwrap();
///     let matrix = ScoreMatrix::from_fn(features.clone(), |i, j| Some(if i == j { 0.0 } else { redundancy }));
///     let zeros = ScoreMatrix::from_fn(features.clone(), |_, _| Some(0.0));
///     FoldResult::new(zeros.clone(), matrix, zeros, vec![0.5; names.len()]).unwrap()
/// };
/// let folds = [fold(&["a", "b"], 0.5), fold(&["b", "c"], 1.0)];
///
/// let result = FoldAggregator::new(&InspectionConfig::default())
///     .aggregate(&folds)
///     .unwrap();
/// let redundancy = result.redundancy().mean();
/// assert_eq!(result.features().names(), &["a", "b", "c"]);
/// assert_eq!(redundancy.get_by_name("a", "b"), Some(0.5));
/// assert_eq!(redundancy.get_by_name("a", "c"), None);
/// ```
#[derive(Debug, Clone)]
pub struct FoldAggregator {
    n_bootstrap: usize,
    percentile_bounds: (f64, f64),
    seed: u64,
    min_successful_folds: usize,
    n_workers: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl FoldAggregator {
    #[must_use]
    pub fn new(config: &InspectionConfig) -> Self {
        Self {
            n_bootstrap: config.n_bootstrap,
            percentile_bounds: config.percentile_bounds(),
            seed: config.seed,
            min_successful_folds: config.min_successful_folds,
            n_workers: config.worker_count(),
            cancel: None,
        }
    }

    /// Aborts with [`AggregateError::Cancelled`] once `flag` is set.
    ///
    /// The flag is checked before each chunk of bootstrap resamples.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Aggregates successful fold results.
    ///
    /// A single fold is accepted; its bounds collapse onto its values.
    pub fn aggregate(&self, folds: &[FoldResult]) -> Result<AggregatedResult, AggregateError> {
        self.aggregate_with_failures(folds, vec![])
    }

    /// Aggregates fold outcomes, skipping failed folds.
    ///
    /// Failed folds are logged and recorded in the result. Fails if fewer
    /// than `min_successful_folds` folds succeeded.
    pub fn aggregate_outcomes(
        &self,
        outcomes: Vec<Result<FoldResult, DecomposeError>>,
    ) -> Result<AggregatedResult, AggregateError> {
        let total = outcomes.len();
        if total == 0 {
            return Err(AggregateError::NoFolds);
        }
        let mut folds = vec![];
        let mut failed = vec![];
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(fold) => folds.push(fold),
                Err(error) => {
                    warn!(fold = index, %error, "fold decomposition failed");
                    failed.push(FailedFold { index, error });
                }
            }
        }
        if folds.len() < self.min_successful_folds {
            return Err(AggregateError::InsufficientFolds {
                succeeded: folds.len(),
                total,
                required: self.min_successful_folds,
            });
        }
        self.aggregate_with_failures(&folds, failed)
    }

    fn aggregate_with_failures(
        &self,
        folds: &[FoldResult],
        failed_folds: Vec<FailedFold>,
    ) -> Result<AggregatedResult, AggregateError> {
        if folds.is_empty() {
            return Err(AggregateError::NoFolds);
        }
        if self.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        let features = FeatureSet::union(folds.iter().map(FoldResult::features));
        let layout = CellLayout { n: features.len() };
        let cells = folds
            .iter()
            .map(|fold| layout.fold_cells(fold, &features))
            .collect::<Vec<_>>();

        let (means, counts) = cell_means(&cells, 0..cells.len(), layout.len());
        let bounds = if self.n_bootstrap > 0 {
            Some(self.bootstrap_bounds(&cells, layout.len())?)
        } else {
            None
        };

        let matrix = |quantity: usize| {
            let n = layout.n;
            let build = |values: &[Option<f64>]| {
                ScoreMatrix::from_fn(features.clone(), |i, j| {
                    values[layout.matrix_cell(quantity, i, j)]
                })
            };
            AggregatedMatrix {
                mean: build(&means),
                lower: bounds.as_ref().map(|(lower, _)| build(lower)),
                upper: bounds.as_ref().map(|(_, upper)| build(upper)),
                fold_counts: (0..n)
                    .map(|i| {
                        (0..n)
                            .map(|j| counts[layout.matrix_cell(quantity, i, j)])
                            .collect()
                    })
                    .collect(),
            }
        };
        let synergy = matrix(SYNERGY);
        let redundancy = matrix(REDUNDANCY);
        let independence = matrix(INDEPENDENCE);

        let offset = layout.importance_offset();
        let importance = features
            .iter()
            .enumerate()
            .map(|(i, name)| FeatureImportance {
                name: name.to_owned(),
                mean: means[offset + i].unwrap_or(0.0),
                lower: bounds.as_ref().and_then(|(lower, _)| lower[offset + i]),
                upper: bounds.as_ref().and_then(|(_, upper)| upper[offset + i]),
                fold_count: counts[offset + i],
            })
            .collect();

        info!(
            folds = folds.len(),
            failed = failed_folds.len(),
            features = features.len(),
            n_bootstrap = self.n_bootstrap,
            "aggregated fold results"
        );

        Ok(AggregatedResult {
            features,
            synergy,
            redundancy,
            independence,
            importance,
            n_folds: folds.len(),
            failed_folds,
        })
    }

    /// Lower and upper bound of every cell over the bootstrap resamples.
    ///
    /// Each worker collects the per-cell samples of its chunk of resamples;
    /// a resample's means are dropped as soon as they are recorded.
    fn bootstrap_bounds(
        &self,
        cells: &[Vec<Option<f64>>],
        len: usize,
    ) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>), AggregateError> {
        let resamples = (0..self.n_bootstrap).collect::<Vec<_>>();
        let chunk_size = self.n_bootstrap.div_ceil(self.n_workers.max(1));
        let mut chunk_samples: Vec<Option<Vec<Vec<f64>>>> =
            vec![None; resamples.chunks(chunk_size).len()];

        thread::scope(|s| {
            for (chunk, slot) in resamples.chunks(chunk_size).zip(&mut chunk_samples) {
                s.spawn(move || {
                    if self.is_cancelled() {
                        return;
                    }
                    let mut samples = vec![Vec::with_capacity(chunk.len()); len];
                    for &b in chunk {
                        let means = self.resample_means(cells, b, len);
                        for (cell, mean) in means.into_iter().enumerate() {
                            if let Some(mean) = mean {
                                samples[cell].push(mean);
                            }
                        }
                    }
                    *slot = Some(samples);
                });
            }
        });

        // concatenate in resample order, releasing each chunk once consumed
        let mut samples = vec![Vec::with_capacity(self.n_bootstrap); len];
        for chunk in chunk_samples {
            let Some(chunk) = chunk else {
                debug!("bootstrap cancelled");
                return Err(AggregateError::Cancelled);
            };
            for (cell, values) in chunk.into_iter().enumerate() {
                samples[cell].extend(values);
            }
        }

        let (lo, hi) = self.percentile_bounds;
        let (lower, upper): (Vec<_>, Vec<_>) = samples
            .iter()
            .map(|samples| {
                let percentiles = Percentiles::new(samples, &[lo, hi]);
                (percentiles.get(lo), percentiles.get(hi))
            })
            .unzip();
        Ok((lower, upper))
    }

    /// Cell means of resample `b`, drawn from its own PCG stream.
    fn resample_means(&self, cells: &[Vec<Option<f64>>], b: usize, len: usize) -> Vec<Option<f64>> {
        let mut rng = Pcg32::new(self.seed, b as u64);
        let n_folds = cells.len();
        let picks = (0..n_folds)
            .map(|_| rng.random_range(0..n_folds))
            .collect::<Vec<_>>();
        cell_means(cells, picks, len).0
    }
}

const SYNERGY: usize = 0;
const REDUNDANCY: usize = 1;
const INDEPENDENCE: usize = 2;

/// Flat layout of one fold's values in canonical coordinates: the upper
/// triangle, diagonal included, of each of the three symmetric matrices,
/// followed by `n` importances.
#[derive(Debug, Clone, Copy)]
struct CellLayout {
    n: usize,
}

impl CellLayout {
    fn triangle_len(self) -> usize {
        self.n * (self.n + 1) / 2
    }

    fn len(self) -> usize {
        3 * self.triangle_len() + self.n
    }

    /// Cell of `(i, j)` in matrix `quantity`; `(j, i)` maps to the same cell.
    fn matrix_cell(self, quantity: usize, i: usize, j: usize) -> usize {
        let (i, j) = (i.min(j), i.max(j));
        quantity * self.triangle_len() + i * (2 * self.n - i + 1) / 2 + (j - i)
    }

    fn importance_offset(self) -> usize {
        3 * self.triangle_len()
    }

    fn fold_cells(self, fold: &FoldResult, canonical: &FeatureSet) -> Vec<Option<f64>> {
        let map = fold
            .features()
            .reindex_into(canonical)
            .expect("canonical set contains every fold's features");
        let mut cells = vec![None; self.len()];
        let matrices = [
            (SYNERGY, fold.synergy()),
            (REDUNDANCY, fold.redundancy()),
            (INDEPENDENCE, fold.independence()),
        ];
        for (quantity, matrix) in matrices {
            for (fi, &ci) in map.iter().enumerate() {
                for (fj, &cj) in map.iter().enumerate().skip(fi) {
                    cells[self.matrix_cell(quantity, ci, cj)] = matrix.get(fi, fj);
                }
            }
        }
        let offset = self.importance_offset();
        for (fi, &ci) in map.iter().enumerate() {
            cells[offset + ci] = Some(fold.importance()[fi]);
        }
        cells
    }
}

/// Per-cell mean and count over the given folds, skipping cells a fold did
/// not measure.
#[expect(clippy::cast_precision_loss)]
fn cell_means<I>(cells: &[Vec<Option<f64>>], folds: I, len: usize) -> (Vec<Option<f64>>, Vec<usize>)
where
    I: IntoIterator<Item = usize>,
{
    let mut sums = vec![0.0; len];
    let mut counts = vec![0; len];
    for fold in folds {
        for (cell, value) in cells[fold].iter().enumerate() {
            if let Some(value) = value {
                sums[cell] += value;
                counts[cell] += 1;
            }
        }
    }
    let means = std::iter::zip(&sums, &counts)
        .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
        .collect();
    (means, counts)
}
