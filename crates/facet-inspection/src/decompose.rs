//! Per-fold decomposition of feature importance into synergy, redundancy and
//! independence.
//!
//! # Definitions
//!
//! With `S` the configured [`SynergyStatistic`], `m[·, i]` the main effects of
//! feature `i` and `x[·, i, j]` the interaction scores:
//!
//! - `T_i = S(m[·, i])`: main-effect magnitude
//! - `s_ij = S(½ (x[·, i, j] + x[·, j, i]))`: synergy magnitude of a pair
//! - `G_i = T_i + ½ Σ_j s_ij`: gross importance; `t_i = G_i / Σ_k G_k`
//! - `σ(i→j) = ½ s_ij / G_i`: share of `i`'s importance that is synergy with `j`
//! - `ρ(i→j) = clamp(cov_ij / var_i, 0, 1) · T_i / G_i`: share of `i`'s
//!   importance that is redundant with `j`
//!
//! The directional values are asymmetric. Both directions are computed and
//! then averaged into the symmetric `σ_ij` and `ρ_ij`; this two-pass order
//! matters and is not equivalent to a single symmetric formula.
//!
//! Every pair is then scaled by `1 / max(1, u_i, u_j)` where
//! `u_i = Σ_j (σ_ij + ρ_ij)`, which keeps the matrices symmetric and bounds
//! each feature's shared fraction by 1. The independent fraction is the rest:
//! `a_i = 1 - Σ_j (σ_ij + ρ_ij)`.
//!
//! # Degenerate Inputs
//!
//! A feature whose main effects are constant across observations has no
//! variance to share. Its synergy and redundancy with every other feature are
//! defined as 0 rather than raised as an error; the feature is reported in
//! [`FoldResult::zero_variance_features`].

use serde::Serialize;
use tracing::debug;

use crate::{
    config::{InspectionConfig, SynergyStatistic},
    feature_set::FeatureSet,
    observation::{Interactions, MainEffects, ShapeMismatchError},
    score_matrix::ScoreMatrix,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display(
    "insufficient data: {observations} observations and {features} features \
     (need at least 2 observations and 1 feature)"
)]
pub struct InsufficientDataError {
    pub observations: usize,
    pub features: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display("non-finite score in {input} at flat index {index}")]
pub struct NonFiniteScoreError {
    pub input: &'static str,
    pub index: usize,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum DecomposeError {
    #[display("{_0}")]
    ShapeMismatch(ShapeMismatchError),
    #[display("{_0}")]
    InsufficientData(InsufficientDataError),
    #[display("{_0}")]
    NonFiniteScore(NonFiniteScoreError),
}

/// Synergy, redundancy and independence of one fold.
///
/// All three matrices share the fold's feature set. Synergy and redundancy
/// have a zero diagonal; the independence diagonal holds each feature's
/// independent fraction and its off-diagonal cells the pairwise autonomy
/// `1 - σ_ij - ρ_ij`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldResult {
    synergy: ScoreMatrix,
    redundancy: ScoreMatrix,
    independence: ScoreMatrix,
    importance: Vec<f64>,
    zero_variance_features: Vec<String>,
}

impl FoldResult {
    /// Assembles a fold result from precomputed matrices.
    ///
    /// All matrices must be over the same feature set and `importance` must
    /// hold one value per feature.
    pub fn new(
        synergy: ScoreMatrix,
        redundancy: ScoreMatrix,
        independence: ScoreMatrix,
        importance: Vec<f64>,
    ) -> Result<Self, ShapeMismatchError> {
        let n = synergy.len();
        for (dimension, matrix) in [("redundancy", &redundancy), ("independence", &independence)]
        {
            ShapeMismatchError::check(dimension, n, matrix.len())?;
            if matrix.features() != synergy.features() {
                return Err(ShapeMismatchError {
                    dimension,
                    expected: n,
                    actual: matrix.len(),
                });
            }
        }
        ShapeMismatchError::check("importance", n, importance.len())?;
        Ok(Self {
            synergy,
            redundancy,
            independence,
            importance,
            zero_variance_features: vec![],
        })
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        self.synergy.features()
    }

    #[must_use]
    pub fn synergy(&self) -> &ScoreMatrix {
        &self.synergy
    }

    #[must_use]
    pub fn redundancy(&self) -> &ScoreMatrix {
        &self.redundancy
    }

    #[must_use]
    pub fn independence(&self) -> &ScoreMatrix {
        &self.independence
    }

    /// Total importance of each feature as a fraction of the fold's total.
    #[must_use]
    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    /// Features whose main effects were constant in this fold.
    #[must_use]
    pub fn zero_variance_features(&self) -> &[String] {
        &self.zero_variance_features
    }

    /// Sum of feature `i`'s synergy fractions.
    #[must_use]
    pub fn synergy_share(&self, i: usize) -> f64 {
        self.synergy.off_diagonal_row(i).map(|(_, v)| v).sum()
    }

    /// Sum of feature `i`'s redundancy fractions.
    #[must_use]
    pub fn redundancy_share(&self, i: usize) -> f64 {
        self.redundancy.off_diagonal_row(i).map(|(_, v)| v).sum()
    }

    /// Feature `i`'s independent fraction.
    #[must_use]
    pub fn independent_share(&self, i: usize) -> f64 {
        self.independence.get(i, i).unwrap_or(0.0)
    }
}

/// Decomposes one fold's attribution scores.
///
/// The decomposer is a pure function of its inputs and can run on many
/// folds in parallel.
///
/// # Examples
///
/// ```
/// use facet_inspection::{
///     config::InspectionConfig,
///     decompose::PairwiseDecomposer,
///     feature_set::FeatureSet,
///     observation::{Interactions, MainEffects},
/// };
///
/// let features = FeatureSet::new(["a", "b"]).unwrap();
/// // b carries exactly the same signal as a
/// let main = MainEffects::from_rows(&[
///     vec![1.0, 1.0],
///     vec![-1.0, -1.0],
///     vec![2.0, 2.0],
///     vec![-2.0, -2.0],
/// ])
/// .unwrap();
/// let interactions = Interactions::zeros(4, 2);
///
/// let decomposer = PairwiseDecomposer::new(&InspectionConfig::default());
/// let fold = decomposer.decompose(&main, &interactions, &features).unwrap();
///
/// assert_eq!(fold.redundancy().get(0, 1), Some(1.0));
/// assert_eq!(fold.synergy().get(0, 1), Some(0.0));
/// assert_eq!(fold.independent_share(0), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseDecomposer {
    statistic: SynergyStatistic,
    zero_variance_tolerance: f64,
}

impl Default for PairwiseDecomposer {
    fn default() -> Self {
        Self::new(&InspectionConfig::default())
    }
}

impl PairwiseDecomposer {
    #[must_use]
    pub fn new(config: &InspectionConfig) -> Self {
        Self {
            statistic: config.synergy_statistic,
            zero_variance_tolerance: config.zero_variance_tolerance,
        }
    }

    pub fn decompose(
        &self,
        main_effects: &MainEffects,
        interactions: &Interactions,
        features: &FeatureSet,
    ) -> Result<FoldResult, DecomposeError> {
        let n = features.len();
        let n_obs = main_effects.n_observations();
        ShapeMismatchError::check("main effect features", n, main_effects.n_features())?;
        ShapeMismatchError::check("interaction features", n, interactions.n_features())?;
        ShapeMismatchError::check(
            "interaction observations",
            n_obs,
            interactions.n_observations(),
        )?;
        if n_obs < 2 || n < 1 {
            return Err(InsufficientDataError {
                observations: n_obs,
                features: n,
            }
            .into());
        }
        check_finite("main effects", main_effects.values().iter().copied().enumerate())?;
        // self-interactions are never read and may be left undefined
        check_finite("interactions", interactions.off_diagonal_values())?;

        let columns = (0..n).map(|i| main_effects.column(i)).collect::<Vec<_>>();
        let moments = columns
            .iter()
            .map(|column| ColumnMoments::new(column, self.zero_variance_tolerance))
            .collect::<Vec<_>>();

        let main_magnitude = columns
            .iter()
            .map(|column| self.statistic.apply(column))
            .collect::<Vec<_>>();

        let mut synergy_magnitude = PairTable::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                if moments[i].is_constant || moments[j].is_constant {
                    continue;
                }
                let magnitude = self.statistic.apply(&interactions.symmetric_pair(i, j));
                synergy_magnitude.set(i, j, magnitude);
                synergy_magnitude.set(j, i, magnitude);
            }
        }

        let gross = (0..n)
            .map(|i| main_magnitude[i] + 0.5 * synergy_magnitude.row_sum(i))
            .collect::<Vec<_>>();
        let total = gross.iter().sum::<f64>();
        let importance = gross
            .iter()
            .map(|&g| if total > 0.0 { g / total } else { 0.0 })
            .collect::<Vec<_>>();

        // first pass: directional fractions
        let mut synergy_directed = PairTable::new(n);
        let mut redundancy_directed = PairTable::new(n);
        for i in 0..n {
            if gross[i] <= 0.0 {
                continue;
            }
            for j in (0..n).filter(|&j| j != i) {
                synergy_directed.set(i, j, 0.5 * synergy_magnitude.get(i, j) / gross[i]);
                if moments[i].is_constant || moments[j].is_constant {
                    continue;
                }
                let covariance =
                    facet_stats::descriptive::covariance(&columns[i], &columns[j]).unwrap_or(0.0);
                let ratio = (covariance / moments[i].variance).clamp(0.0, 1.0);
                redundancy_directed.set(i, j, ratio * main_magnitude[i] / gross[i]);
            }
        }

        // second pass: symmetrise
        let synergy = synergy_directed.symmetrized();
        let redundancy = redundancy_directed.symmetrized();

        let shared = (0..n)
            .map(|i| synergy.row_sum(i) + redundancy.row_sum(i))
            .collect::<Vec<_>>();
        let scale = |i: usize, j: usize| 1.0 / shared[i].max(shared[j]).max(1.0);

        let synergy = ScoreMatrix::from_fn(features.clone(), |i, j| {
            Some(if i == j { 0.0 } else { synergy.get(i, j) * scale(i, j) })
        });
        let redundancy = ScoreMatrix::from_fn(features.clone(), |i, j| {
            Some(if i == j {
                0.0
            } else {
                redundancy.get(i, j) * scale(i, j)
            })
        });
        let independence = ScoreMatrix::from_fn(features.clone(), |i, j| {
            let shared = if i == j {
                row_total(&synergy, i) + row_total(&redundancy, i)
            } else {
                synergy.get(i, j).unwrap_or(0.0) + redundancy.get(i, j).unwrap_or(0.0)
            };
            Some((1.0 - shared).max(0.0))
        });

        let zero_variance_features = moments
            .iter()
            .zip(features.iter())
            .filter(|(m, _)| m.is_constant)
            .map(|(_, name)| name.to_owned())
            .collect::<Vec<_>>();
        if !zero_variance_features.is_empty() {
            debug!(
                features = ?zero_variance_features,
                "zero-variance main effects; synergy and redundancy defined as 0"
            );
        }
        debug!(
            observations = n_obs,
            features = n,
            total_importance = total,
            "decomposed fold"
        );

        Ok(FoldResult {
            synergy,
            redundancy,
            independence,
            importance,
            zero_variance_features,
        })
    }
}

fn check_finite<I>(input: &'static str, values: I) -> Result<(), NonFiniteScoreError>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    match values.into_iter().find(|(_, v)| !v.is_finite()) {
        Some((index, _)) => Err(NonFiniteScoreError { input, index }),
        None => Ok(()),
    }
}

fn row_total(matrix: &ScoreMatrix, i: usize) -> f64 {
    matrix.off_diagonal_row(i).map(|(_, v)| v).sum()
}

#[derive(Debug, Clone, Copy)]
struct ColumnMoments {
    variance: f64,
    is_constant: bool,
}

impl ColumnMoments {
    fn new(column: &[f64], tolerance: f64) -> Self {
        let mean = facet_stats::descriptive::mean(column).unwrap_or(0.0);
        let variance = facet_stats::descriptive::variance(column).unwrap_or(0.0);
        // relative to the mean square, so the test does not depend on scale
        let mean_square = variance + mean.powi(2);
        let is_constant = variance <= tolerance * mean_square;
        Self {
            variance,
            is_constant,
        }
    }
}

/// Dense `n × n` table of pair values, possibly asymmetric.
#[derive(Debug, Clone)]
struct PairTable {
    n: usize,
    values: Vec<f64>,
}

impl PairTable {
    fn new(n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; n * n],
        }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.n + j] = value;
    }

    fn row_sum(&self, i: usize) -> f64 {
        (0..self.n).filter(|&j| j != i).map(|j| self.get(i, j)).sum()
    }

    fn symmetrized(&self) -> Self {
        let mut out = Self::new(self.n);
        for i in 0..self.n {
            for j in 0..self.n {
                out.set(i, j, 0.5 * (self.get(i, j) + self.get(j, i)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng as _;
    use rand_distr::{Distribution as _, Normal};
    use rand_pcg::Pcg32;

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn features(n: usize) -> FeatureSet {
        FeatureSet::new((0..n).map(|i| format!("f{i}"))).unwrap()
    }

    /// Main effects with a shared latent factor, plus symmetric interactions.
    fn synthetic_fold(seed: u64, n_obs: usize, n: usize) -> (MainEffects, Interactions) {
        let mut rng = Pcg32::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut values = Vec::with_capacity(n_obs * n);
        for _ in 0..n_obs {
            let latent = normal.sample(&mut rng);
            for i in 0..n {
                let noise = normal.sample(&mut rng);
                values.push(if i % 2 == 0 { latent + 0.3 * noise } else { noise });
            }
        }
        let main = MainEffects::new(n_obs, n, values).unwrap();

        let mut pair_noise = vec![0.0; n_obs * n * n];
        for o in 0..n_obs {
            for i in 0..n {
                for j in (i + 1)..n {
                    let v = 0.2 * normal.sample(&mut rng);
                    pair_noise[(o * n + i) * n + j] = v;
                    pair_noise[(o * n + j) * n + i] = v;
                }
            }
        }
        let interactions = Interactions::new(n_obs, n, pair_noise).unwrap();
        (main, interactions)
    }

    #[test]
    fn test_matrices_are_symmetric() {
        for seed in 0..5 {
            let (main, interactions) = synthetic_fold(seed, 40, 5);
            let fold = PairwiseDecomposer::default()
                .decompose(&main, &interactions, &features(5))
                .unwrap();
            assert!(fold.synergy().max_asymmetry() <= TOLERANCE);
            assert!(fold.redundancy().max_asymmetry() <= TOLERANCE);
            for i in 0..5 {
                for j in 0..5 {
                    assert_abs_diff_eq!(
                        fold.synergy().get(i, j).unwrap(),
                        fold.synergy().get(j, i).unwrap(),
                        epsilon = TOLERANCE
                    );
                    assert_abs_diff_eq!(
                        fold.redundancy().get(i, j).unwrap(),
                        fold.redundancy().get(j, i).unwrap(),
                        epsilon = TOLERANCE
                    );
                }
            }
        }
    }

    #[test]
    fn test_decomposition_partitions_importance() {
        for seed in 0..5 {
            let (main, interactions) = synthetic_fold(seed, 30, 6);
            let fold = PairwiseDecomposer::default()
                .decompose(&main, &interactions, &features(6))
                .unwrap();
            for i in 0..6 {
                let total =
                    fold.independent_share(i) + fold.synergy_share(i) + fold.redundancy_share(i);
                assert_abs_diff_eq!(total, 1.0, epsilon = TOLERANCE);
            }
            assert!(fold.synergy().is_bounded(0.0, 1.0));
            assert!(fold.redundancy().is_bounded(0.0, 1.0));
            assert!(fold.independence().is_bounded(0.0, 1.0));
            assert_abs_diff_eq!(fold.importance().iter().sum::<f64>(), 1.0, epsilon = TOLERANCE);
        }
    }

    #[test]
    fn test_many_collinear_features_stay_bounded() {
        // five copies of the same signal: raw redundancy shares add up to 4
        let rows = (0..10)
            .map(|o| {
                let v = f64::from(o) - 4.5;
                vec![v; 5]
            })
            .collect::<Vec<_>>();
        let main = MainEffects::from_rows(&rows).unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(10, 5), &features(5))
            .unwrap();
        for i in 0..5 {
            assert_abs_diff_eq!(fold.redundancy_share(i), 1.0, epsilon = TOLERANCE);
            assert_abs_diff_eq!(fold.independent_share(i), 0.0, epsilon = TOLERANCE);
            for j in (0..5).filter(|&j| j != i) {
                assert_abs_diff_eq!(fold.redundancy().get(i, j).unwrap(), 0.25, epsilon = TOLERANCE);
            }
        }
    }

    #[test]
    fn test_zero_variance_feature_has_no_shared_importance() {
        let main = MainEffects::from_rows(&[
            vec![1.0, 0.5, 2.0],
            vec![-1.0, 0.5, 1.0],
            vec![3.0, 0.5, -2.0],
            vec![0.0, 0.5, 0.5],
        ])
        .unwrap();
        let interactions = Interactions::from_fn(4, 3, |o, i, j| {
            if i == j {
                0.0
            } else {
                #[expect(clippy::cast_precision_loss)]
                let v = o as f64 + 1.0;
                v
            }
        });
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &interactions, &features(3))
            .unwrap();

        assert_eq!(fold.zero_variance_features(), &["f1"]);
        for j in [0, 2] {
            assert_eq!(fold.synergy().get(1, j), Some(0.0));
            assert_eq!(fold.redundancy().get(1, j), Some(0.0));
        }
        assert_abs_diff_eq!(fold.independent_share(1), 1.0);
        assert!(fold.synergy().get(0, 2).unwrap() > 0.0);
    }

    #[test]
    fn test_all_zero_scores_are_defined() {
        let main = MainEffects::new(3, 2, vec![0.0; 6]).unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(3, 2), &features(2))
            .unwrap();
        assert_eq!(fold.importance(), &[0.0, 0.0]);
        assert_eq!(fold.redundancy().get(0, 1), Some(0.0));
        assert_eq!(fold.independent_share(0), 1.0);
    }

    #[test]
    fn test_uncorrelated_features_are_independent() {
        let main = MainEffects::from_rows(&[
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![1.0, -1.0],
            vec![-1.0, -1.0],
        ])
        .unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(4, 2), &features(2))
            .unwrap();
        assert_abs_diff_eq!(fold.redundancy().get(0, 1).unwrap(), 0.0);
        assert_abs_diff_eq!(fold.independent_share(0), 1.0);
        assert_abs_diff_eq!(fold.importance()[0], 0.5);
    }

    #[test]
    fn test_anticorrelated_features_are_not_redundant() {
        let main =
            MainEffects::from_rows(&[vec![1.0, -1.0], vec![-1.0, 1.0], vec![2.0, -2.0]]).unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(3, 2), &features(2))
            .unwrap();
        assert_eq!(fold.redundancy().get(0, 1), Some(0.0));
    }

    #[test]
    fn test_redundancy_averages_both_directions() {
        // b = 2a: cov/var_a = 2 (clamped to 1), cov/var_b = 0.5
        let main = MainEffects::from_rows(&[
            vec![1.0, 2.0],
            vec![-1.0, -2.0],
            vec![3.0, 6.0],
            vec![-3.0, -6.0],
        ])
        .unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(4, 2), &features(2))
            .unwrap();
        assert_abs_diff_eq!(fold.redundancy().get(0, 1).unwrap(), 0.75, epsilon = TOLERANCE);
        assert_abs_diff_eq!(fold.independent_share(1), 0.25, epsilon = TOLERANCE);
    }

    #[test]
    fn test_pure_synergy() {
        let main = MainEffects::from_rows(&[
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![1.0, -1.0],
            vec![-1.0, -1.0],
        ])
        .unwrap();
        let interactions = Interactions::from_fn(4, 2, |_, i, j| if i == j { 0.0 } else { 2.0 });
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &interactions, &features(2))
            .unwrap();
        // T = 1, s = 2, G = 2: half of each feature's importance is synergy
        assert_abs_diff_eq!(fold.synergy().get(0, 1).unwrap(), 0.5, epsilon = TOLERANCE);
        assert_abs_diff_eq!(fold.independent_share(0), 0.5, epsilon = TOLERANCE);
        assert_abs_diff_eq!(fold.importance()[1], 0.5, epsilon = TOLERANCE);
    }

    #[test]
    fn test_statistic_is_configurable() {
        let main = MainEffects::from_rows(&[
            vec![1.0, 1.0],
            vec![-1.0, 1.0],
            vec![1.0, -1.0],
            vec![-1.0, -1.0],
        ])
        .unwrap();
        let interactions = Interactions::from_fn(4, 2, |o, i, j| {
            if i != j && o == 0 { 4.0 } else { 0.0 }
        });
        let rms = PairwiseDecomposer::default()
            .decompose(&main, &interactions, &features(2))
            .unwrap();
        let mean_abs = PairwiseDecomposer::new(&InspectionConfig {
            synergy_statistic: SynergyStatistic::MeanAbsolute,
            ..InspectionConfig::default()
        })
        .decompose(&main, &interactions, &features(2))
        .unwrap();
        // RMS: s = 2, G = 2 → 0.5; mean-abs: s = 1, G = 1.5 → 1/3
        assert_abs_diff_eq!(rms.synergy().get(0, 1).unwrap(), 0.5, epsilon = TOLERANCE);
        assert_abs_diff_eq!(mean_abs.synergy().get(0, 1).unwrap(), 1.0 / 3.0, epsilon = TOLERANCE);
    }

    #[test]
    fn test_single_observation_is_insufficient() {
        let main = MainEffects::new(1, 2, vec![1.0, 2.0]).unwrap();
        let err = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(1, 2), &features(2))
            .unwrap_err();
        assert_eq!(
            err,
            DecomposeError::InsufficientData(InsufficientDataError {
                observations: 1,
                features: 2,
            })
        );
    }

    #[test]
    fn test_shape_mismatch_is_reported_first() {
        let main = MainEffects::new(1, 3, vec![0.0; 3]).unwrap();
        let err = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(1, 2), &features(2))
            .unwrap_err();
        assert!(matches!(err, DecomposeError::ShapeMismatch(_)));

        let main = MainEffects::new(3, 2, vec![0.0; 6]).unwrap();
        let err = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(4, 2), &features(2))
            .unwrap_err();
        assert_eq!(
            err,
            DecomposeError::ShapeMismatch(ShapeMismatchError {
                dimension: "interaction observations",
                expected: 3,
                actual: 4,
            })
        );
    }

    #[test]
    fn test_non_finite_scores_are_rejected() {
        let main = MainEffects::new(2, 2, vec![1.0, f64::NAN, 0.0, 1.0]).unwrap();
        let err = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(2, 2), &features(2))
            .unwrap_err();
        assert_eq!(
            err,
            DecomposeError::NonFiniteScore(NonFiniteScoreError {
                input: "main effects",
                index: 1,
            })
        );
    }

    #[test]
    fn test_undefined_self_interactions_are_ignored() {
        let main =
            MainEffects::from_rows(&[vec![1.0, 0.5], vec![-1.0, 0.5], vec![2.0, -1.0]]).unwrap();
        let interactions =
            Interactions::from_fn(3, 2, |_, i, j| if i == j { f64::NAN } else { 0.1 });
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &interactions, &features(2))
            .unwrap();
        assert!(fold.synergy().get(0, 1).unwrap() > 0.0);
        assert!(fold.synergy().is_bounded(0.0, 1.0));

        let interactions = Interactions::from_fn(3, 2, |o, i, j| {
            if (o, i, j) == (1, 1, 0) { f64::INFINITY } else { 0.1 }
        });
        let err = PairwiseDecomposer::default()
            .decompose(&main, &interactions, &features(2))
            .unwrap_err();
        assert_eq!(
            err,
            DecomposeError::NonFiniteScore(NonFiniteScoreError {
                input: "interactions",
                index: 6,
            })
        );
    }

    #[test]
    fn test_small_scale_collinear_features_are_redundant() {
        let rows = [1.0, -1.0, 2.0, -2.0]
            .iter()
            .map(|&v| vec![1e-7 * v, 1e-7 * v])
            .collect::<Vec<_>>();
        let main = MainEffects::from_rows(&rows).unwrap();
        let fold = PairwiseDecomposer::default()
            .decompose(&main, &Interactions::zeros(4, 2), &features(2))
            .unwrap();
        assert!(fold.zero_variance_features().is_empty());
        assert_abs_diff_eq!(fold.redundancy().get(0, 1).unwrap(), 1.0, epsilon = TOLERANCE);
        assert_abs_diff_eq!(fold.independent_share(0), 0.0, epsilon = TOLERANCE);
    }

    #[test]
    fn test_fold_result_new_checks_shapes() {
        let two = features(2);
        let three = features(3);
        let ok = FoldResult::new(
            ScoreMatrix::empty(two.clone()),
            ScoreMatrix::empty(two.clone()),
            ScoreMatrix::empty(two.clone()),
            vec![0.5, 0.5],
        );
        assert!(ok.is_ok());
        let err = FoldResult::new(
            ScoreMatrix::empty(two.clone()),
            ScoreMatrix::empty(three),
            ScoreMatrix::empty(two.clone()),
            vec![0.5, 0.5],
        );
        assert!(err.is_err());
        let err = FoldResult::new(
            ScoreMatrix::empty(two.clone()),
            ScoreMatrix::empty(two.clone()),
            ScoreMatrix::empty(two),
            vec![1.0],
        );
        assert!(err.is_err());
    }
}
