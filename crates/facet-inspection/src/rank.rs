use serde::Serialize;

use crate::aggregate::AggregatedResult;

/// A feature with its ranking key and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeature {
    pub name: String,
    /// Canonical index in the aggregated result.
    pub index: usize,
    /// Independent amount plus half of every shared pair amount.
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Orders features by the importance they carry after splitting shared
/// amounts evenly between the two partners.
///
/// For feature `i` with aggregated importance `t_i`, independent fraction
/// `a_i`, synergy `σ` and redundancy `ρ`:
///
/// ```text
/// key_i = t_i·a_i + ½ Σ_j σ_ij (t_i + t_j) + ½ Σ_j ρ_ij (t_i + t_j)
/// ```
///
/// Cells without data contribute nothing. Ties in the key are broken by
/// ascending canonical index.
///
/// # Examples
///
/// ```
/// use facet_inspection::{
///     aggregate::FoldAggregator, config::InspectionConfig, decompose::FoldResult,
///     feature_set::FeatureSet, rank::ImportanceRanker, score_matrix::ScoreMatrix,
/// };
///
/// let features = FeatureSet::new(["low", "high"]).unwrap();
/// let zeros = ScoreMatrix::from_fn(features.clone(), |_, _| Some(0.0));
/// let independence = ScoreMatrix::from_fn(features, |i, j| Some(if i == j { 1.0 } else { 0.0 }));
/// let fold = FoldResult::new(zeros.clone(), zeros, independence, vec![0.25, 0.75]).unwrap();
/// let result = FoldAggregator::new(&InspectionConfig::default())
///     .aggregate(&[fold])
///     .unwrap();
///
/// let ranked = ImportanceRanker.rank(&result);
/// assert_eq!(ranked[0].name, "high");
/// assert_eq!(ranked[0].rank, 1);
/// assert_eq!(ranked[1].name, "low");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceRanker;

impl ImportanceRanker {
    #[must_use]
    pub fn rank(&self, result: &AggregatedResult) -> Vec<RankedFeature> {
        let importance = result
            .importance()
            .iter()
            .map(|f| f.mean)
            .collect::<Vec<_>>();
        let synergy = result.synergy().mean();
        let redundancy = result.redundancy().mean();
        let independence = result.independence().mean();

        let mut ranked = result
            .features()
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let t_i = importance[i];
                let independent = independence.get(i, i).map_or(0.0, |a| t_i * a);
                let shared = synergy
                    .off_diagonal_row(i)
                    .chain(redundancy.off_diagonal_row(i))
                    .map(|(j, fraction)| 0.5 * fraction * (t_i + importance[j]))
                    .sum::<f64>();
                RankedFeature {
                    name: name.to_owned(),
                    index: i,
                    importance: independent + shared,
                    rank: 0, // set after sorting
                }
            })
            .collect::<Vec<_>>();

        ranked.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then(a.index.cmp(&b.index))
        });
        for (i, feature) in ranked.iter_mut().enumerate() {
            feature.rank = i + 1;
        }
        ranked
    }

    /// Canonical indices in rank order, suitable for
    /// [`AggregatedResult::reordered`].
    #[must_use]
    pub fn order(&self, result: &AggregatedResult) -> Vec<usize> {
        self.rank(result).into_iter().map(|f| f.index).collect()
    }
}
