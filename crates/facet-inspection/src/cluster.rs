//! Hierarchical clustering of features by redundancy.
//!
//! Redundancy `ρ` is turned into a dissimilarity `d = 1 - clamp(ρ, 0, 1)`,
//! so perfectly redundant features are at distance 0 and features sharing
//! nothing at distance 1. Clusters are merged bottom-up with average
//! linkage.
//!
//! ```text
//!          5 (d = 0.7)
//!         / \
//!        4   \  (d = 0.2)
//!       / \   \
//!      0   1   2   (leaves: features in canonical order)
//! ```
//!
//! Cells without data are never treated as a distance. Two clusters are
//! mergeable only if at least one pair of their members was measured, and
//! their distance is the mean over the measured pairs.

use serde::Serialize;
use tracing::debug;

use crate::{
    config::{InspectionConfig, LinkageStrategy},
    feature_set::FeatureSet,
    score_matrix::ScoreMatrix,
};

/// The measured cells split the features into groups with no measured pair
/// between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display("redundancy matrix has {} disconnected groups of features", groups.len())]
pub struct DegenerateMatrixError {
    /// Feature names of each group, in canonical order; groups are ordered
    /// by their lowest canonical index.
    pub groups: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ClusterError {
    #[display("cannot cluster an empty redundancy matrix")]
    Empty,
    #[display("{_0}")]
    Degenerate(DegenerateMatrixError),
}

/// One agglomeration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Merge {
    /// Child node with the lower id.
    pub left: usize,
    /// Child node with the higher id.
    pub right: usize,
    pub distance: f64,
    /// Number of leaves under the new node.
    pub size: usize,
}

/// Binary merge tree over a feature set.
///
/// Leaves `0..n` are the features in canonical order; merge `k` creates
/// node `n + k`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Linkage {
    features: FeatureSet,
    merges: Vec<Merge>,
}

impl Linkage {
    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.features.len()
    }

    /// Leaves in dendrogram order, visiting the left child first.
    #[must_use]
    pub fn leaf_order(&self) -> Vec<usize> {
        let n = self.n_leaves();
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![n + self.merges.len() - 1];
        while let Some(node) = stack.pop() {
            if node < n {
                order.push(node);
            } else {
                let merge = &self.merges[node - n];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        order
    }

    /// Flat clusters formed by all merges at distance `<= max_distance`.
    ///
    /// Each cluster lists canonical indices in ascending order; clusters are
    /// ordered by their lowest index.
    ///
    /// # Examples
    ///
    /// ```
    /// use facet_inspection::{
    ///     cluster::RedundancyClusterer, config::InspectionConfig, feature_set::FeatureSet,
    ///     score_matrix::ScoreMatrix,
    /// };
    ///
    /// let features = FeatureSet::new(["a", "b", "c"]).unwrap();
    /// let redundancy = ScoreMatrix::from_fn(features, |i, j| {
    ///     Some(if (i, j) == (0, 2) { 0.9 } else { 0.1 })
    /// });
    /// let linkage = RedundancyClusterer::new(&InspectionConfig::default())
    ///     .cluster(&redundancy)
    ///     .unwrap();
    ///
    /// assert_eq!(linkage.clusters_at(0.5), vec![vec![0, 2], vec![1]]);
    /// assert_eq!(linkage.clusters_at(1.0), vec![vec![0, 1, 2]]);
    /// ```
    #[must_use]
    pub fn clusters_at(&self, max_distance: f64) -> Vec<Vec<usize>> {
        let n = self.n_leaves();
        let mut node_leaf = (0..n).collect::<Vec<_>>();
        let mut groups = DisjointSet::new(n);
        for merge in &self.merges {
            if merge.distance <= max_distance {
                groups.union(node_leaf[merge.left], node_leaf[merge.right]);
            }
            node_leaf.push(node_leaf[merge.left]);
        }
        groups.groups()
    }
}

/// Builds a [`Linkage`] from a redundancy matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedundancyClusterer {
    linkage: LinkageStrategy,
}

impl RedundancyClusterer {
    #[must_use]
    pub fn new(config: &InspectionConfig) -> Self {
        Self {
            linkage: config.linkage,
        }
    }

    pub fn cluster(&self, redundancy: &ScoreMatrix) -> Result<Linkage, ClusterError> {
        let n = redundancy.len();
        if n == 0 {
            return Err(ClusterError::Empty);
        }
        check_connected(redundancy)?;

        let mut pairs = PairSums::new(n);
        for i in 0..n {
            for (j, value) in redundancy.off_diagonal_row(i) {
                pairs.add(i, j, 1.0 - value.clamp(0.0, 1.0), 1);
            }
        }

        let mut clusters = (0..n)
            .map(|i| {
                Some(Cluster {
                    node: i,
                    lowest: i,
                    size: 1,
                })
            })
            .collect::<Vec<_>>();
        let mut merges = Vec::with_capacity(n - 1);

        while merges.len() + 1 < n {
            let (a, b, distance) = self
                .closest_pair(&clusters, &pairs)
                .expect("a connected matrix always has a mergeable pair");
            let (first, second) = clusters[a]
                .zip(clusters[b])
                .expect("closest pair refers to active clusters");
            let merge = Merge {
                left: first.node.min(second.node),
                right: first.node.max(second.node),
                distance,
                size: first.size + second.size,
            };
            debug!(
                left = merge.left,
                right = merge.right,
                distance = merge.distance,
                size = merge.size,
                "merged clusters"
            );

            clusters[a] = Some(Cluster {
                node: n + merges.len(),
                lowest: first.lowest.min(second.lowest),
                size: merge.size,
            });
            clusters[b] = None;
            pairs.absorb(a, b);
            merges.push(merge);
        }

        Ok(Linkage {
            features: redundancy.features().clone(),
            merges,
        })
    }

    /// The mergeable pair of slots with the smallest
    /// `(distance, lowest index, lowest index)`.
    fn closest_pair(
        &self,
        clusters: &[Option<Cluster>],
        pairs: &PairSums,
    ) -> Option<(usize, usize, f64)> {
        let active = clusters
            .iter()
            .enumerate()
            .filter_map(|(slot, cluster)| cluster.map(|c| (slot, c)))
            .collect::<Vec<_>>();

        let mut best: Option<(f64, usize, usize, usize, usize)> = None;
        for (x, &(slot_x, cx)) in active.iter().enumerate() {
            for &(slot_y, cy) in &active[x + 1..] {
                let distance = match self.linkage {
                    LinkageStrategy::Average => pairs.average(slot_x, slot_y),
                };
                let Some(distance) = distance else {
                    continue;
                };
                let (first, second) = if cx.lowest < cy.lowest {
                    ((cx.lowest, slot_x), (cy.lowest, slot_y))
                } else {
                    ((cy.lowest, slot_y), (cx.lowest, slot_x))
                };
                let candidate = (distance, first.0, second.0, first.1, second.1);
                let is_better = best.is_none_or(|b| {
                    candidate
                        .0
                        .total_cmp(&b.0)
                        .then(candidate.1.cmp(&b.1))
                        .then(candidate.2.cmp(&b.2))
                        .is_lt()
                });
                if is_better {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(distance, _, _, a, b)| (a, b, distance))
    }
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    node: usize,
    lowest: usize,
    size: usize,
}

/// Sum and count of measured dissimilarities between cluster slots.
#[derive(Debug, Clone)]
struct PairSums {
    n: usize,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl PairSums {
    fn new(n: usize) -> Self {
        Self {
            n,
            sums: vec![0.0; n * n],
            counts: vec![0; n * n],
        }
    }

    fn add(&mut self, a: usize, b: usize, sum: f64, count: usize) {
        self.sums[a * self.n + b] += sum;
        self.counts[a * self.n + b] += count;
    }

    #[expect(clippy::cast_precision_loss)]
    fn average(&self, a: usize, b: usize) -> Option<f64> {
        let count = self.counts[a * self.n + b];
        (count > 0).then(|| self.sums[a * self.n + b] / count as f64)
    }

    /// Folds slot `b` into slot `a`.
    fn absorb(&mut self, a: usize, b: usize) {
        for k in (0..self.n).filter(|&k| k != a && k != b) {
            let (sum, count) = (self.sums[b * self.n + k], self.counts[b * self.n + k]);
            self.add(a, k, sum, count);
            self.add(k, a, sum, count);
        }
        for k in 0..self.n {
            self.sums[b * self.n + k] = 0.0;
            self.counts[b * self.n + k] = 0;
            self.sums[k * self.n + b] = 0.0;
            self.counts[k * self.n + b] = 0;
        }
    }
}

fn check_connected(redundancy: &ScoreMatrix) -> Result<(), DegenerateMatrixError> {
    let n = redundancy.len();
    let mut components = DisjointSet::new(n);
    for i in 0..n {
        for (j, _) in redundancy.off_diagonal_row(i) {
            components.union(i, j);
        }
    }
    let groups = components.groups();
    if groups.len() <= 1 {
        return Ok(());
    }
    let names = redundancy.features().names();
    Err(DegenerateMatrixError {
        groups: groups
            .into_iter()
            .map(|group| group.into_iter().map(|i| names[i].clone()).collect())
            .collect(),
    })
}

#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        // the lower index becomes the root
        if a < b {
            self.parent[b] = a;
        } else {
            self.parent[a] = b;
        }
    }

    /// Members of each set in ascending order, sets ordered by lowest member.
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut groups: Vec<Vec<usize>> = vec![];
        let mut group_of_root: Vec<Option<usize>> = vec![None; n];
        for i in 0..n {
            let root = self.find(i);
            match group_of_root[root] {
                Some(g) => groups[g].push(i),
                None => {
                    group_of_root[root] = Some(groups.len());
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }
}
