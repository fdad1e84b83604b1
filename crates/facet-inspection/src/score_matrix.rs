//! Square, symmetric affinity matrices over a feature set
//!
//! A [`ScoreMatrix`] stores one `f64` per feature pair together with a
//! presence mask. A cell without a measurement is "no data": [`ScoreMatrix::get`]
//! returns `None` for it, and no arithmetic ever treats it as zero.
//!
//! Every write goes through [`ScoreMatrix::set`], which writes both `(i, j)`
//! and `(j, i)`, so a matrix is symmetric by construction.

use serde::{Serialize, Serializer};

use crate::feature_set::FeatureSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    features: FeatureSet,
    values: Vec<f64>,
    present: Vec<bool>,
}

impl ScoreMatrix {
    /// Creates a matrix in which every cell is "no data".
    #[must_use]
    pub fn empty(features: FeatureSet) -> Self {
        let n = features.len();
        Self {
            features,
            values: vec![0.0; n * n],
            present: vec![false; n * n],
        }
    }

    /// Creates a matrix from a function evaluated on the upper triangle
    /// (`i <= j`), mirrored onto the lower triangle.
    ///
    /// # Examples
    ///
    /// ```
    /// use facet_inspection::{feature_set::FeatureSet, score_matrix::ScoreMatrix};
    ///
    /// let features = FeatureSet::new(["a", "b", "c"]).unwrap();
    /// let m = ScoreMatrix::from_fn(features, |_, j| (j != 2).then_some(0.5));
    ///
    /// assert_eq!(m.get(0, 1), Some(0.5));
    /// assert_eq!(m.get(1, 0), Some(0.5));
    /// assert_eq!(m.get(2, 0), None);
    /// ```
    #[must_use]
    pub fn from_fn<F>(features: FeatureSet, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> Option<f64>,
    {
        let mut matrix = Self::empty(features);
        let n = matrix.len();
        for i in 0..n {
            for j in i..n {
                if let Some(value) = f(i, j) {
                    matrix.set(i, j, value);
                }
            }
        }
        matrix
    }

    /// Number of features (rows and columns).
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        let n = self.len();
        assert!(i < n && j < n, "cell ({i}, {j}) out of bounds for {n} features");
        i * n + j
    }

    /// The value of cell `(i, j)`, or `None` if it holds no data.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let offset = self.offset(i, j);
        self.present[offset].then(|| self.values[offset])
    }

    /// Like [`Self::get`], addressing the cell by feature names.
    #[must_use]
    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.features.index_of(a)?;
        let j = self.features.index_of(b)?;
        self.get(i, j)
    }

    #[must_use]
    pub fn is_present(&self, i: usize, j: usize) -> bool {
        self.present[self.offset(i, j)]
    }

    /// Sets cells `(i, j)` and `(j, i)`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let upper = self.offset(i, j);
        let lower = self.offset(j, i);
        self.values[upper] = value;
        self.values[lower] = value;
        self.present[upper] = true;
        self.present[lower] = true;
    }

    /// Marks cells `(i, j)` and `(j, i)` as "no data".
    pub fn clear(&mut self, i: usize, j: usize) {
        let upper = self.offset(i, j);
        let lower = self.offset(j, i);
        self.present[upper] = false;
        self.present[lower] = false;
    }

    /// Present off-diagonal cells of row `i` as `(column, value)` pairs.
    pub fn off_diagonal_row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.len())
            .filter(move |&j| j != i)
            .filter_map(move |j| self.get(i, j).map(|value| (j, value)))
    }

    /// Number of present cells.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.present.iter().filter(|p| **p).count()
    }

    /// Largest `|m[i][j] - m[j][i]|` over present cells.
    #[must_use]
    pub fn max_asymmetry(&self) -> f64 {
        let n = self.len();
        let mut max = 0.0_f64;
        for i in 0..n {
            for j in (i + 1)..n {
                if let (Some(a), Some(b)) = (self.get(i, j), self.get(j, i)) {
                    max = max.max((a - b).abs());
                }
            }
        }
        max
    }

    /// `true` if every present cell lies in `[min, max]`.
    #[must_use]
    pub fn is_bounded(&self, min: f64, max: f64) -> bool {
        std::iter::zip(&self.values, &self.present)
            .filter(|(_, present)| **present)
            .all(|(&value, _)| (min..=max).contains(&value))
    }

    /// Permutes rows and columns: row `k` of the result is row `order[k]` of
    /// `self`.
    ///
    /// # Panics
    ///
    /// Panics if `order` is not a permutation of `0..self.len()`.
    #[must_use]
    pub fn reordered(&self, order: &[usize]) -> Self {
        assert_permutation(order, self.len());
        let features = FeatureSet::new(order.iter().map(|&i| self.features.names()[i].clone()))
            .expect("a permutation of a feature set has unique names");
        let mut matrix = Self::empty(features);
        for (new_i, &old_i) in order.iter().enumerate() {
            for (new_j, &old_j) in order.iter().enumerate().skip(new_i) {
                if let Some(value) = self.get(old_i, old_j) {
                    matrix.set(new_i, new_j, value);
                }
            }
        }
        matrix
    }

    /// Rows of the matrix with "no data" cells as `None`.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<Option<f64>>> {
        let n = self.len();
        (0..n)
            .map(|i| (0..n).map(|j| self.get(i, j)).collect())
            .collect()
    }
}

pub(crate) fn assert_permutation(order: &[usize], len: usize) {
    let mut seen = vec![false; len];
    assert_eq!(order.len(), len, "order must list every feature once");
    for &i in order {
        assert!(i < len && !seen[i], "order must be a permutation");
        seen[i] = true;
    }
}

impl Serialize for ScoreMatrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Repr<'a> {
            features: &'a FeatureSet,
            values: Vec<Vec<Option<f64>>>,
        }

        Repr {
            features: &self.features,
            values: self.to_rows(),
        }
        .serialize(serializer)
    }
}
