//! Per-fold attribution scores supplied by the attribution oracle
//!
//! Both containers store their values row-major in one flat buffer:
//!
//! - [`MainEffects`]: `observation × feature`
//! - [`Interactions`]: `observation × feature × feature`
//!
//! Shapes are checked once on construction and again against the fold's
//! feature set when a fold is decomposed.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display("shape mismatch in {dimension}: expected {expected}, got {actual}")]
pub struct ShapeMismatchError {
    pub dimension: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl ShapeMismatchError {
    pub(crate) fn check(
        dimension: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self {
                dimension,
                expected,
                actual,
            })
        }
    }
}

/// Per-observation main-effect scores, one per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct MainEffects {
    n_observations: usize,
    n_features: usize,
    values: Vec<f64>,
}

impl MainEffects {
    pub fn new(
        n_observations: usize,
        n_features: usize,
        values: Vec<f64>,
    ) -> Result<Self, ShapeMismatchError> {
        ShapeMismatchError::check(
            "main effect values",
            n_observations * n_features,
            values.len(),
        )?;
        Ok(Self {
            n_observations,
            n_features,
            values,
        })
    }

    /// Builds main effects from one row per observation.
    ///
    /// # Examples
    ///
    /// ```
    /// use facet_inspection::observation::MainEffects;
    ///
    /// let m = MainEffects::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    /// assert_eq!(m.column(1), vec![2.0, 4.0]);
    ///
    /// assert!(MainEffects::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    /// ```
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ShapeMismatchError> {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            ShapeMismatchError::check("main effect row length", n_features, row.len())?;
            values.extend_from_slice(row);
        }
        Self::new(rows.len(), n_features, values)
    }

    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn get(&self, observation: usize, feature: usize) -> f64 {
        self.values[observation * self.n_features + feature]
    }

    /// All observations of one feature.
    #[must_use]
    pub fn column(&self, feature: usize) -> Vec<f64> {
        (0..self.n_observations)
            .map(|o| self.get(o, feature))
            .collect()
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Per-observation pairwise interaction scores.
///
/// The diagonal (a feature's interaction with itself) is stored but never
/// read.
#[derive(Debug, Clone, PartialEq)]
pub struct Interactions {
    n_observations: usize,
    n_features: usize,
    values: Vec<f64>,
}

impl Interactions {
    pub fn new(
        n_observations: usize,
        n_features: usize,
        values: Vec<f64>,
    ) -> Result<Self, ShapeMismatchError> {
        ShapeMismatchError::check(
            "interaction values",
            n_observations * n_features * n_features,
            values.len(),
        )?;
        Ok(Self {
            n_observations,
            n_features,
            values,
        })
    }

    /// Builds an interaction tensor from a function of
    /// `(observation, feature, feature)`.
    pub fn from_fn<F>(n_observations: usize, n_features: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f64,
    {
        let mut values = Vec::with_capacity(n_observations * n_features * n_features);
        for o in 0..n_observations {
            for i in 0..n_features {
                for j in 0..n_features {
                    values.push(f(o, i, j));
                }
            }
        }
        Self {
            n_observations,
            n_features,
            values,
        }
    }

    /// A tensor of zeros: no feature interacts with any other.
    #[must_use]
    pub fn zeros(n_observations: usize, n_features: usize) -> Self {
        Self::from_fn(n_observations, n_features, |_, _, _| 0.0)
    }

    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn get(&self, observation: usize, i: usize, j: usize) -> f64 {
        let n = self.n_features;
        self.values[(observation * n + i) * n + j]
    }

    /// Interaction of `i` and `j` per observation, averaged over both
    /// orientations of the pair.
    #[must_use]
    pub fn symmetric_pair(&self, i: usize, j: usize) -> Vec<f64> {
        (0..self.n_observations)
            .map(|o| 0.5 * (self.get(o, i, j) + self.get(o, j, i)))
            .collect()
    }

    /// Values with `i != j`, paired with their flat index.
    pub(crate) fn off_diagonal_values(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        let n = self.n_features;
        self.values
            .iter()
            .copied()
            .enumerate()
            .filter(move |&(index, _)| (index / n) % n != index % n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_effects_length_checked() {
        let err = MainEffects::new(2, 3, vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            ShapeMismatchError {
                dimension: "main effect values",
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn test_interactions_length_checked() {
        assert!(Interactions::new(2, 2, vec![0.0; 8]).is_ok());
        assert!(Interactions::new(2, 2, vec![0.0; 7]).is_err());
    }

    #[test]
    fn test_interaction_indexing() {
        #[expect(clippy::cast_precision_loss)]
        let x = Interactions::from_fn(2, 3, |o, i, j| (o * 100 + i * 10 + j) as f64);
        assert_eq!(x.get(1, 2, 0), 120.0);
        assert_eq!(x.get(0, 0, 2), 2.0);
    }

    #[test]
    fn test_symmetric_pair_averages_orientations() {
        let x = Interactions::from_fn(1, 2, |_, i, j| if i < j { 1.0 } else { 3.0 });
        assert_eq!(x.symmetric_pair(0, 1), vec![2.0]);
        assert_eq!(x.symmetric_pair(1, 0), vec![2.0]);
    }

    #[test]
    fn test_off_diagonal_values_skip_self_interactions() {
        #[expect(clippy::cast_precision_loss)]
        let x = Interactions::from_fn(2, 2, |o, i, j| (o * 100 + i * 10 + j) as f64);
        let cells = x.off_diagonal_values().collect::<Vec<_>>();
        assert_eq!(cells, vec![(1, 1.0), (2, 10.0), (5, 101.0), (6, 110.0)]);
    }
}
