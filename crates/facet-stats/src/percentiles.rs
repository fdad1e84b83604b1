/// Precomputed percentile values for a dataset.
///
/// Percentiles are computed with linear interpolation between the two
/// closest ranks (the "linear" method of most numeric libraries).
///
/// # Examples
///
/// ```
/// use facet_stats::percentiles::Percentiles;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let percentiles = Percentiles::new(&values, &[25.0, 50.0, 75.0]);
///
/// assert_eq!(percentiles.get(50.0), Some(3.0));
/// assert_eq!(percentiles.get(25.0), Some(2.0));
/// ```
#[derive(Debug, Clone)]
pub struct Percentiles {
    /// Percentile-value pairs in the order they were requested.
    /// Each tuple contains (percentile, value) where percentile is 0.0-100.0;
    /// the value is `None` when the dataset was empty.
    values: Vec<(f64, Option<f64>)>,
}

impl Percentiles {
    /// Computes percentiles from sorted values.
    ///
    /// # Arguments
    ///
    /// * `sorted_values` - Values sorted in ascending order
    /// * `percentile_points` - The percentile points to compute (e.g., [10.0, 90.0])
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], percentile_points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let values = percentile_points
            .iter()
            .map(|&p| (p, compute_quantile(sorted_values, p / 100.0)))
            .collect();
        Self { values }
    }

    /// Computes percentiles from unsorted values.
    ///
    /// This method will sort the values internally before computing percentiles.
    #[must_use]
    pub fn new(values: &[f64], percentile_points: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, percentile_points)
    }

    /// Gets the value at a specific percentile.
    ///
    /// Returns `None` if the percentile was not precomputed or the dataset
    /// was empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use facet_stats::percentiles::Percentiles;
    ///
    /// let percentiles = Percentiles::new(&[1.0, 2.0, 3.0], &[50.0]);
    /// assert_eq!(percentiles.get(50.0), Some(2.0));
    /// assert_eq!(percentiles.get(90.0), None);
    ///
    /// let empty = Percentiles::new(&[], &[50.0]);
    /// assert_eq!(empty.get(50.0), None);
    /// ```
    #[must_use]
    pub fn get(&self, percentile: f64) -> Option<f64> {
        self.values.iter().find_map(|(p, value)| {
            if (*p - percentile).abs() < f64::EPSILON {
                *value
            } else {
                None
            }
        })
    }

    /// Returns an iterator over all computed (percentile, value) pairs.
    ///
    /// Yields nothing if the dataset was empty.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().filter_map(|&(p, value)| Some((p, value?)))
    }
}

/// Computes a quantile from sorted data with linear interpolation.
///
/// For `n` values the quantile `q` sits at fractional rank `(n - 1) * q`;
/// the result interpolates between the two neighbouring values. `q` is
/// clamped to `[0, 1]`.
///
/// Returns `None` for empty input.
///
/// # Examples
///
/// ```
/// use facet_stats::percentiles::compute_quantile;
///
/// let values = [0.0, 10.0, 20.0, 30.0];
/// assert_eq!(compute_quantile(&values, 0.5), Some(15.0));
/// assert_eq!(compute_quantile(&values, 1.0), Some(30.0));
/// assert_eq!(compute_quantile(&[], 0.5), None);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_quantile(sorted_values: &[f64], q: f64) -> Option<f64> {
    let last = sorted_values.len().checked_sub(1)?;
    let rank = last as f64 * q.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - rank.floor();
    let lower_value = sorted_values[lower];
    let upper_value = sorted_values[upper.min(last)];
    Some(lower_value + (upper_value - lower_value) * fraction)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_single_value() {
        assert_eq!(compute_quantile(&[4.2], 0.1), Some(4.2));
        assert_eq!(compute_quantile(&[4.2], 0.9), Some(4.2));
    }

    #[test]
    fn test_interpolates_between_ranks() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        // rank 0.9 * 9 = 8.1
        assert_abs_diff_eq!(compute_quantile(&values, 0.9).unwrap(), 9.1, epsilon = 1e-12);
        // rank 0.1 * 9 = 0.9
        assert_abs_diff_eq!(compute_quantile(&values, 0.1).unwrap(), 1.9, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_quantile_is_clamped() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(compute_quantile(&values, -0.5), Some(1.0));
        assert_eq!(compute_quantile(&values, 1.5), Some(3.0));
    }

    #[test]
    fn test_percentiles_unsorted_input() {
        let percentiles = Percentiles::new(&[5.0, 1.0, 3.0, 2.0, 4.0], &[0.0, 100.0]);
        assert_eq!(percentiles.get(0.0), Some(1.0));
        assert_eq!(percentiles.get(100.0), Some(5.0));
        assert_eq!(percentiles.iter().count(), 2);
    }
}
