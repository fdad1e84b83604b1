//! Moments of `f64` samples.
//!
//! All functions treat their input as a complete population (divide by `n`,
//! not `n - 1`) and return `None` for empty input instead of `NaN`.

/// Arithmetic mean of the values.
///
/// # Examples
///
/// ```
/// use facet_stats::descriptive::mean;
///
/// assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
/// assert_eq!(mean(&[]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance of the values.
///
/// # Examples
///
/// ```
/// use facet_stats::descriptive::variance;
///
/// assert_eq!(variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(4.0));
/// assert_eq!(variance(&[3.0, 3.0, 3.0]), Some(0.0));
/// ```
#[must_use]
pub fn variance(values: &[f64]) -> Option<f64> {
    covariance(values, values)
}

/// Population covariance of two equally long samples.
///
/// Returns `None` if the samples are empty or their lengths differ.
///
/// # Examples
///
/// ```
/// use facet_stats::descriptive::covariance;
///
/// let x = [1.0, 2.0, 3.0];
/// let y = [2.0, 4.0, 6.0];
/// let cov = covariance(&x, &y).unwrap();
/// assert!((cov - 4.0 / 3.0).abs() < 1e-12);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let mean_x = mean(x)?;
    let mean_y = mean(y)?;
    let sum = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>();
    Some(sum / x.len() as f64)
}

/// Mean of the absolute values.
#[must_use]
pub fn mean_absolute(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    mean(&values.iter().map(|v| v.abs()).collect::<Vec<_>>())
}

/// Root of the mean of the squared values.
///
/// # Examples
///
/// ```
/// use facet_stats::descriptive::root_mean_square;
///
/// assert_eq!(root_mean_square(&[3.0, -3.0]), Some(3.0));
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn root_mean_square(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum_sq = values.iter().map(|v| v * v).sum::<f64>();
    Some((sum_sq / values.len() as f64).sqrt())
}
