//! Partitioning of observed feature values
//!
//! A partitioner groups the observed values of one feature into a small
//! number of partitions, each represented by a central value. Downstream
//! code uses the partitions to sweep a feature across its observed range
//! (e.g. for simulations) and the frequencies to show how much data backs
//! each partition.
//!
//! # Partitioners
//!
//! - [`ContinuousRangePartitioner`]: equal-width intervals over `f64` values
//! - [`IntegerRangePartitioner`]: equal-width intervals with integer bounds
//! - [`CategoryPartitioner`]: the most frequent categorical values
//!
//! # Range Partitioning
//!
//! The interval width is rounded up to a human-readable step from the series
//! `..., 0.1, 0.2, 0.5, 1, 2, 5, 10, 20, 50, ...`, and every partition centre
//! is a multiple of the step. Unless explicit bounds are given, the range
//! covers the 2.5th to 97.5th percentile of the values, so a handful of
//! outliers do not stretch the partitions.
//!
//! # Examples
//!
//! ```
//! use facet_stats::partition::{ContinuousRangePartitioner, Partitioner, Partitioning};
//!
//! let values = (0..100).map(|v| f64::from(v) / 10.0).collect::<Vec<_>>();
//! let partitioner = ContinuousRangePartitioner::new(10, Some(0.0), Some(10.0)).unwrap();
//! let fitted = partitioner.fit(&values).unwrap();
//!
//! assert_eq!(fitted.partition_width(), 2.0);
//! assert_eq!(fitted.partitions(), &[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
//! assert_eq!(fitted.frequencies().iter().sum::<usize>(), 100);
//! ```

use std::{
    collections::HashMap,
    hash::Hash,
    ops::{Add, Sub},
};

use crate::percentiles;

/// Default maximum number of partitions.
pub const DEFAULT_MAX_PARTITIONS: usize = 20;

const DEFAULT_LOWER_QUANTILE: f64 = 0.025;
const DEFAULT_UPPER_QUANTILE: f64 = 0.975;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum PartitionError {
    #[display("max_partitions={max_partitions} must be at least 2")]
    TooFewPartitions { max_partitions: usize },
    #[display("lower bound {lower} must be less than upper bound {upper}")]
    InvalidBounds { lower: f64, upper: f64 },
    #[display("cannot partition an empty set of values")]
    EmptyValues,
    #[display("step size {step} must be positive")]
    NonPositiveStep { step: f64 },
}

/// A strategy that fits partitions to a set of values.
pub trait Partitioner {
    /// Type of the partitioned values.
    type Value;
    /// Result of fitting this partitioner.
    type Fitted: Partitioning<Value = Self::Value>;

    /// The maximum number of partitions this partitioner generates.
    fn max_partitions(&self) -> usize;

    /// Calculates the partitioning for the given values.
    fn fit(&self, values: &[Self::Value]) -> Result<Self::Fitted, PartitionError>;
}

/// Partitions fitted to a set of values.
pub trait Partitioning {
    /// Type of the partitioned values.
    type Value;

    /// Central value of each partition.
    fn partitions(&self) -> &[Self::Value];

    /// Number of observed values that fall within each partition.
    fn frequencies(&self) -> &[usize];

    /// `true` if the partitions are categories rather than ranges.
    fn is_categorical(&self) -> bool;

    /// Number of partitions.
    fn len(&self) -> usize {
        self.partitions().len()
    }

    /// `true` if there are no partitions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_max_partitions(max_partitions: usize) -> Result<(), PartitionError> {
    if max_partitions < 2 {
        return Err(PartitionError::TooFewPartitions { max_partitions });
    }
    Ok(())
}

fn check_bounds(lower: Option<f64>, upper: Option<f64>) -> Result<(), PartitionError> {
    if let (Some(lower), Some(upper)) = (lower, upper)
        && lower >= upper
    {
        return Err(PartitionError::InvalidBounds { lower, upper });
    }
    Ok(())
}

/// Rounds a step size up to the nearest value in the series
/// `..., 0.1, 0.2, 0.5, 1, 2, 5, 10, ...`.
///
/// # Examples
///
/// ```
/// use facet_stats::partition::ceil_step;
///
/// assert_eq!(ceil_step(0.17).unwrap(), 0.2);
/// assert_eq!(ceil_step(3.0).unwrap(), 5.0);
/// assert_eq!(ceil_step(10.0).unwrap(), 10.0);
/// assert!(ceil_step(0.0).is_err());
/// ```
pub fn ceil_step(step: f64) -> Result<f64, PartitionError> {
    if step.is_nan() || step <= 0.0 {
        return Err(PartitionError::NonPositiveStep { step });
    }
    let ceiled = [1.0, 2.0, 5.0]
        .into_iter()
        .map(|m: f64| 10.0_f64.powf((step * m).log10().ceil()) / m)
        .min_by(f64::total_cmp)
        .unwrap_or(step);
    Ok(ceiled)
}

/// Resolves the fitted range: explicit bounds win, missing ones come from
/// the 2.5 % / 97.5 % quantiles of the values.
fn resolve_bounds(
    sorted_values: &[f64],
    lower: Option<f64>,
    upper: Option<f64>,
) -> Result<(f64, f64), PartitionError> {
    let quantile = |q| {
        percentiles::compute_quantile(sorted_values, q).ok_or(PartitionError::EmptyValues)
    };
    let mut lower_bound = match lower {
        Some(lower) => lower,
        None => quantile(DEFAULT_LOWER_QUANTILE)?,
    };
    let mut upper_bound = match upper {
        Some(upper) => upper,
        None => quantile(DEFAULT_UPPER_QUANTILE)?,
    };
    if upper_bound < lower_bound {
        if upper.is_none() {
            upper_bound = lower_bound;
        } else {
            lower_bound = upper_bound;
        }
    }
    Ok((lower_bound, upper_bound))
}

/// Centre of the first partition, number of partitions, and per-partition
/// counts for a given step.
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
fn layout_partitions(
    values: impl IntoIterator<Item = f64>,
    lower: f64,
    upper: f64,
    step: f64,
) -> (f64, usize, Vec<usize>) {
    let first = ((lower + step / 2.0) / step).floor() * step;
    let last = ((upper - step / 2.0) / step).ceil() * step;
    let count = (((last - first) / step).round().max(0.0) as usize) + 1;

    let mut frequencies = vec![0; count];
    for value in values {
        let idx = ((value - first) / step).round();
        if idx >= 0.0 && idx < count as f64 {
            frequencies[idx as usize] += 1;
        }
    }
    (first, count, frequencies)
}

/// Equal-width range partitions fitted by a range partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePartitioning<T> {
    partitions: Vec<T>,
    frequencies: Vec<usize>,
    step: T,
    center_offset: T,
}

impl<T> RangePartitioning<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T>,
{
    /// The width of each partition.
    #[must_use]
    pub fn partition_width(&self) -> T {
        self.step
    }

    /// The endpoints of the interval of each partition.
    ///
    /// Each tuple `(x, y)` holds the inclusive lower bound and the exclusive
    /// upper bound of a partition.
    #[must_use]
    pub fn partition_bounds(&self) -> Vec<(T, T)> {
        self.partitions
            .iter()
            .map(|&center| {
                let start = center - self.center_offset;
                (start, start + self.step)
            })
            .collect()
    }
}

impl<T> Partitioning for RangePartitioning<T> {
    type Value = T;

    fn partitions(&self) -> &[T] {
        &self.partitions
    }

    fn frequencies(&self) -> &[usize] {
        &self.frequencies
    }

    fn is_categorical(&self) -> bool {
        false
    }
}

/// Partitions `f64` values into intervals of the same length.
///
/// The length is a number in the series `..., 0.1, 0.2, 0.5, 1, 2, 5, ...`
/// and each partition is centred on a multiple of it. The lower bound lies
/// in the first interval and the upper bound in the last.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousRangePartitioner {
    max_partitions: usize,
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
}

impl Default for ContinuousRangePartitioner {
    fn default() -> Self {
        Self {
            max_partitions: DEFAULT_MAX_PARTITIONS,
            lower_bound: None,
            upper_bound: None,
        }
    }
}

impl ContinuousRangePartitioner {
    /// Creates a partitioner.
    ///
    /// Bounds left as `None` are taken from the fitted values.
    pub fn new(
        max_partitions: usize,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
    ) -> Result<Self, PartitionError> {
        check_max_partitions(max_partitions)?;
        check_bounds(lower_bound, upper_bound)?;
        Ok(Self {
            max_partitions,
            lower_bound,
            upper_bound,
        })
    }

    /// The explicit lower bound, if any.
    #[must_use]
    pub fn lower_bound(&self) -> Option<f64> {
        self.lower_bound
    }

    /// The explicit upper bound, if any.
    #[must_use]
    pub fn upper_bound(&self) -> Option<f64> {
        self.upper_bound
    }
}

impl Partitioner for ContinuousRangePartitioner {
    type Value = f64;
    type Fitted = RangePartitioning<f64>;

    fn max_partitions(&self) -> usize {
        self.max_partitions
    }

    #[expect(clippy::cast_precision_loss)]
    fn fit(&self, values: &[f64]) -> Result<Self::Fitted, PartitionError> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (lower, upper) = resolve_bounds(&sorted, self.lower_bound, self.upper_bound)?;

        let step = ceil_step((upper - lower) / (self.max_partitions - 1) as f64)?;
        let (first, count, frequencies) =
            layout_partitions(values.iter().copied(), lower, upper, step);
        let partitions = (0..count).map(|i| first + i as f64 * step).collect();

        Ok(RangePartitioning {
            partitions,
            frequencies,
            step,
            center_offset: step / 2.0,
        })
    }
}

/// Partitions integer values into intervals of the same integer length.
///
/// All interval bounds are integers; the step is at least 1.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerRangePartitioner {
    max_partitions: usize,
    lower_bound: Option<i64>,
    upper_bound: Option<i64>,
}

impl Default for IntegerRangePartitioner {
    fn default() -> Self {
        Self {
            max_partitions: DEFAULT_MAX_PARTITIONS,
            lower_bound: None,
            upper_bound: None,
        }
    }
}

impl IntegerRangePartitioner {
    /// Creates a partitioner.
    ///
    /// Bounds left as `None` are taken from the fitted values.
    #[expect(clippy::cast_precision_loss)]
    pub fn new(
        max_partitions: usize,
        lower_bound: Option<i64>,
        upper_bound: Option<i64>,
    ) -> Result<Self, PartitionError> {
        check_max_partitions(max_partitions)?;
        check_bounds(lower_bound.map(|v| v as f64), upper_bound.map(|v| v as f64))?;
        Ok(Self {
            max_partitions,
            lower_bound,
            upper_bound,
        })
    }
}

impl Partitioner for IntegerRangePartitioner {
    type Value = i64;
    type Fitted = RangePartitioning<i64>;

    fn max_partitions(&self) -> usize {
        self.max_partitions
    }

    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn fit(&self, values: &[i64]) -> Result<Self::Fitted, PartitionError> {
        let mut sorted = values.iter().map(|&v| v as f64).collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);
        let (lower, upper) = resolve_bounds(
            &sorted,
            self.lower_bound.map(|v| v as f64),
            self.upper_bound.map(|v| v as f64),
        )?;

        let raw_step = (upper - lower) / (self.max_partitions - 1) as f64;
        let step = if raw_step > 0.0 {
            ceil_step(raw_step)?.floor().max(1.0)
        } else {
            1.0
        };
        let (first, count, frequencies) =
            layout_partitions(sorted.iter().copied(), lower, upper, step);

        let step = step as i64;
        let first = first as i64;
        let partitions = (0..count)
            .map(|i| first + i as i64 * step)
            .collect();

        Ok(RangePartitioning {
            partitions,
            frequencies,
            step,
            center_offset: step / 2,
        })
    }
}

/// Partitions categorical values, keeping the most frequent ones.
///
/// Partitions are ordered by descending frequency; values seen equally often
/// keep the order of their first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPartitioner<T> {
    max_partitions: usize,
    _value: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for CategoryPartitioner<T> {
    fn default() -> Self {
        Self {
            max_partitions: DEFAULT_MAX_PARTITIONS,
            _value: std::marker::PhantomData,
        }
    }
}

impl<T> CategoryPartitioner<T> {
    pub fn new(max_partitions: usize) -> Result<Self, PartitionError> {
        check_max_partitions(max_partitions)?;
        Ok(Self {
            max_partitions,
            _value: std::marker::PhantomData,
        })
    }
}

/// The most frequent categories fitted by a [`CategoryPartitioner`].
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPartitioning<T> {
    partitions: Vec<T>,
    frequencies: Vec<usize>,
}

impl<T> Partitioning for CategoryPartitioning<T> {
    type Value = T;

    fn partitions(&self) -> &[T] {
        &self.partitions
    }

    fn frequencies(&self) -> &[usize] {
        &self.frequencies
    }

    fn is_categorical(&self) -> bool {
        true
    }
}

impl<T> Partitioner for CategoryPartitioner<T>
where
    T: Clone + Eq + Hash,
{
    type Value = T;
    type Fitted = CategoryPartitioning<T>;

    fn max_partitions(&self) -> usize {
        self.max_partitions
    }

    fn fit(&self, values: &[T]) -> Result<Self::Fitted, PartitionError> {
        // (value, count), in order of first appearance
        let mut counts: Vec<(T, usize)> = vec![];
        let mut positions: HashMap<&T, usize> = HashMap::new();
        for value in values {
            let pos = *positions.entry(value).or_insert_with(|| {
                counts.push((value.clone(), 0));
                counts.len() - 1
            });
            counts[pos].1 += 1;
        }

        let mut order = (0..counts.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| counts[b].1.cmp(&counts[a].1).then(a.cmp(&b)));
        order.truncate(self.max_partitions);

        let (partitions, frequencies): (Vec<T>, Vec<usize>) = order
            .into_iter()
            .map(|idx| counts[idx].clone())
            .unzip();
        Ok(CategoryPartitioning {
            partitions,
            frequencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_rejects_too_few_partitions() {
        assert_eq!(
            ContinuousRangePartitioner::new(1, None, None),
            Err(PartitionError::TooFewPartitions { max_partitions: 1 })
        );
        assert!(CategoryPartitioner::<u8>::new(0).is_err());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        assert!(matches!(
            ContinuousRangePartitioner::new(5, Some(3.0), Some(3.0)),
            Err(PartitionError::InvalidBounds { .. })
        ));
        assert!(IntegerRangePartitioner::new(5, Some(10), Some(2)).is_err());
    }

    #[test]
    fn test_ceil_step_series() {
        assert_abs_diff_eq!(ceil_step(0.11).unwrap(), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(ceil_step(0.4).unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(ceil_step(0.6).unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ceil_step(1.5).unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ceil_step(25.0).unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_continuous_bounds_contain_partitions() {
        let values = (0..50).map(|v| f64::from(v) * 0.37 - 3.0).collect::<Vec<_>>();
        let fitted = ContinuousRangePartitioner::default().fit(&values).unwrap();

        assert!(!fitted.is_categorical());
        assert!(fitted.len() <= DEFAULT_MAX_PARTITIONS + 1);
        for (center, (start, end)) in fitted.partitions().iter().zip(fitted.partition_bounds()) {
            assert!(start <= *center && *center < end);
            assert_abs_diff_eq!(end - start, fitted.partition_width(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_continuous_excludes_out_of_range_values() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 100.0];
        let fitted = ContinuousRangePartitioner::new(5, Some(0.0), Some(4.0))
            .unwrap()
            .fit(&values)
            .unwrap();
        assert_eq!(fitted.partitions(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(fitted.frequencies(), &[1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_continuous_constant_values_fail() {
        let err = ContinuousRangePartitioner::default()
            .fit(&[2.0; 8])
            .unwrap_err();
        assert!(matches!(err, PartitionError::NonPositiveStep { .. }));
    }

    #[test]
    fn test_empty_values_fail() {
        assert_eq!(
            ContinuousRangePartitioner::default().fit(&[]),
            Err(PartitionError::EmptyValues)
        );
    }

    #[test]
    fn test_integer_partitions_use_integer_step() {
        let values = (0..=100).collect::<Vec<i64>>();
        let fitted = IntegerRangePartitioner::new(11, Some(0), Some(100))
            .unwrap()
            .fit(&values)
            .unwrap();
        assert_eq!(fitted.partition_width(), 10);
        assert_eq!(fitted.partitions().first(), Some(&0));
        assert_eq!(fitted.partitions().last(), Some(&100));
        assert_eq!(fitted.frequencies().iter().sum::<usize>(), 101);
    }

    #[test]
    fn test_integer_constant_values_use_unit_step() {
        let fitted = IntegerRangePartitioner::default().fit(&[7; 5]).unwrap();
        assert_eq!(fitted.partition_width(), 1);
        assert_eq!(fitted.partitions(), &[7]);
        assert_eq!(fitted.frequencies(), &[5]);
    }

    #[test]
    fn test_category_keeps_most_frequent() {
        let values = ["b", "a", "c", "a", "b", "a", "d"];
        let fitted = CategoryPartitioner::new(2).unwrap().fit(&values).unwrap();
        assert!(fitted.is_categorical());
        assert_eq!(fitted.partitions(), &["a", "b"]);
        assert_eq!(fitted.frequencies(), &[3, 2]);
    }

    #[test]
    fn test_category_ties_keep_first_appearance() {
        let values = [3, 1, 2, 1, 2, 3];
        let fitted = CategoryPartitioner::default().fit(&values).unwrap();
        assert_eq!(fitted.partitions(), &[3, 1, 2]);
        assert_eq!(fitted.frequencies(), &[2, 2, 2]);
    }
}
