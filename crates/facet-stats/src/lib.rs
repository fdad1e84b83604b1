//! Numeric utilities shared by the inspection crates.
//!
//! # Modules
//!
//! - [`descriptive`]: means, variances and covariances of `f64` samples
//! - [`percentiles`]: interpolated quantiles and precomputed percentile sets
//! - [`partition`]: range and category partitioning of observed feature values
//!
//! # Examples
//!
//! ## Moments
//!
//! ```
//! use facet_stats::descriptive::{covariance, variance};
//!
//! let x = [1.0, 2.0, 3.0, 4.0];
//! let y = [2.0, 4.0, 6.0, 8.0];
//! assert_eq!(variance(&x), Some(1.25));
//! assert_eq!(covariance(&x, &y), Some(2.5));
//! ```
//!
//! ## Percentiles
//!
//! ```
//! use facet_stats::percentiles::Percentiles;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let percentiles = Percentiles::new(&values, &[50.0, 100.0]);
//! assert_eq!(percentiles.get(50.0), Some(3.0));
//! assert_eq!(percentiles.get(100.0), Some(5.0));
//! ```

pub mod descriptive;
pub mod partition;
pub mod percentiles;
