//! Synergy, redundancy and independence of features across cross-validation folds
//!
//! This crate takes per-observation attribution scores of a fitted model (main
//! effects and pairwise interactions) and decomposes each feature's importance
//! into the part it shares with other features and the part it contributes on
//! its own.
//!
//! # Overview
//!
//! 1. **Decompose** ([`decompose::PairwiseDecomposer`]): one fold's scores become
//!    synergy, redundancy and independence matrices plus total importance
//! 2. **Aggregate** ([`aggregate::FoldAggregator`]): fold results are averaged over
//!    the canonical feature set, with optional bootstrap confidence bounds
//! 3. **Rank** ([`rank::ImportanceRanker`]): features are put in a strict total
//!    order by importance
//! 4. **Cluster** ([`cluster::RedundancyClusterer`]): features are merged into a
//!    dendrogram by redundancy
//!
//! [`pipeline::Inspector`] runs all four steps over a set of folds, decomposing
//! the folds in parallel.
//!
//! Folds need not see the same features. A cell of an aggregated matrix that no
//! fold measured is "no data" ([`score_matrix::ScoreMatrix::get`] returns
//! `None`); it is never read as zero.
//!
//! # Examples
//!
//! ```
//! use facet_inspection::{
//!     config::InspectionConfig,
//!     feature_set::FeatureSet,
//!     observation::{Interactions, MainEffects},
//!     pipeline::{FoldInput, Inspector},
//! };
//!
//! // "speed" and "velocity" measure the same thing, "color" is unrelated
//! let fold = |offset: f64| FoldInput {
//!     features: FeatureSet::new(["speed", "velocity", "color"]).unwrap(),
//!     main_effects: MainEffects::from_rows(&[
//!         vec![1.0 + offset, 1.0 + offset, 0.5],
//!         vec![-1.0, -1.0, -0.5],
//!         vec![2.0, 2.0, -0.5],
//!         vec![-2.0 - offset, -2.0 - offset, 0.5],
//!     ])
//!     .unwrap(),
//!     interactions: Interactions::zeros(4, 3),
//! };
//!
//! let config = InspectionConfig {
//!     n_bootstrap: 100,
//!     seed: 1,
//!     ..InspectionConfig::default()
//! };
//! let inspection = Inspector::new(config)?.run(&[fold(0.0), fold(0.5)])?;
//!
//! let redundancy = inspection.result.redundancy().mean();
//! assert!(redundancy.get_by_name("speed", "velocity").unwrap() > 0.99);
//!
//! let first = inspection.linkage.merges()[0];
//! assert_eq!((first.left, first.right), (0, 1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod cluster;
pub mod config;
pub mod decompose;
pub mod feature_set;
pub mod observation;
pub mod pipeline;
pub mod rank;
pub mod score_matrix;
