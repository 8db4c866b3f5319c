#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Facility allocation and service equity analysis.
//!
//! A four-stage batch pipeline over precinct and zone geometry:
//!
//! 1. [`synthesize`] scatters demand points inside each precinct,
//!    area-proportionally, by rejection sampling.
//! 2. [`optimize`] clusters each precinct's points with k-means and turns
//!    the cluster centers into facilities.
//! 3. [`assign`] gives every zone its nearest facility and aggregates
//!    per-facility service statistics.
//! 4. [`equity`] measures how fairly the resulting distances are spread
//!    (Gini coefficient, coverage ratio, per-precinct statistics).
//!
//! [`pipeline::run`] chains the stages. Each stage is a pure function of
//! its inputs and the configured seeds, so identical inputs reproduce
//! identical output regardless of how work is spread across threads.

pub mod assign;
pub mod config;
pub mod equity;
pub mod kmeans;
pub mod optimize;
pub mod pipeline;
pub mod progress;
pub mod synthesize;

pub use assign::{Assignment, ServedFacility, assign};
pub use config::{KMeansConfig, PipelineConfig};
pub use optimize::{Facility, FacilityOptimizer};
pub use pipeline::{PipelineOutput, run as run_pipeline};
pub use progress::{LogProgress, NullProgress, ProgressCallback, null_progress};
pub use synthesize::{DemandPoint, PointSynthesizer};

use coverage_map_spatial::{PrecinctId, SpatialError};
use thiserror::Error;

/// Errors that can occur while running the allocation pipeline.
///
/// Only [`AllocationError::NoPrecincts`], [`AllocationError::NoZones`], and
/// configuration problems abort a run. The per-precinct and per-metric
/// variants are logged and degrade the result instead.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Rejection sampling ran out of attempts before filling a precinct's
    /// quota.
    #[error(
        "Precinct {precinct}: only {accepted}/{requested} points accepted after {attempts} attempts"
    )]
    Generation {
        precinct: PrecinctId,
        requested: usize,
        accepted: usize,
        attempts: u64,
    },

    /// A precinct has fewer demand points than facilities requested.
    #[error("Precinct {precinct}: {points} points is too few for {facilities} facilities")]
    InsufficientData {
        precinct: PrecinctId,
        points: usize,
        facilities: usize,
    },

    /// A metric is undefined for the given input.
    #[error("Degenerate {metric}: {reason}")]
    DegenerateMetric {
        metric: &'static str,
        reason: String,
    },

    /// No valid precincts were supplied.
    #[error("No valid precincts to allocate facilities in")]
    NoPrecincts,

    /// No valid zones were supplied.
    #[error("No valid zones to assign")]
    NoZones,

    /// A configuration value is out of range or unparsable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Reading a configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Loading geometry failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),
}
