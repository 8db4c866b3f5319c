//! Pipeline configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the standard run: 200 demand points, three facilities per precinct, and
//! a 10 km coverage threshold.

use std::path::Path;

use coverage_map_spatial::Projection;
use serde::{Deserialize, Serialize};

use crate::AllocationError;

/// Tunables for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Total demand points to spread across all precincts.
    pub point_budget: u64,
    /// Facilities placed in each precinct with enough points.
    pub facilities_per_precinct: usize,
    /// Distance threshold for the headline coverage ratio.
    pub threshold_km: f64,
    /// Thresholds for the coverage curve.
    pub coverage_thresholds_km: Vec<f64>,
    /// Seed for demand point sampling.
    pub seed: u64,
    /// Rejection sampling draws allowed per requested point.
    pub max_attempts_per_point: u64,
    /// How input coordinates map to the planar frame.
    pub projection: Projection,
    /// Precinct feature property holding the integer id.
    pub precinct_id_property: String,
    /// Zone feature property holding the zone id.
    pub zone_id_property: String,
    pub kmeans: KMeansConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            point_budget: 200,
            facilities_per_precinct: 3,
            threshold_km: 10.0,
            coverage_thresholds_km: vec![2.0, 5.0, 10.0, 15.0, 20.0],
            seed: 42,
            max_attempts_per_point: 1_000,
            projection: Projection::WebMercator,
            precinct_id_property: "PCT_NUM".to_string(),
            zone_id_property: "ZIP".to_string(),
            kmeans: KMeansConfig::default(),
        }
    }
}

/// K-means clustering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KMeansConfig {
    /// Seed for k-means++ initialization.
    pub seed: u64,
    /// Independent initializations; the lowest-inertia result is kept.
    pub n_init: usize,
    /// Maximum Lloyd iterations per initialization.
    pub max_iter: usize,
    /// Convergence tolerance on total squared center movement, relative
    /// to the mean per-axis variance of the data.
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Config`] if the TOML is malformed or a
    /// value fails [`PipelineConfig::validate`].
    pub fn from_toml_str(toml_str: &str) -> Result<Self, AllocationError> {
        let config: Self = toml::de::from_str(toml_str).map_err(|e| AllocationError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, AllocationError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), AllocationError> {
        let fail = |message: String| -> Result<(), AllocationError> {
            Err(AllocationError::Config { message })
        };

        if self.point_budget == 0 {
            return fail("point_budget must be positive".to_string());
        }
        if self.facilities_per_precinct == 0 {
            return fail("facilities_per_precinct must be positive".to_string());
        }
        if self.max_attempts_per_point == 0 {
            return fail("max_attempts_per_point must be positive".to_string());
        }
        if !is_valid_threshold(self.threshold_km) {
            return fail(format!(
                "threshold_km must be non-negative, got {}",
                self.threshold_km
            ));
        }
        if let Some(bad) = self
            .coverage_thresholds_km
            .iter()
            .find(|t| !is_valid_threshold(**t))
        {
            return fail(format!(
                "coverage_thresholds_km must be non-negative, got {bad}"
            ));
        }
        if self.kmeans.n_init == 0 || self.kmeans.max_iter == 0 {
            return fail("kmeans.n_init and kmeans.max_iter must be positive".to_string());
        }
        if !(self.kmeans.tolerance >= 0.0 && self.kmeans.tolerance.is_finite()) {
            return fail(format!(
                "kmeans.tolerance must be non-negative, got {}",
                self.kmeans.tolerance
            ));
        }

        Ok(())
    }
}

fn is_valid_threshold(km: f64) -> bool {
    km >= 0.0 && !km.is_nan()
}
