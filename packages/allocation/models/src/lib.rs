#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types produced by the facility allocation pipeline.
//!
//! These are the flat, geometry-free artifacts handed to whatever renders
//! or persists the results: per-facility service statistics, per-zone
//! assignments, and the equity metrics document. Field names are the
//! column names downstream consumers read, so they stay `snake_case`.

use serde::{Deserialize, Serialize};

/// Service statistics aggregated over the zones assigned to a facility.
///
/// A facility that receives no zones has every field zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAreaStats {
    /// Sum of assigned zone areas in square kilometres.
    pub service_area_sq_km: f64,
    /// Mean zone-to-facility distance in kilometres.
    pub avg_distance_km: f64,
    /// Number of zones assigned.
    pub zipcode_count: u64,
}

/// One proposed facility with its service statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    /// Facility identifier, unique across the run (e.g. `"S3_2"`).
    pub facility_id: String,
    /// Precinct whose demand points produced this facility.
    pub precinct_id: i64,
    /// Number of demand points whose nearest cluster center is this one.
    pub cluster_size: u64,
    #[serde(flatten)]
    pub service: ServiceAreaStats,
}

/// The derived assignment fields appended to a zone.
///
/// `assigned_precinct_id` is inherited from the winning facility, not from
/// the zone's own geography: a zone is counted under the precinct that
/// serves it. `home_precinct_id` is the precinct that geographically
/// contains the zone centroid, when one does, so the two can be compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAssignment {
    /// Zone identifier (zip code).
    pub zone_id: String,
    /// Zone area in square kilometres.
    pub area_sq_km: f64,
    /// Nearest facility, `None` only when no facility exists at all.
    pub nearest_facility_id: Option<String>,
    /// Planar distance from the zone centroid to that facility.
    pub distance_km: Option<f64>,
    /// Precinct of the nearest facility.
    pub assigned_precinct_id: Option<i64>,
    /// Precinct containing the zone centroid.
    pub home_precinct_id: Option<i64>,
}

/// Distance statistics for the zones served by one precinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecinctMetrics {
    /// Assigned precinct identifier.
    pub precinct: i64,
    pub avg_distance_km: f64,
    pub max_distance_km: f64,
    pub min_distance_km: f64,
    /// Sample standard deviation; `None` for a single zone.
    pub std_distance_km: Option<f64>,
    pub zipcode_count: u64,
}

/// Coverage ratio evaluated at one distance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoveragePoint {
    pub threshold_km: f64,
    pub coverage_ratio: f64,
}

/// Fairness summary of the zone-to-facility distance distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityMetrics {
    /// Gini coefficient of zone distances (0 = all zones equidistant).
    pub gini_coefficient: f64,
    /// Share of total zone area within `threshold_distance_km`.
    pub coverage_ratio: f64,
    pub threshold_distance_km: f64,
    /// One entry per assigned precinct, ordered by precinct.
    pub precinct_metrics: Vec<PrecinctMetrics>,
    /// Coverage ratio across a range of thresholds, ascending.
    #[serde(default)]
    pub coverage_curve: Vec<CoveragePoint>,
}

/// Headline service numbers for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServiceCoverage {
    /// Sum of every facility's service area.
    pub total_area_covered_sq_km: f64,
    /// Mean distance over assigned zones.
    pub average_distance_km: f64,
    /// Largest distance over assigned zones.
    pub max_distance_km: f64,
}

/// Top-level summary document of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_type: String,
    /// Names of the input collections the run consumed.
    pub input_datasets: Vec<String>,
    pub synthetic_points_generated: u64,
    pub optimal_stations_identified: u64,
    pub equity_metrics: EquityMetrics,
    pub service_coverage: ServiceCoverage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_record_flattens_service_stats() {
        let record = FacilityRecord {
            facility_id: "S1_1".to_string(),
            precinct_id: 1,
            cluster_size: 12,
            service: ServiceAreaStats {
                service_area_sq_km: 40.5,
                avg_distance_km: 3.25,
                zipcode_count: 4,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["facility_id"], "S1_1");
        assert_eq!(json["service_area_sq_km"], 40.5);
        assert_eq!(json["zipcode_count"], 4);
        assert!(json.get("service").is_none());
    }

    #[test]
    fn single_zone_precinct_has_null_std() {
        let metrics = PrecinctMetrics {
            precinct: 5,
            avg_distance_km: 2.0,
            max_distance_km: 2.0,
            min_distance_km: 2.0,
            std_distance_km: None,
            zipcode_count: 1,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert!(json["std_distance_km"].is_null());
    }
}
