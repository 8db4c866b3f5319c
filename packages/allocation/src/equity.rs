//! Service equity metrics over the final zone assignment.
//!
//! Zones without an assigned facility carry no distance and are left out
//! of every distance statistic, but their area still counts toward the
//! coverage denominator: an unserved zone is uncovered.

use std::collections::BTreeMap;

use coverage_map_allocation_models::{
    CoveragePoint, EquityMetrics, PrecinctMetrics, ServiceCoverage, ZoneAssignment,
};

use crate::AllocationError;
use crate::assign::ServedFacility;

/// Value reported for a metric that is undefined on its input.
pub const DEGENERATE_SENTINEL: f64 = 0.0;

/// Discrete Gini coefficient of a distance distribution.
///
/// With distances sorted ascending into `d[1..n]`:
/// `sum((2i - n - 1) * d[i]) / (n * sum(d))`. Zero when every distance is
/// equal, approaching one as a few zones carry all the distance.
///
/// # Errors
///
/// Returns [`AllocationError::DegenerateMetric`] for an empty input or a
/// zero total distance, where the formula divides by zero.
#[allow(clippy::cast_precision_loss)]
pub fn gini_coefficient(distances: &[f64]) -> Result<f64, AllocationError> {
    if distances.is_empty() {
        return Err(AllocationError::DegenerateMetric {
            metric: "gini coefficient",
            reason: "no distances".to_string(),
        });
    }

    let mut sorted = distances.to_vec();
    sorted.sort_by(f64::total_cmp);

    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return Err(AllocationError::DegenerateMetric {
            metric: "gini coefficient",
            reason: "all distances are zero".to_string(),
        });
    }

    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, d)| (2.0f64.mul_add((i + 1) as f64, -n) - 1.0) * d)
        .sum();

    Ok(weighted / (n * total))
}

/// Share of total zone area whose zones are within `threshold_km` of
/// their facility.
///
/// # Errors
///
/// Returns [`AllocationError::DegenerateMetric`] if the total zone area is
/// zero.
pub fn coverage_ratio(zones: &[ZoneAssignment], threshold_km: f64) -> Result<f64, AllocationError> {
    let total: f64 = zones.iter().map(|z| z.area_sq_km).sum();
    if total <= 0.0 {
        return Err(AllocationError::DegenerateMetric {
            metric: "coverage ratio",
            reason: "total zone area is zero".to_string(),
        });
    }

    let covered: f64 = zones
        .iter()
        .filter(|z| z.distance_km.is_some_and(|d| d <= threshold_km))
        .map(|z| z.area_sq_km)
        .sum();

    Ok(covered / total)
}

/// Distance statistics per assigned precinct, ordered by precinct.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn precinct_metrics(zones: &[ZoneAssignment]) -> Vec<PrecinctMetrics> {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for zone in zones {
        if let (Some(precinct), Some(distance)) = (zone.assigned_precinct_id, zone.distance_km) {
            groups.entry(precinct).or_default().push(distance);
        }
    }

    groups
        .into_iter()
        .map(|(precinct, distances)| {
            let n = distances.len() as f64;
            let mean = distances.iter().sum::<f64>() / n;
            let std = (distances.len() > 1).then(|| {
                let ss: f64 = distances.iter().map(|d| (d - mean).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            });

            PrecinctMetrics {
                precinct,
                avg_distance_km: mean,
                max_distance_km: distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                min_distance_km: distances.iter().copied().fold(f64::INFINITY, f64::min),
                std_distance_km: std,
                zipcode_count: distances.len() as u64,
            }
        })
        .collect()
}

/// Coverage ratio at each threshold, sorted ascending by threshold.
#[must_use]
pub fn coverage_curve(zones: &[ZoneAssignment], thresholds_km: &[f64]) -> Vec<CoveragePoint> {
    let mut thresholds = thresholds_km.to_vec();
    thresholds.sort_by(f64::total_cmp);
    thresholds.dedup();

    thresholds
        .into_iter()
        .map(|threshold_km| CoveragePoint {
            threshold_km,
            coverage_ratio: coverage_ratio(zones, threshold_km).unwrap_or(DEGENERATE_SENTINEL),
        })
        .collect()
}

/// Headline totals: covered area and mean/max assigned distance.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn service_coverage(
    facilities: &[ServedFacility],
    zones: &[ZoneAssignment],
) -> ServiceCoverage {
    let distances: Vec<f64> = zones.iter().filter_map(|z| z.distance_km).collect();

    let (average, max) = if distances.is_empty() {
        (0.0, 0.0)
    } else {
        (
            distances.iter().sum::<f64>() / distances.len() as f64,
            distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };

    ServiceCoverage {
        total_area_covered_sq_km: facilities.iter().map(|f| f.service.service_area_sq_km).sum(),
        average_distance_km: average,
        max_distance_km: max,
    }
}

/// Computes the full equity snapshot for an assignment.
///
/// Degenerate metrics are logged and reported as [`DEGENERATE_SENTINEL`]
/// rather than failing the run.
#[must_use]
pub fn analyze(
    zones: &[ZoneAssignment],
    threshold_km: f64,
    curve_thresholds_km: &[f64],
) -> EquityMetrics {
    let distances: Vec<f64> = zones.iter().filter_map(|z| z.distance_km).collect();

    let gini = gini_coefficient(&distances).unwrap_or_else(|e| {
        log::warn!("{e}; reporting {DEGENERATE_SENTINEL}");
        DEGENERATE_SENTINEL
    });
    let coverage = coverage_ratio(zones, threshold_km).unwrap_or_else(|e| {
        log::warn!("{e}; reporting {DEGENERATE_SENTINEL}");
        DEGENERATE_SENTINEL
    });

    let metrics = EquityMetrics {
        gini_coefficient: gini,
        coverage_ratio: coverage,
        threshold_distance_km: threshold_km,
        precinct_metrics: precinct_metrics(zones),
        coverage_curve: coverage_curve(zones, curve_thresholds_km),
    };

    log::info!(
        "Gini coefficient {:.3}, coverage {:.1}% within {threshold_km} km across {} precincts",
        metrics.gini_coefficient,
        metrics.coverage_ratio * 100.0,
        metrics.precinct_metrics.len()
    );
    metrics
}
