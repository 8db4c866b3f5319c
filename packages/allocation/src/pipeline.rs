//! Runs the four allocation stages in order.
//!
//! Each stage needs its predecessor's complete output, so the stages are
//! strictly sequential; the parallelism lives inside them.

use std::time::Instant;

use coverage_map_allocation_models::{EquityMetrics, ModelSummary, ServiceCoverage, ZoneAssignment};
use coverage_map_spatial::{Precinct, PrecinctIndex, Zone};

use crate::AllocationError;
use crate::assign::{ServedFacility, assign};
use crate::config::PipelineConfig;
use crate::equity;
use crate::optimize::FacilityOptimizer;
use crate::progress::ProgressCallback;
use crate::synthesize::{DemandPoint, PointSynthesizer};

/// Label recorded in the model summary.
pub const MODEL_TYPE: &str = "Spatial Optimization and Service Equity Analysis";

/// Number of stages reported through the step progress callback.
pub const STAGE_COUNT: u64 = 4;

/// Every artifact a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub demand_points: Vec<DemandPoint>,
    pub facilities: Vec<ServedFacility>,
    /// One entry per input zone, in input order.
    pub zones: Vec<ZoneAssignment>,
    pub equity: EquityMetrics,
    pub service_coverage: ServiceCoverage,
}

impl PipelineOutput {
    /// Builds the run summary document.
    #[must_use]
    pub fn summary(&self, input_datasets: &[&str]) -> ModelSummary {
        ModelSummary {
            model_type: MODEL_TYPE.to_string(),
            input_datasets: input_datasets.iter().map(ToString::to_string).collect(),
            synthetic_points_generated: self.demand_points.len() as u64,
            optimal_stations_identified: self.facilities.len() as u64,
            equity_metrics: self.equity.clone(),
            service_coverage: self.service_coverage,
        }
    }
}

/// Runs synthesis, placement, assignment, and equity analysis.
///
/// `steps` advances once per stage; `stage` is handed to each stage for
/// its own fine-grained progress and is reset between stages.
///
/// # Errors
///
/// Returns [`AllocationError::NoPrecincts`] or [`AllocationError::NoZones`]
/// if either input is empty, and [`AllocationError::Config`] if the
/// configuration is invalid. Everything else degrades gracefully.
pub fn run(
    precincts: &[Precinct],
    zones: &[Zone],
    config: &PipelineConfig,
    steps: &dyn ProgressCallback,
    stage: &dyn ProgressCallback,
) -> Result<PipelineOutput, AllocationError> {
    config.validate()?;
    if precincts.is_empty() {
        return Err(AllocationError::NoPrecincts);
    }
    if zones.is_empty() {
        return Err(AllocationError::NoZones);
    }

    let start = Instant::now();
    steps.set_total(STAGE_COUNT);

    steps.set_message("Generating demand points".to_string());
    stage.set_message("Sampling precincts".to_string());
    let demand_points = PointSynthesizer::new(config.seed, config.max_attempts_per_point)
        .generate(precincts, config.point_budget, stage);
    steps.inc(1);

    steps.set_message("Placing facilities".to_string());
    stage.set_message("Clustering precincts".to_string());
    let facilities = FacilityOptimizer::new(config.kmeans.clone()).optimize(
        &demand_points,
        precincts,
        config.facilities_per_precinct,
        stage,
    );
    steps.inc(1);

    steps.set_message("Assigning zones".to_string());
    stage.set_message("Locating zones".to_string());
    stage.set_total(zones.len() as u64);
    let mut assignment = assign(zones, &facilities);
    let index = PrecinctIndex::build(precincts);
    for (record, zone) in assignment.zones.iter_mut().zip(zones) {
        record.home_precinct_id = index.lookup(&zone.centroid());
        stage.inc(1);
    }
    let crossing = assignment
        .zones
        .iter()
        .filter(|z| z.assigned_precinct_id.is_some() && z.assigned_precinct_id != z.home_precinct_id)
        .count();
    if crossing > 0 {
        log::info!("{crossing} zones are served from outside their own precinct");
    }
    steps.inc(1);

    steps.set_message("Computing equity metrics".to_string());
    let equity = equity::analyze(
        &assignment.zones,
        config.threshold_km,
        &config.coverage_thresholds_km,
    );
    let service_coverage = equity::service_coverage(&assignment.facilities, &assignment.zones);
    steps.inc(1);

    steps.finish(format!(
        "Placed {} facilities for {} zones in {:.1}s",
        assignment.facilities.len(),
        assignment.zones.len(),
        start.elapsed().as_secs_f64()
    ));

    Ok(PipelineOutput {
        demand_points,
        facilities: assignment.facilities,
        zones: assignment.zones,
        equity,
        service_coverage,
    })
}
