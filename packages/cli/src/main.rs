#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line driver for facility placement and service equity analysis.
//!
//! Loads precinct and zone polygons, runs the allocation pipeline, and
//! writes the resulting layers and metrics into an output directory.
//!
//! Uses `indicatif-log-bridge` (via [`coverage_map_cli_utils::init_logger`])
//! so log lines and progress bars share the terminal cleanly.

mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use coverage_map_allocation::pipeline::STAGE_COUNT;
use coverage_map_allocation::{
    AllocationError, LogProgress, PipelineConfig, ProgressCallback, null_progress, run_pipeline,
};
use coverage_map_cli_utils::{IndicatifProgress, MultiProgress};
use coverage_map_spatial::Projection;
use coverage_map_spatial::source::{load_precincts, load_zones};

#[derive(Parser)]
#[command(
    name = "coverage_map",
    about = "Facility placement and service equity analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place facilities, assign zones, and write every output file
    Run(RunArgs),
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Args)]
struct RunArgs {
    /// Precinct polygons (`GeoJSON` feature collection)
    #[arg(long)]
    precincts: PathBuf,
    /// Zone polygons (`GeoJSON` feature collection)
    #[arg(long)]
    zones: PathBuf,
    /// Directory the output files are written to
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// TOML configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Total demand points across all precincts
    #[arg(long)]
    point_budget: Option<u64>,
    /// Facilities to place in each precinct
    #[arg(long)]
    facilities_per_precinct: Option<usize>,
    /// Coverage threshold in kilometres
    #[arg(long)]
    threshold_km: Option<f64>,
    /// Seed for demand point sampling
    #[arg(long)]
    seed: Option<u64>,
    /// Inputs are already planar metres rather than lon/lat
    #[arg(long)]
    planar: bool,
    /// Log stage progress instead of drawing progress bars
    #[arg(long)]
    no_progress: bool,
}

/// Loads the configuration file (if any) and applies flag overrides.
fn resolve_config(args: &RunArgs) -> Result<PipelineConfig, AllocationError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(budget) = args.point_budget {
        config.point_budget = budget;
    }
    if let Some(facilities) = args.facilities_per_precinct {
        config.facilities_per_precinct = facilities;
    }
    if let Some(threshold) = args.threshold_km {
        config.threshold_km = threshold;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.planar {
        config.projection = Projection::Identity;
    }

    config.validate()?;
    Ok(config)
}

fn dataset_name(path: &Path) -> String {
    path.file_stem().map_or_else(
        || path.display().to_string(),
        |stem| stem.to_string_lossy().into_owned(),
    )
}

fn run(args: &RunArgs, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let config = resolve_config(args)?;

    let precincts = load_precincts(
        &args.precincts,
        &config.precinct_id_property,
        config.projection,
    )?;
    let zones = load_zones(&args.zones, &config.zone_id_property, config.projection)?;

    let (steps, stage): (Arc<dyn ProgressCallback>, Arc<dyn ProgressCallback>) =
        if args.no_progress {
            (Arc::new(LogProgress::default()), null_progress())
        } else {
            (
                IndicatifProgress::steps_bar(multi, STAGE_COUNT),
                IndicatifProgress::stage_bar(multi),
            )
        };

    let output = run_pipeline(&precincts, &zones, &config, steps.as_ref(), stage.as_ref())?;
    stage.finish(format!(
        "{} demand points, {} facilities",
        output.demand_points.len(),
        output.facilities.len()
    ));

    let datasets = [dataset_name(&args.precincts), dataset_name(&args.zones)];
    let summary = output.summary(&datasets.iter().map(String::as_str).collect::<Vec<_>>());

    let written = report::write_all(
        &args.output_dir,
        &zones,
        &output,
        &summary,
        config.projection,
    )?;

    log::info!(
        "Wrote {} files to {} in {:.1}s (gini {:.3}, {:.1}% of area within {} km)",
        written.len(),
        args.output_dir.display(),
        start.elapsed().as_secs_f64(),
        output.equity.gini_coefficient,
        output.equity.coverage_ratio * 100.0,
        output.equity.threshold_distance_km
    );

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = coverage_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(&args, &multi)?,
        Commands::DefaultConfig => {
            print!("{}", toml::to_string_pretty(&PipelineConfig::default())?);
        }
    }

    Ok(())
}
