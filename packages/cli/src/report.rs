//! Writes a finished run to disk.
//!
//! Geometry layers go out as `GeoJSON` in lon/lat (the planar frame is
//! inverted on the way out); metrics go out as pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use coverage_map_allocation::PipelineOutput;
use coverage_map_allocation_models::ModelSummary;
use coverage_map_spatial::{Projection, Zone};
use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde::Serialize;

pub const PATROL_POINTS: &str = "patrol_points.geojson";
pub const OPTIMAL_STATIONS: &str = "optimal_stations.geojson";
pub const STATIONS_WITH_METRICS: &str = "stations_with_metrics.geojson";
pub const ZONES_WITH_SERVICE: &str = "zipcodes_with_service.geojson";
pub const EQUITY_METRICS: &str = "equity_metrics.json";
pub const MODEL_SUMMARY: &str = "model_summary.json";

fn feature(geometry: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn point_value(projection: Projection, location: Point<f64>) -> geojson::Value {
    geojson::Value::from(&projection.unproject_point(location))
}

/// Records serialize to JSON objects; anything else has no properties.
fn into_object(value: JsonValue) -> JsonObject {
    match value {
        JsonValue::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Demand points, one feature each.
#[must_use]
pub fn patrol_points(output: &PipelineOutput, projection: Projection) -> FeatureCollection {
    collection(
        output
            .demand_points
            .iter()
            .map(|point| {
                let mut properties = JsonObject::new();
                properties.insert("point_id".to_string(), point.id.clone().into());
                properties.insert("precinct_id".to_string(), point.precinct_id.into());
                feature(point_value(projection, point.location), properties)
            })
            .collect(),
    )
}

/// Facility locations with their cluster sizes.
#[must_use]
pub fn optimal_stations(output: &PipelineOutput, projection: Projection) -> FeatureCollection {
    collection(
        output
            .facilities
            .iter()
            .map(|served| {
                let facility = &served.facility;
                let mut properties = JsonObject::new();
                properties.insert("facility_id".to_string(), facility.id.clone().into());
                properties.insert("precinct_id".to_string(), facility.precinct_id.into());
                properties.insert("cluster_size".to_string(), facility.cluster_size.into());
                feature(point_value(projection, facility.location), properties)
            })
            .collect(),
    )
}

/// Facility locations with their full service statistics.
///
/// # Errors
///
/// Returns an error if a record fails to serialize.
pub fn stations_with_metrics(
    output: &PipelineOutput,
    projection: Projection,
) -> Result<FeatureCollection, serde_json::Error> {
    let features = output
        .facilities
        .iter()
        .map(|served| {
            let properties = into_object(serde_json::to_value(served.record())?);
            Ok(feature(
                point_value(projection, served.facility.location),
                properties,
            ))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    Ok(collection(features))
}

/// Zone polygons with their input properties plus the assignment.
///
/// Assignment fields overwrite same-named input properties. The zone id
/// is already among the input properties, so it is not repeated.
///
/// # Errors
///
/// Returns an error if an assignment fails to serialize.
pub fn zones_with_service(
    zones: &[Zone],
    output: &PipelineOutput,
    projection: Projection,
) -> Result<FeatureCollection, serde_json::Error> {
    let features = zones
        .iter()
        .zip(&output.zones)
        .map(|(zone, assignment)| {
            let mut properties = zone.properties().clone();
            let mut fields = into_object(serde_json::to_value(assignment)?);
            fields.remove("zone_id");
            properties.extend(fields);

            let polygon = projection.unproject_polygon(zone.polygon());
            Ok(feature(geojson::Value::from(&polygon), properties))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    Ok(collection(features))
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(&path, contents)?;
    log::debug!("Wrote {}", path.display());
    Ok(path)
}

/// Writes all six output files into `dir`, creating it if needed.
///
/// Returns the written paths in a fixed order.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub fn write_all(
    dir: &Path,
    zones: &[Zone],
    output: &PipelineOutput,
    summary: &ModelSummary,
    projection: Projection,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;

    Ok(vec![
        write_json(dir, PATROL_POINTS, &patrol_points(output, projection))?,
        write_json(dir, OPTIMAL_STATIONS, &optimal_stations(output, projection))?,
        write_json(
            dir,
            STATIONS_WITH_METRICS,
            &stations_with_metrics(output, projection)?,
        )?,
        write_json(
            dir,
            ZONES_WITH_SERVICE,
            &zones_with_service(zones, output, projection)?,
        )?,
        write_json(dir, EQUITY_METRICS, &output.equity)?,
        write_json(dir, MODEL_SUMMARY, summary)?,
    ])
}
