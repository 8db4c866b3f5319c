//! Loads precinct and zone polygons from `GeoJSON` feature collections.
//!
//! Collections are read whole, every polygon is projected into the planar
//! frame, and each feature is validated on its own. A bad feature is
//! logged and skipped; only an unreadable or unparsable document is an
//! error for the caller.

use std::collections::BTreeSet;
use std::path::Path;

use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde_json::Value;

use crate::{Precinct, PrecinctId, Projection, SpatialError, Zone};

/// Reads and parses a precinct collection from disk.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or is not `GeoJSON`.
pub fn load_precincts(
    path: &Path,
    id_property: &str,
    projection: Projection,
) -> Result<Vec<Precinct>, SpatialError> {
    let contents = std::fs::read_to_string(path)?;
    let precincts = parse_precincts(&contents, id_property, projection)?;
    log::info!(
        "Loaded {} precincts from {}",
        precincts.len(),
        path.display()
    );
    Ok(precincts)
}

/// Reads and parses a zone collection from disk.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or is not `GeoJSON`.
pub fn load_zones(
    path: &Path,
    id_property: &str,
    projection: Projection,
) -> Result<Vec<Zone>, SpatialError> {
    let contents = std::fs::read_to_string(path)?;
    let zones = parse_zones(&contents, id_property, projection)?;
    log::info!("Loaded {} zones from {}", zones.len(), path.display());
    Ok(zones)
}

/// Parses precincts from a `GeoJSON` string.
///
/// Features without an integer `id_property`, with non-polygonal geometry,
/// with a duplicate id, or that fail [`Precinct::new`] are skipped.
///
/// # Errors
///
/// Returns [`SpatialError`] if the document is not a feature collection.
pub fn parse_precincts(
    geojson_str: &str,
    id_property: &str,
    projection: Projection,
) -> Result<Vec<Precinct>, SpatialError> {
    let features = parse_features(geojson_str)?;
    let mut seen = BTreeSet::new();
    let mut precincts = Vec::with_capacity(features.len());

    for (index, feature) in features.iter().enumerate() {
        let result = property_as_id(feature, id_property, index).and_then(|id| {
            let polygon = feature_polygon(feature, projection)?;
            Precinct::new(id, polygon)
        });

        match result {
            Ok(precinct) if !seen.insert(precinct.id()) => {
                log::warn!("Skipping duplicate precinct {}", precinct.id());
            }
            Ok(precinct) => precincts.push(precinct),
            Err(e) => log::warn!("Skipping precinct feature {index}: {e}"),
        }
    }

    Ok(precincts)
}

/// Parses zones from a `GeoJSON` string.
///
/// The identifier is read as a string; numeric ids are stringified. All
/// feature properties are kept on the [`Zone`].
///
/// # Errors
///
/// Returns [`SpatialError`] if the document is not a feature collection.
pub fn parse_zones(
    geojson_str: &str,
    id_property: &str,
    projection: Projection,
) -> Result<Vec<Zone>, SpatialError> {
    let features = parse_features(geojson_str)?;
    let mut seen = BTreeSet::new();
    let mut zones = Vec::with_capacity(features.len());

    for (index, feature) in features.into_iter().enumerate() {
        let result = property_as_string(&feature, id_property, index).and_then(|id| {
            let polygon = feature_polygon(&feature, projection)?;
            let properties = feature.properties.clone().unwrap_or_default();
            Zone::new(id, polygon, properties)
        });

        match result {
            Ok(zone) if !seen.insert(zone.id().to_string()) => {
                log::warn!("Skipping duplicate zone {}", zone.id());
            }
            Ok(zone) => zones.push(zone),
            Err(e) => log::warn!("Skipping zone feature {index}: {e}"),
        }
    }

    Ok(zones)
}

fn parse_features(geojson_str: &str) -> Result<Vec<Feature>, SpatialError> {
    let geojson: GeoJson = geojson_str.parse()?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(SpatialError::UnsupportedGeometry {
            message: "expected a FeatureCollection, found a bare geometry".to_string(),
        }),
    }
}

/// Converts a feature's geometry to a planar [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_polygon(
    feature: &Feature,
    projection: Projection,
) -> Result<MultiPolygon<f64>, SpatialError> {
    let geometry = feature
        .geometry
        .clone()
        .ok_or_else(|| SpatialError::UnsupportedGeometry {
            message: "feature has no geometry".to_string(),
        })?;

    let geo_geom: geo::Geometry<f64> = geometry.try_into()?;
    let polygon = match geo_geom {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => {
            return Err(SpatialError::UnsupportedGeometry {
                message: "expected a Polygon or MultiPolygon".to_string(),
            });
        }
    };

    Ok(projection.project_polygon(&polygon))
}

#[allow(clippy::cast_possible_truncation)]
fn property_as_id(
    feature: &Feature,
    property: &str,
    index: usize,
) -> Result<PrecinctId, SpatialError> {
    let id = match feature.property(property) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    id.ok_or_else(|| SpatialError::MissingProperty {
        index,
        property: property.to_string(),
    })
}

fn property_as_string(
    feature: &Feature,
    property: &str,
    index: usize,
) -> Result<String, SpatialError> {
    let id = match feature.property(property) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    id.ok_or_else(|| SpatialError::MissingProperty {
        index,
        property: property.to_string(),
    })
}
