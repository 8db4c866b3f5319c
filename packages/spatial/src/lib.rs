#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Precinct and zone geometry for the coverage pipeline.
//!
//! Everything downstream works in a single planar frame measured in
//! metres. This crate owns getting the input polygons into that frame
//! ([`Projection`]), validating them into [`Precinct`] and [`Zone`] values
//! with their derived areas and centroids, loading them from `GeoJSON`
//! ([`source`]), and answering "which precinct contains this point" through
//! an R-tree ([`PrecinctIndex`]).

pub mod index;
pub mod projection;
pub mod region;
pub mod source;

pub use index::PrecinctIndex;
pub use projection::Projection;
pub use region::{Precinct, PrecinctId, Zone};

use thiserror::Error;

/// Errors that can occur while loading or validating geometry.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Reading an input file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be parsed as `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// A feature lacks the identifier property, or it has an unusable type.
    #[error("Feature {index} has no usable '{property}' property")]
    MissingProperty {
        /// Position of the feature in its collection.
        index: usize,
        /// Name of the property that was expected.
        property: String,
    },

    /// The document or feature geometry is not something we can use.
    #[error("Unsupported geometry: {message}")]
    UnsupportedGeometry {
        /// Description of what was found.
        message: String,
    },

    /// A polygon failed validation (empty, invalid, or zero area).
    #[error("Invalid geometry for {id}: {message}")]
    Geometry {
        /// Identifier of the offending precinct or zone.
        id: String,
        /// Description of what went wrong.
        message: String,
    },
}

impl From<geojson::Error> for SpatialError {
    fn from(value: geojson::Error) -> Self {
        Self::GeoJson(Box::new(value))
    }
}
