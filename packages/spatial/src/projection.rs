//! Transforms between geographic coordinates and the planar frame.

use std::f64::consts::FRAC_PI_4;

use geo::{Coord, MapCoords, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// Semi-major axis of the WGS84 ellipsoid, used as the sphere radius by
/// spherical (web) mercator.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Metres per kilometre.
pub const METRES_PER_KM: f64 = 1_000.0;

/// Square metres per square kilometre.
pub const SQ_METRES_PER_SQ_KM: f64 = 1_000_000.0;

/// How input coordinates map onto the planar frame (metres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Input is lon/lat degrees; project with spherical mercator
    /// (EPSG:3857).
    #[default]
    WebMercator,
    /// Input is already planar and measured in metres.
    Identity,
}

impl Projection {
    /// Projects a single coordinate into the planar frame.
    #[must_use]
    pub fn forward(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::WebMercator => Coord {
                x: EARTH_RADIUS_M * coord.x.to_radians(),
                y: EARTH_RADIUS_M * (FRAC_PI_4 + coord.y.to_radians() / 2.0).tan().ln(),
            },
            Self::Identity => coord,
        }
    }

    /// Maps a planar coordinate back to the input frame.
    #[must_use]
    pub fn inverse(self, coord: Coord<f64>) -> Coord<f64> {
        match self {
            Self::WebMercator => Coord {
                x: (coord.x / EARTH_RADIUS_M).to_degrees(),
                y: 2.0f64
                    .mul_add((coord.y / EARTH_RADIUS_M).exp().atan(), -2.0 * FRAC_PI_4)
                    .to_degrees(),
            },
            Self::Identity => coord,
        }
    }

    /// Projects every vertex of a multipolygon.
    #[must_use]
    pub fn project_polygon(self, polygon: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        polygon.map_coords(|c| self.forward(c))
    }

    /// Maps every vertex of a planar multipolygon back to the input frame.
    #[must_use]
    pub fn unproject_polygon(self, polygon: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        polygon.map_coords(|c| self.inverse(c))
    }

    /// Maps a planar point back to the input frame.
    #[must_use]
    pub fn unproject_point(self, point: Point<f64>) -> Point<f64> {
        Point::from(self.inverse(point.0))
    }
}
