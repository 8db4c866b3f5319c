//! Validated precinct and zone geometry in the planar frame.

use geo::{Area, BoundingRect, Centroid, Contains, MultiPolygon, Point, Rect, Validation};
use serde_json::{Map, Value};

use crate::SpatialError;
use crate::projection::SQ_METRES_PER_SQ_KM;

/// Numeric precinct identifier (e.g. the constable precinct number).
pub type PrecinctId = i64;

/// A top-level service region that owns demand points and facilities.
///
/// Only constructible through [`Precinct::new`], so every value has a
/// valid polygon, a bounding box, and a positive area.
#[derive(Debug, Clone)]
pub struct Precinct {
    id: PrecinctId,
    polygon: MultiPolygon<f64>,
    bounds: Rect<f64>,
    area_sq_km: f64,
}

impl Precinct {
    /// Validates a planar polygon and derives its area.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Geometry`] if the polygon is empty, fails
    /// validity checks (e.g. self-intersects), or has zero area.
    pub fn new(id: PrecinctId, polygon: MultiPolygon<f64>) -> Result<Self, SpatialError> {
        let invalid = |message: &str| SpatialError::Geometry {
            id: format!("precinct {id}"),
            message: message.to_string(),
        };

        let bounds = polygon
            .bounding_rect()
            .ok_or_else(|| invalid("empty polygon"))?;

        if !polygon.is_valid() {
            return Err(invalid("polygon is not valid"));
        }

        let area_sq_km = polygon.unsigned_area() / SQ_METRES_PER_SQ_KM;
        if !(area_sq_km > 0.0 && area_sq_km.is_finite()) {
            return Err(invalid("polygon has no area"));
        }

        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(invalid("degenerate bounding box"));
        }

        Ok(Self {
            id,
            polygon,
            bounds,
            area_sq_km,
        })
    }

    #[must_use]
    pub const fn id(&self) -> PrecinctId {
        self.id
    }

    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// Axis-aligned bounding box of the polygon.
    #[must_use]
    pub const fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// Planar area in square kilometres.
    #[must_use]
    pub const fn area_sq_km(&self) -> f64 {
        self.area_sq_km
    }

    /// Strict containment: points on the boundary are outside.
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.polygon.contains(point)
    }
}

/// A fine-grained sub-region (zip code) served by exactly one facility.
#[derive(Debug, Clone)]
pub struct Zone {
    id: String,
    polygon: MultiPolygon<f64>,
    area_sq_km: f64,
    centroid: Point<f64>,
    properties: Map<String, Value>,
}

impl Zone {
    /// Derives area and centroid from a planar polygon.
    ///
    /// `properties` are the source attributes carried through to the
    /// output records untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Geometry`] if the polygon has no centroid
    /// (it is empty).
    pub fn new(
        id: impl Into<String>,
        polygon: MultiPolygon<f64>,
        properties: Map<String, Value>,
    ) -> Result<Self, SpatialError> {
        let id = id.into();
        let centroid = polygon.centroid().ok_or_else(|| SpatialError::Geometry {
            id: format!("zone {id}"),
            message: "empty polygon".to_string(),
        })?;
        let area_sq_km = polygon.unsigned_area() / SQ_METRES_PER_SQ_KM;

        Ok(Self {
            id,
            polygon,
            area_sq_km,
            centroid,
            properties,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// Planar area in square kilometres.
    #[must_use]
    pub const fn area_sq_km(&self) -> f64 {
        self.area_sq_km
    }

    /// Planar centroid, the point distances are measured from.
    #[must_use]
    pub const fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    /// Source attributes as read from the input feature.
    #[must_use]
    pub const fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};

    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + side, y0),
                (x0 + side, y0 + side),
                (x0, y0 + side),
                (x0, y0),
            ]),
            vec![],
        )])
    }

    #[test]
    fn precinct_area_is_in_square_kilometres() {
        let p = Precinct::new(1, square(0.0, 0.0, 2_000.0)).unwrap();
        assert!((p.area_sq_km() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_empty_precinct() {
        let err = Precinct::new(7, MultiPolygon(vec![])).unwrap_err();
        assert!(matches!(err, SpatialError::Geometry { .. }));
    }

    #[test]
    fn rejects_self_intersecting_precinct() {
        let bowtie = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (10.0, 10.0),
                (10.0, 0.0),
                (0.0, 10.0),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        assert!(Precinct::new(3, bowtie).is_err());
    }

    #[test]
    fn boundary_point_is_not_contained() {
        let p = Precinct::new(1, square(0.0, 0.0, 10.0)).unwrap();
        assert!(p.contains(&Point::new(5.0, 5.0)));
        assert!(!p.contains(&Point::new(0.0, 5.0)));
    }

    #[test]
    fn zone_centroid_and_area() {
        let z = Zone::new("77002", square(1_000.0, 1_000.0, 1_000.0), Map::new()).unwrap();
        assert_eq!(z.id(), "77002");
        assert!((z.area_sq_km() - 1.0).abs() < 1e-9);
        assert!((z.centroid().x() - 1_500.0).abs() < 1e-9);
        assert!((z.centroid().y() - 1_500.0).abs() < 1e-9);
    }
}
