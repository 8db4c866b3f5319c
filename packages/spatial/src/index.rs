//! In-memory R-tree over precinct polygons.
//!
//! Answers "which precinct geographically contains this point". The
//! pipeline uses it to record each zone's administrative precinct next to
//! the precinct it inherits from its assigned facility.

use geo::{Contains, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};

use crate::{Precinct, PrecinctId};

/// A precinct polygon stored in the R-tree with its metadata.
struct PrecinctEntry {
    id: PrecinctId,
    area_sq_km: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for PrecinctEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over a set of precincts.
pub struct PrecinctIndex {
    precincts: RTree<PrecinctEntry>,
}

impl PrecinctIndex {
    /// Bulk-loads the index from validated precincts.
    #[must_use]
    pub fn build(precincts: &[Precinct]) -> Self {
        let entries = precincts
            .iter()
            .map(|p| {
                let bounds = p.bounds();
                PrecinctEntry {
                    id: p.id(),
                    area_sq_km: p.area_sq_km(),
                    envelope: AABB::from_corners(
                        [bounds.min().x, bounds.min().y],
                        [bounds.max().x, bounds.max().y],
                    ),
                    polygon: p.polygon().clone(),
                }
            })
            .collect();

        Self {
            precincts: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed precincts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.precincts.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.precincts.size() == 0
    }

    /// Look up the precinct containing a planar point.
    ///
    /// Precinct layers should tile without overlap, but where they do
    /// overlap the smallest area wins.
    #[must_use]
    pub fn lookup(&self, point: &Point<f64>) -> Option<PrecinctId> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        let mut best: Option<&PrecinctEntry> = None;

        for entry in self.precincts.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.area_sq_km < current.area_sq_km => {
                        best = Some(entry);
                    }
                    _ => {}
                }
            }
        }

        best.map(|e| e.id)
    }
}
