//! Facility placement by per-precinct k-means.
//!
//! Each precinct is clustered on its own: its demand points are
//! standardized, split into `facilities_per_precinct` clusters, and the
//! cluster centers (mapped back to planar coordinates) become facilities.
//! Precincts share nothing, so they run as independent `rayon` tasks and
//! the per-precinct facility lists are concatenated in precinct order.

use std::collections::BTreeMap;

use coverage_map_spatial::{Precinct, PrecinctId};
use geo::Point;
use rayon::prelude::*;

use crate::AllocationError;
use crate::config::KMeansConfig;
use crate::kmeans::{self, Coord2, Standardizer};
use crate::progress::ProgressCallback;
use crate::synthesize::{DemandPoint, precinct_rng};

/// A proposed service location at a cluster center.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    /// Identifier unique across the run (e.g. `"S3_2"`).
    pub id: String,
    /// Precinct whose demand points produced this facility.
    pub precinct_id: PrecinctId,
    /// Planar location.
    pub location: Point<f64>,
    /// Demand points whose nearest center is this facility.
    pub cluster_size: u64,
}

/// Places facilities by clustering demand points.
pub struct FacilityOptimizer {
    config: KMeansConfig,
}

impl FacilityOptimizer {
    #[must_use]
    pub const fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    /// Places `per_precinct` facilities in every precinct that has at
    /// least that many demand points.
    ///
    /// Precincts with too few points are logged and skipped; their zones
    /// fall back to the nearest facility of any precinct at assignment
    /// time. Points whose precinct is not in `precincts` are ignored.
    pub fn optimize(
        &self,
        points: &[DemandPoint],
        precincts: &[Precinct],
        per_precinct: usize,
        progress: &dyn ProgressCallback,
    ) -> Vec<Facility> {
        let mut grouped: BTreeMap<PrecinctId, Vec<Coord2>> = BTreeMap::new();
        for point in points {
            grouped
                .entry(point.precinct_id)
                .or_default()
                .push([point.location.x(), point.location.y()]);
        }

        progress.set_total(precincts.len() as u64);

        let results: Vec<Result<Vec<Facility>, AllocationError>> = precincts
            .par_iter()
            .map(|precinct| {
                let coords = grouped.get(&precinct.id()).map_or(&[][..], Vec::as_slice);
                let result = self.place(precinct.id(), coords, per_precinct);
                progress.inc(1);
                result
            })
            .collect();

        let mut facilities = Vec::new();
        let mut eligible = 0usize;
        for result in results {
            match result {
                Ok(placed) => {
                    eligible += 1;
                    facilities.extend(placed);
                }
                Err(e) => log::warn!("Skipping facility placement: {e}"),
            }
        }

        log::info!(
            "Placed {} facilities in {eligible}/{} precincts",
            facilities.len(),
            precincts.len()
        );
        facilities
    }

    /// Clusters one precinct's points into exactly `k` facilities.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::InsufficientData`] if there are fewer
    /// than `k` points (or `k` is zero).
    pub fn place(
        &self,
        precinct_id: PrecinctId,
        coords: &[Coord2],
        k: usize,
    ) -> Result<Vec<Facility>, AllocationError> {
        let insufficient = || AllocationError::InsufficientData {
            precinct: precinct_id,
            points: coords.len(),
            facilities: k,
        };

        if k == 0 || coords.len() < k {
            return Err(insufficient());
        }

        let scaler = Standardizer::fit(coords);
        let scaled: Vec<Coord2> = coords.iter().map(|&c| scaler.transform(c)).collect();

        let mut rng = precinct_rng(self.config.seed, precinct_id);
        let clustering =
            kmeans::fit(&scaled, k, &self.config, &mut rng).ok_or_else(insufficient)?;

        log::debug!(
            "Precinct {precinct_id}: {k} clusters over {} points, inertia {:.4} after {} iterations",
            coords.len(),
            clustering.inertia,
            clustering.iterations
        );

        let sizes = clustering.cluster_sizes();
        Ok(clustering
            .centers
            .iter()
            .zip(sizes)
            .enumerate()
            .map(|(i, (&center, cluster_size))| {
                let [x, y] = scaler.inverse_transform(center);
                Facility {
                    id: format!("S{precinct_id}_{}", i + 1),
                    precinct_id,
                    location: Point::new(x, y),
                    cluster_size,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};

    use super::*;
    use crate::progress::NullProgress;
    use crate::synthesize::PointSynthesizer;

    fn rect(id: PrecinctId, x0: f64, y0: f64, x1: f64, y1: f64) -> Precinct {
        let polygon = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )]);
        Precinct::new(id, polygon).unwrap()
    }

    fn points_for(precinct: PrecinctId, coords: &[(f64, f64)]) -> Vec<DemandPoint> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| DemandPoint {
                id: format!("P{precinct}_{}", i + 1),
                precinct_id: precinct,
                location: Point::new(x, y),
            })
            .collect()
    }

    #[test]
    fn places_exactly_k_per_eligible_precinct() {
        let precincts = vec![
            rect(1, 0.0, 0.0, 10_000.0, 10_000.0),
            rect(2, 10_000.0, 0.0, 20_000.0, 10_000.0),
        ];
        let points = PointSynthesizer::new(42, 1_000).generate(&precincts, 60, &NullProgress);
        let facilities = FacilityOptimizer::new(KMeansConfig::default()).optimize(
            &points,
            &precincts,
            3,
            &NullProgress,
        );

        assert_eq!(facilities.len(), 6);
        for precinct in &precincts {
            let owned: Vec<&Facility> = facilities
                .iter()
                .filter(|f| f.precinct_id == precinct.id())
                .collect();
            assert_eq!(owned.len(), 3);
            let clustered: u64 = owned.iter().map(|f| f.cluster_size).sum();
            let sampled = points
                .iter()
                .filter(|p| p.precinct_id == precinct.id())
                .count();
            assert_eq!(clustered, sampled as u64);
        }
        let ids: Vec<&str> = facilities.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["S1_1", "S1_2", "S1_3", "S2_1", "S2_2", "S2_3"]);
    }

    #[test]
    fn skips_precinct_with_too_few_points() {
        let precincts = vec![
            rect(1, 0.0, 0.0, 1_000.0, 1_000.0),
            rect(2, 1_000.0, 0.0, 2_000.0, 1_000.0),
        ];
        let mut points = points_for(1, &[(100.0, 100.0), (900.0, 900.0)]);
        points.extend(points_for(
            2,
            &[(1_100.0, 100.0), (1_500.0, 500.0), (1_900.0, 900.0), (1_200.0, 800.0)],
        ));

        let facilities = FacilityOptimizer::new(KMeansConfig::default()).optimize(
            &points,
            &precincts,
            3,
            &NullProgress,
        );
        assert_eq!(facilities.len(), 3);
        assert!(facilities.iter().all(|f| f.precinct_id == 2));
    }

    #[test]
    fn place_reports_insufficient_data() {
        let optimizer = FacilityOptimizer::new(KMeansConfig::default());
        let err = optimizer.place(8, &[[0.0, 0.0]], 2).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InsufficientData {
                precinct: 8,
                points: 1,
                facilities: 2
            }
        ));
    }

    #[test]
    fn centers_return_to_planar_scale() {
        // Two tight groups far apart along a single line.
        let coords = vec![
            [0.0, 500.0],
            [10.0, 500.0],
            [0.0, 500.0],
            [100_000.0, 500.0],
            [100_010.0, 500.0],
            [100_000.0, 500.0],
        ];
        let facilities = FacilityOptimizer::new(KMeansConfig::default())
            .place(5, &coords, 2)
            .unwrap();
        let mut xs: Vec<f64> = facilities.iter().map(|f| f.location.x()).collect();
        xs.sort_by(f64::total_cmp);
        assert!((xs[0] - 10.0 / 3.0).abs() < 1e-6, "{xs:?}");
        assert!((xs[1] - (100_000.0 + 10.0 / 3.0)).abs() < 1e-6, "{xs:?}");
        assert!(facilities.iter().all(|f| f.cluster_size == 3));
        assert!(facilities.iter().all(|f| (f.location.y() - 500.0).abs() < 1e-9));
    }

    #[test]
    fn placement_is_reproducible() {
        let coords: Vec<Coord2> = (0..40)
            .map(|i| {
                let t = f64::from(i);
                [t.mul_add(37.0, 11.0) % 1_000.0, t.mul_add(53.0, 7.0) % 1_000.0]
            })
            .collect();
        let optimizer = FacilityOptimizer::new(KMeansConfig::default());
        assert_eq!(
            optimizer.place(1, &coords, 4).unwrap(),
            optimizer.place(1, &coords, 4).unwrap()
        );
    }
}
