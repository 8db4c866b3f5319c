//! Synthetic demand points, scattered inside precincts by rejection
//! sampling.
//!
//! Each precinct receives a share of the point budget proportional to its
//! area, never fewer than [`MIN_POINTS_PER_PRECINCT`] so that even the
//! smallest precinct has something to cluster. Points are drawn uniformly
//! from the precinct's bounding box and kept only if they land strictly
//! inside the polygon.

use coverage_map_spatial::{Precinct, PrecinctId};
use geo::Point;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::AllocationError;
use crate::progress::ProgressCallback;

/// Floor on the number of points any precinct receives.
pub const MIN_POINTS_PER_PRECINCT: usize = 5;

/// A synthetic sample of spatial demand inside one precinct.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandPoint {
    /// Identifier unique within the precinct (e.g. `"P3_17"`).
    pub id: String,
    pub precinct_id: PrecinctId,
    /// Planar location.
    pub location: Point<f64>,
}

/// Derives an independent RNG for one precinct.
///
/// Every precinct draws from its own ChaCha stream of the same seed, so
/// the result does not depend on which worker thread samples it or in
/// what order.
pub(crate) fn precinct_rng(seed: u64, precinct: PrecinctId) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(u64::from_ne_bytes(precinct.to_ne_bytes()));
    rng
}

/// Splits `budget` across precincts in proportion to area.
///
/// Returns one count per precinct, in input order. Each count is
/// `max(5, round(budget * area / total_area))`, so the counts can sum to
/// more than the budget.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn allocate_counts(precincts: &[Precinct], budget: u64) -> Vec<usize> {
    let total_area: f64 = precincts.iter().map(Precinct::area_sq_km).sum();

    precincts
        .iter()
        .map(|p| {
            let share = if total_area > 0.0 {
                (budget as f64 * p.area_sq_km() / total_area).round() as usize
            } else {
                0
            };
            share.max(MIN_POINTS_PER_PRECINCT)
        })
        .collect()
}

/// Generates area-proportional demand points for a set of precincts.
pub struct PointSynthesizer {
    seed: u64,
    max_attempts_per_point: u64,
}

impl PointSynthesizer {
    #[must_use]
    pub const fn new(seed: u64, max_attempts_per_point: u64) -> Self {
        Self {
            seed,
            max_attempts_per_point,
        }
    }

    /// Scatters `budget` points (plus per-precinct floors) across the
    /// precincts.
    ///
    /// Precincts are sampled in parallel and concatenated in input order.
    /// A precinct that exhausts its attempt budget is logged and left out;
    /// it will get no facilities of its own.
    pub fn generate(
        &self,
        precincts: &[Precinct],
        budget: u64,
        progress: &dyn ProgressCallback,
    ) -> Vec<DemandPoint> {
        let counts = allocate_counts(precincts, budget);
        progress.set_total(precincts.len() as u64);

        let results: Vec<Result<Vec<DemandPoint>, AllocationError>> = precincts
            .par_iter()
            .zip(counts.par_iter())
            .map(|(precinct, &quota)| {
                let mut rng = precinct_rng(self.seed, precinct.id());
                let result = self.sample_precinct(precinct, quota, &mut rng);
                progress.inc(1);
                result
            })
            .collect();

        let mut points = Vec::new();
        for result in results {
            match result {
                Ok(sampled) => points.extend(sampled),
                Err(e) => log::warn!("Excluding precinct from facility placement: {e}"),
            }
        }

        log::info!(
            "Generated {} demand points across {} precincts",
            points.len(),
            precincts.len()
        );
        points
    }

    /// Draws `quota` points strictly inside one precinct.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Generation`] if the quota is not met
    /// within `quota * max_attempts_per_point` draws.
    pub fn sample_precinct<R: Rng>(
        &self,
        precinct: &Precinct,
        quota: usize,
        rng: &mut R,
    ) -> Result<Vec<DemandPoint>, AllocationError> {
        let bounds = precinct.bounds();
        let max_attempts = (quota as u64).saturating_mul(self.max_attempts_per_point);
        let mut points = Vec::with_capacity(quota);
        let mut attempts = 0u64;

        while points.len() < quota {
            if attempts >= max_attempts {
                return Err(AllocationError::Generation {
                    precinct: precinct.id(),
                    requested: quota,
                    accepted: points.len(),
                    attempts,
                });
            }
            attempts += 1;

            let candidate = Point::new(
                rng.gen_range(bounds.min().x..bounds.max().x),
                rng.gen_range(bounds.min().y..bounds.max().y),
            );

            if precinct.contains(&candidate) {
                points.push(DemandPoint {
                    id: format!("P{}_{}", precinct.id(), points.len() + 1),
                    precinct_id: precinct.id(),
                    location: candidate,
                });
            }
        }

        log::debug!(
            "Precinct {}: {quota} points in {attempts} attempts",
            precinct.id()
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};

    use super::*;
    use crate::progress::NullProgress;

    fn rect(id: PrecinctId, x0: f64, y0: f64, x1: f64, y1: f64) -> Precinct {
        let polygon = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )]);
        Precinct::new(id, polygon).unwrap()
    }

    /// A triangle filling half its bounding box.
    fn triangle(id: PrecinctId) -> Precinct {
        let polygon = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (10_000.0, 0.0),
                (0.0, 10_000.0),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        Precinct::new(id, polygon).unwrap()
    }

    #[test]
    fn counts_are_area_proportional_with_floor() {
        let precincts = vec![
            rect(1, 0.0, 0.0, 9_000.0, 10_000.0),
            rect(2, 9_000.0, 0.0, 10_000.0, 10_000.0),
            rect(3, 20_000.0, 0.0, 20_010.0, 10.0),
        ];
        let counts = allocate_counts(&precincts, 100);
        assert_eq!(counts, vec![90, 10, 5]);
    }

    #[test]
    fn every_precinct_gets_at_least_five_points() {
        let precincts = vec![rect(1, 0.0, 0.0, 1_000.0, 1_000.0), triangle(2)];
        let points = PointSynthesizer::new(7, 1_000).generate(&precincts, 1, &NullProgress);

        for precinct in &precincts {
            let owned: Vec<&DemandPoint> = points
                .iter()
                .filter(|p| p.precinct_id == precinct.id())
                .collect();
            assert!(owned.len() >= MIN_POINTS_PER_PRECINCT);
            for point in owned {
                assert!(precinct.contains(&point.location), "{point:?} escaped");
            }
        }
    }

    #[test]
    fn points_lie_strictly_inside_the_polygon() {
        let precinct = triangle(4);
        let mut rng = precinct_rng(1, 4);
        let points = PointSynthesizer::new(1, 1_000)
            .sample_precinct(&precinct, 200, &mut rng)
            .unwrap();
        assert_eq!(points.len(), 200);
        assert!(points.iter().all(|p| p.location.x() + p.location.y() < 10_000.0));
        assert_eq!(points[0].id, "P4_1");
        assert_eq!(points[199].id, "P4_200");
    }

    #[test]
    fn same_seed_reproduces_points() {
        let precincts = vec![triangle(1), rect(2, 0.0, 20_000.0, 5_000.0, 25_000.0)];
        let synth = PointSynthesizer::new(42, 1_000);
        let a = synth.generate(&precincts, 50, &NullProgress);
        let b = synth.generate(&precincts, 50, &NullProgress);
        assert_eq!(a, b);

        let c = PointSynthesizer::new(43, 1_000).generate(&precincts, 50, &NullProgress);
        assert_ne!(a, c);
    }

    #[test]
    fn exhausted_attempts_is_a_generation_error() {
        // A sliver that occupies a tiny fraction of its bounding box.
        let sliver = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (100_000.0, 100_000.0),
                (100_000.0, 100_000.01),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        let precinct = Precinct::new(9, sliver).unwrap();
        let mut rng = precinct_rng(3, 9);
        let err = PointSynthesizer::new(3, 2)
            .sample_precinct(&precinct, 5, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Generation {
                precinct: 9,
                requested: 5,
                attempts: 10,
                ..
            }
        ));
    }

    #[test]
    fn failed_precinct_is_left_out_of_the_run() {
        let sliver = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (100_000.0, 100_000.0),
                (100_000.0, 100_000.01),
                (0.0, 0.0),
            ]),
            vec![],
        )]);
        let precincts = vec![
            Precinct::new(1, sliver).unwrap(),
            rect(2, 200_000.0, 0.0, 210_000.0, 10_000.0),
        ];
        let points = PointSynthesizer::new(5, 1).generate(&precincts, 20, &NullProgress);
        assert!(points.iter().all(|p| p.precinct_id == 2));
        assert!(!points.is_empty());
    }
}
