//! Two-dimensional k-means with k-means++ seeding.
//!
//! Lloyd's algorithm: assign every point to its nearest center, move each
//! center to the mean of its points, repeat until the centers stop moving.
//! Several seeded restarts are run and the one with the lowest inertia
//! (sum of squared distances to assigned centers) wins.

use rand::Rng;

use crate::config::KMeansConfig;

pub type Coord2 = [f64; 2];

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub centers: Vec<Coord2>,
    /// Index into `centers` for every input point.
    pub labels: Vec<usize>,
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub iterations: usize,
}

impl Clustering {
    /// Number of points assigned to each center.
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<u64> {
        let mut sizes = vec![0u64; self.centers.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Per-axis standardization to zero mean and unit variance.
///
/// An axis with zero spread is centered but left unscaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standardizer {
    mean: Coord2,
    scale: Coord2,
}

impl Standardizer {
    /// Fits mean and population standard deviation per axis.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(data: &[Coord2]) -> Self {
        if data.is_empty() {
            return Self {
                mean: [0.0, 0.0],
                scale: [1.0, 1.0],
            };
        }

        let n = data.len() as f64;
        let mut mean = [0.0, 0.0];
        for p in data {
            mean[0] += p[0] / n;
            mean[1] += p[1] / n;
        }

        let mut variance = [0.0, 0.0];
        for p in data {
            variance[0] += (p[0] - mean[0]).powi(2) / n;
            variance[1] += (p[1] - mean[1]).powi(2) / n;
        }

        let scale = variance.map(|v| {
            let std = v.sqrt();
            if std > f64::EPSILON * 10.0 { std } else { 1.0 }
        });

        Self { mean, scale }
    }

    #[must_use]
    pub fn transform(&self, p: Coord2) -> Coord2 {
        [
            (p[0] - self.mean[0]) / self.scale[0],
            (p[1] - self.mean[1]) / self.scale[1],
        ]
    }

    #[must_use]
    pub fn inverse_transform(&self, p: Coord2) -> Coord2 {
        [
            p[0].mul_add(self.scale[0], self.mean[0]),
            p[1].mul_add(self.scale[1], self.mean[1]),
        ]
    }
}

fn squared_distance(a: Coord2, b: Coord2) -> f64 {
    (a[0] - b[0]).mul_add(a[0] - b[0], (a[1] - b[1]).powi(2))
}

/// Index of and squared distance to the nearest center. Ties go to the
/// lower index.
fn nearest_center(point: Coord2, centers: &[Coord2]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, &center) in centers.iter().enumerate() {
        let d = squared_distance(point, center);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

#[allow(clippy::cast_precision_loss)]
fn mean_variance(data: &[Coord2]) -> f64 {
    let n = data.len() as f64;
    let mean = data
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0] / n, acc[1] + p[1] / n]);
    let total: f64 = data
        .iter()
        .map(|p| (p[0] - mean[0]).powi(2) + (p[1] - mean[1]).powi(2))
        .sum();
    total / n / 2.0
}

/// k-means++ seeding: the first center is uniform, each further center is
/// drawn with probability proportional to its squared distance from the
/// nearest center chosen so far.
fn kmeans_plus_plus<R: Rng>(data: &[Coord2], k: usize, rng: &mut R) -> Vec<Coord2> {
    let mut centers = Vec::with_capacity(k);
    centers.push(data[rng.gen_range(0..data.len())]);

    let mut closest: Vec<f64> = data
        .iter()
        .map(|&p| squared_distance(p, centers[0]))
        .collect();

    while centers.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, &d) in closest.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every point coincides with a center already.
            rng.gen_range(0..data.len())
        };

        let center = data[next];
        centers.push(center);
        for (c, &p) in closest.iter_mut().zip(data) {
            *c = c.min(squared_distance(p, center));
        }
    }

    centers
}

/// One Lloyd run from the given initial centers.
#[allow(clippy::cast_precision_loss)]
fn lloyd(data: &[Coord2], mut centers: Vec<Coord2>, max_iter: usize, tol: f64) -> Clustering {
    let k = centers.len();
    let mut labels = vec![0usize; data.len()];
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;

        let mut sums = vec![[0.0, 0.0]; k];
        let mut counts = vec![0usize; k];
        let mut distances = vec![0.0; data.len()];
        for (i, &p) in data.iter().enumerate() {
            let (label, d) = nearest_center(p, &centers);
            labels[i] = label;
            distances[i] = d;
            sums[label][0] += p[0];
            sums[label][1] += p[1];
            counts[label] += 1;
        }

        let mut next = centers.clone();
        let mut taken = vec![false; data.len()];
        for c in 0..k {
            if counts[c] > 0 {
                let n = counts[c] as f64;
                next[c] = [sums[c][0] / n, sums[c][1] / n];
            } else {
                // Re-seed an empty cluster at the worst-served point.
                let far = (0..data.len())
                    .filter(|&i| !taken[i])
                    .max_by(|&a, &b| distances[a].total_cmp(&distances[b]));
                if let Some(i) = far {
                    taken[i] = true;
                    next[c] = data[i];
                }
            }
        }

        let shift: f64 = centers
            .iter()
            .zip(&next)
            .map(|(&a, &b)| squared_distance(a, b))
            .sum();
        centers = next;

        if shift <= tol {
            break;
        }
    }

    let mut inertia = 0.0;
    for (i, &p) in data.iter().enumerate() {
        let (label, d) = nearest_center(p, &centers);
        labels[i] = label;
        inertia += d;
    }

    Clustering {
        centers,
        labels,
        inertia,
        iterations,
    }
}

/// Partitions `data` into exactly `k` clusters.
///
/// Returns `None` if `k` is zero or there are fewer points than clusters.
pub fn fit<R: Rng>(
    data: &[Coord2],
    k: usize,
    config: &KMeansConfig,
    rng: &mut R,
) -> Option<Clustering> {
    if k == 0 || data.len() < k {
        return None;
    }

    let tol = config.tolerance * mean_variance(data);
    let mut best: Option<Clustering> = None;

    for _ in 0..config.n_init.max(1) {
        let initial = kmeans_plus_plus(data, k, rng);
        let run = lloyd(data, initial, config.max_iter.max(1), tol);
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn blobs() -> Vec<Coord2> {
        let mut data = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (100.0, 0.0), (50.0, 90.0)] {
            for dx in [-1.0, 0.0, 1.0] {
                for dy in [-1.0, 0.0, 1.0] {
                    data.push([cx + dx, cy + dy]);
                }
            }
        }
        data
    }

    #[test]
    fn recovers_well_separated_blobs() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let result = fit(&blobs(), 3, &KMeansConfig::default(), &mut rng).unwrap();

        let mut centers = result.centers.clone();
        centers.sort_by(|a, b| a[0].total_cmp(&b[0]));
        let expected = [[0.0, 0.0], [50.0, 90.0], [100.0, 0.0]];
        for (got, want) in centers.iter().zip(expected) {
            assert!(squared_distance(*got, want) < 1e-9, "{got:?} != {want:?}");
        }
        assert_eq!(result.cluster_sizes(), vec![9, 9, 9]);
        assert!((result.inertia - 36.0).abs() < 1e-9);
    }

    #[test]
    fn always_returns_k_centers_even_for_duplicates() {
        let data = vec![[1.0, 1.0]; 6];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = fit(&data, 3, &KMeansConfig::default(), &mut rng).unwrap();
        assert_eq!(result.centers.len(), 3);
        assert_eq!(result.labels.len(), 6);
        assert_eq!(result.cluster_sizes().iter().sum::<u64>(), 6);
    }

    #[test]
    fn too_few_points_is_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(fit(&[[0.0, 0.0], [1.0, 1.0]], 3, &KMeansConfig::default(), &mut rng).is_none());
        assert!(fit(&[[0.0, 0.0]], 0, &KMeansConfig::default(), &mut rng).is_none());
    }

    #[test]
    fn labels_point_at_nearest_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let data = blobs();
        let result = fit(&data, 4, &KMeansConfig::default(), &mut rng).unwrap();
        for (p, &label) in data.iter().zip(&result.labels) {
            assert_eq!(nearest_center(*p, &result.centers).0, label);
        }
    }

    #[test]
    fn standardizer_round_trips_and_normalizes() {
        let data = vec![[0.0, 10.0], [2.0, 10.0], [4.0, 10.0]];
        let scaler = Standardizer::fit(&data);

        let scaled: Vec<Coord2> = data.iter().map(|&p| scaler.transform(p)).collect();
        let mean_x: f64 = scaled.iter().map(|p| p[0]).sum::<f64>() / 3.0;
        let var_x: f64 = scaled.iter().map(|p| p[0] * p[0]).sum::<f64>() / 3.0;
        assert!(mean_x.abs() < 1e-12);
        assert!((var_x - 1.0).abs() < 1e-12);
        // Constant axis is centered, not blown up.
        assert!(scaled.iter().all(|p| p[1].abs() < 1e-12));

        let back = scaler.inverse_transform(scaled[2]);
        assert!(squared_distance(back, data[2]) < 1e-18);
    }
}
