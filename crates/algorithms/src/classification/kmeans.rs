//! K-means clustering
//!
//! Lloyd iterations seeded with k-means++. The initial centroids come from a
//! `ChaCha8Rng` built from `KmeansParams::seed`, so a given input and seed
//! always produce the same labels.

use crate::maybe_rayon::*;
use geopulse_core::{Error, Result};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Parameters for K-means clustering
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum iterations (default: 300)
    pub max_iterations: usize,
    /// Stop when no centroid moves more than this (default: 1e-4)
    pub convergence: f64,
    /// Seed for centroid initialization
    pub seed: u64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 6,
            max_iterations: 300,
            convergence: 1e-4,
            seed: 42,
        }
    }
}

/// Result of a k-means fit
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// One label in `0..k` per input row
    pub labels: Vec<usize>,
    /// k × d centroid matrix
    pub centroids: Array2<f64>,
    /// Lloyd iterations performed
    pub iterations: usize,
}

/// Cluster the rows of `features` (n samples × d features).
///
/// Every value must be finite. Fails when `k < 2`, when there are fewer rows
/// than clusters, or when all rows are identical.
pub fn kmeans(features: ArrayView2<'_, f32>, params: &KmeansParams) -> Result<KmeansFit> {
    let (n, d) = features.dim();
    let k = params.k;

    if k < 2 {
        return Err(Error::Algorithm("K-means requires k >= 2".into()));
    }
    if n < k {
        return Err(Error::Algorithm(format!(
            "Not enough samples ({}) for {} clusters",
            n, k
        )));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(Error::Algorithm("K-means input contains non-finite values".into()));
    }

    let points: Array2<f64> = features.mapv(f64::from);
    if total_variance(&points) == 0.0 {
        return Err(Error::Algorithm(
            "K-means input has zero variance".into(),
        ));
    }

    let mut centroids = init_plus_plus(&points, k, params.seed);
    let mut labels = assign(&points, &centroids);
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        iterations += 1;

        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += &points.row(i);
            counts[label] += 1;
        }

        let mut max_shift = 0.0_f64;
        for c in 0..k {
            // Empty clusters keep their previous centroid
            if counts[c] == 0 {
                continue;
            }
            let mut shift = 0.0;
            for j in 0..d {
                let updated = sums[(c, j)] / counts[c] as f64;
                shift += (updated - centroids[(c, j)]).powi(2);
                centroids[(c, j)] = updated;
            }
            max_shift = max_shift.max(shift.sqrt());
        }

        labels = assign(&points, &centroids);

        if max_shift < params.convergence {
            break;
        }
    }

    Ok(KmeansFit {
        labels,
        centroids,
        iterations,
    })
}

fn total_variance(points: &Array2<f64>) -> f64 {
    points
        .columns()
        .into_iter()
        .map(|col| {
            let mean = col.sum() / col.len() as f64;
            col.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        })
        .sum()
}

fn squared_distance(points: &Array2<f64>, i: usize, centroids: &Array2<f64>, c: usize) -> f64 {
    points
        .row(i)
        .iter()
        .zip(centroids.row(c).iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}

/// Nearest centroid per row; ties go to the lower index.
fn assign(points: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    let k = centroids.nrows();
    (0..points.nrows())
        .into_par_iter()
        .map(|i| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for c in 0..k {
                let dist = squared_distance(points, i, centroids, c);
                if dist < best_dist {
                    best_dist = dist;
                    best = c;
                }
            }
            best
        })
        .collect()
}

/// k-means++ seeding: first centroid uniform, then proportional to D².
fn init_plus_plus(points: &Array2<f64>, k: usize, seed: u64) -> Array2<f64> {
    let n = points.nrows();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids = Array2::<f64>::zeros((k, points.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&points.row(first));

    let mut nearest: Vec<f64> = (0..n)
        .map(|i| squared_distance(points, i, &centroids, 0))
        .collect();

    for c in 1..k {
        let total: f64 = nearest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = n - 1;
            for (i, &dist) in nearest.iter().enumerate() {
                if target < dist {
                    pick = i;
                    break;
                }
                target -= dist;
            }
            pick
        } else {
            // Fewer distinct points than clusters; the duplicate stays empty
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&points.row(chosen));
        for (i, slot) in nearest.iter_mut().enumerate() {
            *slot = slot.min(squared_distance(points, i, &centroids, c));
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f32> {
        // three tight groups in 2D
        let mut rows = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.01;
            rows.extend_from_slice(&[0.0 + jitter, 0.0]);
            rows.extend_from_slice(&[5.0 + jitter, 5.0]);
            rows.extend_from_slice(&[10.0, -5.0 + jitter]);
        }
        Array2::from_shape_vec((30, 2), rows).unwrap()
    }

    #[test]
    fn separates_distinct_groups() {
        let data = blobs();
        let params = KmeansParams { k: 3, ..Default::default() };
        let fit = kmeans(data.view(), &params).unwrap();

        assert_eq!(fit.labels.len(), 30);
        // rows cycle through the three groups
        let (a, b, c) = (fit.labels[0], fit.labels[1], fit.labels[2]);
        assert!(a != b && b != c && a != c);
        for chunk in fit.labels.chunks(3) {
            assert_eq!(chunk, &[a, b, c]);
        }
    }

    #[test]
    fn same_seed_same_labels() {
        let data = blobs();
        let params = KmeansParams { k: 6, seed: 7, ..Default::default() };
        let first = kmeans(data.view(), &params).unwrap();
        let second = kmeans(data.view(), &params).unwrap();
        assert_eq!(first.labels, second.labels);
        assert!(first.labels.iter().all(|&l| l < 6));
    }

    #[test]
    fn more_clusters_than_distinct_points() {
        let data = array![[0.0f32, 0.0], [1.0, 1.0], [0.0, 0.0], [1.0, 1.0]];
        let params = KmeansParams { k: 3, ..Default::default() };
        let fit = kmeans(data.view(), &params).unwrap();
        assert_eq!(fit.labels[0], fit.labels[2]);
        assert_eq!(fit.labels[1], fit.labels[3]);
        assert_ne!(fit.labels[0], fit.labels[1]);
    }

    #[test]
    fn zero_variance_rejected() {
        let data = Array2::from_elem((20, 2), 0.25f32);
        assert!(kmeans(data.view(), &KmeansParams::default()).is_err());
    }

    #[test]
    fn too_few_rows_rejected() {
        let data = array![[0.0f32, 1.0], [2.0, 3.0]];
        assert!(kmeans(data.view(), &KmeansParams::default()).is_err());
    }

    #[test]
    fn k_one_rejected() {
        let data = blobs();
        let params = KmeansParams { k: 1, ..Default::default() };
        assert!(kmeans(data.view(), &params).is_err());
    }
}
