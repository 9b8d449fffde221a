//! Clustering over applier view vectors, backed by `linfa-clustering`.
//!
//! Two estimators with a fixed contract:
//!
//! - [`Dbscan`] groups vectors by cosine distance and returns `None` for
//!   points outside every dense region.
//! - [`KMeans`] partitions the vectors directly. The same seed and input
//!   always give the same labels.
//!
//! Cosine DBSCAN runs as Euclidean DBSCAN over L2-normalised rows: for unit
//! vectors `|a - b|^2 = 2 (1 - cos(a, b))`, so `1 - cos <= eps` holds exactly
//! when `|a - b| <= sqrt(2 eps)`.

use linfa::prelude::*;
use linfa_clustering::{Dbscan as LinfaDbscan, KMeans as LinfaKMeans, KMeansInit};
use linfa_nn::{distance::L2Dist, LinearSearch};
use ndarray::Array2;
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

/// Errors raised by the clustering primitives
#[derive(Debug, Error, PartialEq)]
pub enum ClusteringError {
    #[error("no samples to cluster")]
    EmptyInput,

    #[error("vectors have inconsistent dimensions")]
    DimensionMismatch,

    #[error("n_samples={samples} should be >= n_clusters={clusters}")]
    TooFewSamples { samples: usize, clusters: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("clustering backend failed: {0}")]
    Backend(String),
}

/// Packs rows into an `n x d` matrix, rejecting empty or ragged input
fn to_matrix(rows: &[Vec<f64>]) -> Result<Array2<f64>, ClusteringError> {
    let dims = rows.first().map(Vec::len).ok_or(ClusteringError::EmptyInput)?;
    if rows.iter().any(|row| row.len() != dims) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), dims), flat)
        .map_err(|e| ClusteringError::Backend(e.to_string()))
}

/// Scales every row to unit length; zero rows are left as they are
pub fn l2_normalize(mut matrix: Array2<f64>) -> Array2<f64> {
    for mut row in matrix.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row /= norm;
        }
    }
    matrix
}

/// Density-based clustering under cosine distance
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within cosine distance `eps` of it.
#[derive(Debug, Clone)]
pub struct Dbscan {
    eps: f64,
    min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn fit(&self, rows: &[Vec<f64>]) -> Result<Vec<Option<u32>>, ClusteringError> {
        if self.eps.is_nan() || self.eps <= 0.0 || self.eps > 2.0 {
            return Err(ClusteringError::InvalidParameter(format!(
                "eps must be in (0, 2], got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(ClusteringError::InvalidParameter(
                "min_samples must be at least 1".to_string(),
            ));
        }

        let records = l2_normalize(to_matrix(rows)?);

        // linfa needs at least 2; with 1 every point is core, which differs
        // from 2 only for isolated points. Those become singletons below.
        let min_points = self.min_samples.max(2);
        let memberships = LinfaDbscan::params_with(min_points, L2Dist, LinearSearch)
            .tolerance((2.0 * self.eps).sqrt())
            .transform(&records)
            .map_err(|e| ClusteringError::InvalidParameter(e.to_string()))?;

        let mut labels: Vec<Option<u32>> = memberships
            .iter()
            .map(|label| label.map(|id| id as u32))
            .collect();

        if self.min_samples == 1 {
            let mut next = labels.iter().flatten().max().map_or(0, |max| max + 1);
            for label in labels.iter_mut().filter(|label| label.is_none()) {
                *label = Some(next);
                next += 1;
            }
        }

        Ok(labels)
    }
}

/// Centroid-based partitioning into exactly `n_clusters` groups
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: u64,
    tol: f64,
    seed: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter as u64;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit_predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>, ClusteringError> {
        if self.n_clusters == 0 {
            return Err(ClusteringError::InvalidParameter(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        let records = to_matrix(rows)?;
        if records.nrows() < self.n_clusters {
            return Err(ClusteringError::TooFewSamples {
                samples: records.nrows(),
                clusters: self.n_clusters,
            });
        }

        let dataset = DatasetBase::from(records);
        let model = LinfaKMeans::params_with_rng(self.n_clusters, StdRng::seed_from_u64(self.seed))
            .init_method(KMeansInit::KMeansPlusPlus)
            .max_n_iterations(self.max_iter)
            .tolerance(self.tol)
            .fit(&dataset)
            .map_err(|e| ClusteringError::Backend(e.to_string()))?;

        let labels = model.predict(dataset.records());
        Ok(labels.iter().map(|label| *label as u32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![1.0, 0.05, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.1, 0.9],
            vec![0.05, 0.0, 1.0],
        ]
    }

    fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
        1.0 - dot / (norm(a) * norm(b))
    }

    #[test]
    fn test_normalized_distance_matches_cosine_distance() {
        let rows = vec![vec![0.25, 0.5, 0.0], vec![1.0, 0.0, 0.75], vec![0.0, 0.2, 0.1]];
        let unit = l2_normalize(to_matrix(&rows).unwrap());

        for row in unit.rows() {
            assert!((row.dot(&row) - 1.0).abs() < 1e-12);
        }
        for i in 0..rows.len() {
            for j in 0..rows.len() {
                let diff = &unit.row(i) - &unit.row(j);
                let squared = diff.dot(&diff);
                let expected = 2.0 * cosine_distance(&rows[i], &rows[j]);
                assert!((squared - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_normalize_leaves_zero_rows() {
        let unit = l2_normalize(to_matrix(&[vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap());
        assert_eq!(unit.row(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(unit.row(1).to_vec(), vec![0.6, 0.8]);
    }

    #[test]
    fn test_dbscan_finds_groups_and_noise() {
        let mut rows = two_groups();
        rows.push(vec![0.0, 1.0, 0.0]);

        let labels = Dbscan::new(0.1, 2).fit(&rows).unwrap();

        assert!(labels[0].is_some());
        assert!(labels[..3].iter().all(|label| *label == labels[0]));
        assert!(labels[3].is_some());
        assert!(labels[3..6].iter().all(|label| *label == labels[3]));
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[6], None);
    }

    #[test]
    fn test_dbscan_ignores_vector_magnitude() {
        // Same direction, very different view volumes
        let rows = vec![vec![0.1, 0.1], vec![1.0, 1.0], vec![1.0, 0.0]];
        let labels = Dbscan::new(0.01, 2).fit(&rows).unwrap();

        assert!(labels[0].is_some());
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], None);
    }

    #[test]
    fn test_dbscan_min_samples_one_makes_singletons() {
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.99, 0.01]];
        let labels = Dbscan::new(0.05, 1).fit(&rows).unwrap();

        assert!(labels.iter().all(Option::is_some));
        assert_eq!(labels[0], labels[2]);
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_dbscan_rejects_bad_input() {
        assert_eq!(
            Dbscan::new(0.5, 2).fit(&[]),
            Err(ClusteringError::EmptyInput)
        );
        assert_eq!(
            Dbscan::new(0.5, 2).fit(&[vec![1.0, 0.0], vec![1.0]]),
            Err(ClusteringError::DimensionMismatch)
        );
        assert!(matches!(
            Dbscan::new(0.0, 2).fit(&[vec![1.0]]),
            Err(ClusteringError::InvalidParameter(_))
        ));
        assert!(matches!(
            Dbscan::new(f64::NAN, 2).fit(&[vec![1.0]]),
            Err(ClusteringError::InvalidParameter(_))
        ));
        assert!(matches!(
            Dbscan::new(0.5, 0).fit(&[vec![1.0]]),
            Err(ClusteringError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kmeans_separates_groups() {
        let labels = KMeans::new(2).fit_predict(&two_groups()).unwrap();

        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_same_seed_same_labels() {
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                vec![
                    (i % 7) as f64 / 7.0,
                    (i % 3) as f64 / 3.0,
                    (i % 5) as f64 / 5.0,
                ]
            })
            .collect();

        let first = KMeans::new(4).with_seed(7).fit_predict(&rows).unwrap();
        let second = KMeans::new(4).with_seed(7).fit_predict(&rows).unwrap();

        assert_eq!(first, second);
        assert!(first.iter().all(|label| *label < 4));
    }

    #[test]
    fn test_kmeans_too_few_samples() {
        let result = KMeans::new(3).fit_predict(&[vec![1.0], vec![0.0]]);
        assert_eq!(
            result,
            Err(ClusteringError::TooFewSamples {
                samples: 2,
                clusters: 3
            })
        );
    }

    #[test]
    fn test_kmeans_rejects_bad_input() {
        assert_eq!(
            KMeans::new(1).fit_predict(&[vec![1.0, 0.0], vec![0.0]]),
            Err(ClusteringError::DimensionMismatch)
        );
        assert_eq!(KMeans::new(1).fit_predict(&[]), Err(ClusteringError::EmptyInput));
        assert!(matches!(
            KMeans::new(0).fit_predict(&[vec![1.0]]),
            Err(ClusteringError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kmeans_single_cluster() {
        let labels = KMeans::new(1)
            .with_max_iter(5)
            .fit_predict(&two_groups())
            .unwrap();
        assert!(labels.iter().all(|label| *label == 0));
    }
}
