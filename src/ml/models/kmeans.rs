//! K-means clustering
//!
//! Partitions the numeric feature rows into `CLUSTER_COUNT` groups using
//! k-means++ seeding followed by Lloyd iterations. Inputs with no more
//! distinct points than clusters get one cluster per distinct point.

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ml::features::{NumericRow, NUMERIC_FEATURES};

/// Number of clusters produced for every batch
pub const CLUSTER_COUNT: usize = 3;

/// Clustering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum Lloyd iterations
    pub max_iterations: usize,
    /// Convergence tolerance on centroid movement, relative to data variance
    pub tolerance: f64,
    /// Random seed for centroid seeding
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Result of clustering one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    /// Cluster id per input row, numbered by first appearance
    pub labels: Vec<usize>,
    /// Centroid per cluster id
    pub centroids: Vec<NumericRow>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    /// Lloyd iterations run (0 when no iteration was needed)
    pub iterations: usize,
}

impl Clustering {
    fn empty() -> Self {
        Self {
            labels: Vec::new(),
            centroids: Vec::new(),
            inertia: 0.0,
            iterations: 0,
        }
    }

    /// Number of rows per cluster id
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// K-means model with a fixed cluster count
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    config: ClusterConfig,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl KMeans {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            k: CLUSTER_COUNT,
            config,
        }
    }

    /// Cluster a batch of rows
    pub fn fit(&self, data: &[NumericRow]) -> Clustering {
        if data.is_empty() {
            return Clustering::empty();
        }

        let distinct = distinct_points(data, self.k);
        if distinct.len() <= self.k {
            trace!("{} distinct points, one cluster each", distinct.len());
            return finish(data, distinct, 0);
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut centroids = self.seed_centroids(data, &mut rng);
        let tolerance = self.config.tolerance * mean_variance(data);
        let mut labels = vec![0usize; data.len()];
        let mut iterations = 0;

        for _ in 0..self.config.max_iterations {
            iterations += 1;
            for (label, row) in labels.iter_mut().zip(data) {
                *label = nearest(&centroids, row);
            }

            let updated = recompute_centroids(data, &labels, &centroids);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;

            if shift <= tolerance {
                break;
            }
        }

        debug!("k-means converged after {} iterations", iterations);
        finish(data, centroids, iterations)
    }

    /// k-means++ seeding
    fn seed_centroids<R: Rng>(&self, data: &[NumericRow], rng: &mut R) -> Vec<NumericRow> {
        let mut centroids = Vec::with_capacity(self.k);
        centroids.push(data[rng.random_range(0..data.len())]);

        while centroids.len() < self.k {
            let weights: Vec<f64> = data
                .iter()
                .map(|row| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(c, row))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = weights.iter().sum();

            if !(total > 0.0) || !total.is_finite() {
                // Every point coincides with a centroid; take the first unused one
                let next = data
                    .iter()
                    .find(|row| !centroids.contains(*row))
                    .copied()
                    .unwrap_or(data[0]);
                centroids.push(next);
                continue;
            }

            let mut target = rng.random::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            centroids.push(data[chosen]);
        }

        centroids
    }
}

/// Assign final labels, renumber clusters by first appearance and drop
/// clusters nothing was assigned to.
fn finish(data: &[NumericRow], centroids: Vec<NumericRow>, iterations: usize) -> Clustering {
    let mut remap: Vec<Option<usize>> = vec![None; centroids.len()];
    let mut ordered = Vec::with_capacity(centroids.len());
    let mut labels = Vec::with_capacity(data.len());
    let mut inertia = 0.0;

    for row in data {
        let raw = nearest(&centroids, row);
        inertia += squared_distance(&centroids[raw], row);
        let label = *remap[raw].get_or_insert_with(|| {
            ordered.push(centroids[raw]);
            ordered.len() - 1
        });
        labels.push(label);
    }

    Clustering {
        labels,
        centroids: ordered,
        inertia,
        iterations,
    }
}

/// Distinct rows in first-appearance order, stopping once more than
/// `limit` have been seen
fn distinct_points(data: &[NumericRow], limit: usize) -> Vec<NumericRow> {
    let mut distinct: Vec<NumericRow> = Vec::with_capacity(limit + 1);
    for row in data {
        if !distinct.contains(row) {
            distinct.push(*row);
            if distinct.len() > limit {
                break;
            }
        }
    }
    distinct
}

/// Index of the closest centroid, lowest index on ties
fn nearest(centroids: &[NumericRow], row: &NumericRow) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, row);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Mean of each cluster; an empty cluster keeps its previous centroid
fn recompute_centroids(data: &[NumericRow], labels: &[usize], previous: &[NumericRow]) -> Vec<NumericRow> {
    let mut sums = vec![[0.0; NUMERIC_FEATURES]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (row, &label) in data.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(row) {
            *s += v;
        }
    }

    sums.iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), prev)| {
            if count == 0 {
                *prev
            } else {
                let mut mean = [0.0; NUMERIC_FEATURES];
                for (m, s) in mean.iter_mut().zip(sum) {
                    *m = s / count as f64;
                }
                mean
            }
        })
        .collect()
}

/// Mean per-column variance of the batch
fn mean_variance(data: &[NumericRow]) -> f64 {
    let n = data.len() as f64;
    let mut total = 0.0;
    for col in 0..NUMERIC_FEATURES {
        let mean = data.iter().map(|r| r[col]).sum::<f64>() / n;
        total += data.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
    }
    total / NUMERIC_FEATURES as f64
}

/// Squared Euclidean distance
pub fn squared_distance(a: &NumericRow, b: &NumericRow) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
