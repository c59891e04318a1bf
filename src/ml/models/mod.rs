//! ML models for triage
//!
//! Provides the clustering engine and the reconstruction models used for
//! anomaly scoring.

pub mod autoencoder;
pub mod kmeans;

pub use autoencoder::{AutoencoderConfig, AutoencoderTrainer, TrainedAutoencoder};
pub use kmeans::{ClusterConfig, Clustering, KMeans, CLUSTER_COUNT};

use super::features::NumericRow;
use crate::error::Result;

/// A model that maps scaled rows back onto themselves
pub trait ReconstructionModel {
    /// Reconstruct a batch of scaled rows, one output per input row
    fn reconstruct(&self, rows: &[NumericRow]) -> Result<Vec<NumericRow>>;

    /// Get model name
    fn name(&self) -> &str;
}
