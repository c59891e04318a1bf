//! Autoencoder-based reconstruction
//!
//! Normal samples should have low reconstruction error while anomalies
//! should have high error.
//!
//! # Architecture
//! ```text
//! Input (2D) -> 16 -> 8 -> 4 (latent) -> 8 -> 16 -> Output (2D)
//! ```
//!
//! # Usage
//! ```ignore
//! use capsift::ml::models::autoencoder::{AutoencoderConfig, AutoencoderDataset, AutoencoderTrainer};
//!
//! let mut trainer = AutoencoderTrainer::new(AutoencoderConfig::default());
//! let model = trainer.train(&AutoencoderDataset::from_rows(&scaled), &mut rng)?;
//! let reconstructed = model.reconstruct(&scaled)?;
//! ```

pub mod network;
pub mod trainer;

pub use network::{Autoencoder, AutoencoderConfig};
pub use trainer::{
    AutoencoderDataset, AutoencoderTrainer, InferenceBackend, RowBatcher, TrainBackend, TrainedAutoencoder,
};

use super::ReconstructionModel;
use crate::error::Result;
use crate::ml::features::NumericRow;

impl ReconstructionModel for TrainedAutoencoder {
    fn reconstruct(&self, rows: &[NumericRow]) -> Result<Vec<NumericRow>> {
        TrainedAutoencoder::reconstruct(self, rows)
    }

    fn name(&self) -> &str {
        "autoencoder"
    }
}
