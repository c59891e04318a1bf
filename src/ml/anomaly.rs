//! Anomaly scoring
//!
//! Trains a fresh autoencoder on the scaled numeric rows of one batch and
//! flags every row whose reconstruction error lies strictly above the
//! batch's 95th percentile.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features::NumericRow;
use super::models::autoencoder::{AutoencoderConfig, AutoencoderDataset, AutoencoderTrainer};
use super::models::ReconstructionModel;
use super::normalization::RobustScaler;
use super::threshold::{flag_above, percentile_of, ANOMALY_PERCENTILE};
use crate::error::{AnalysisError, Result};

/// Anomaly scorer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    #[serde(flatten)]
    pub autoencoder: AutoencoderConfig,
    /// Absolute bound on scaled values fed to the network
    pub clip: f64,
    /// Seed for weight initialization and batch shuffling
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            autoencoder: AutoencoderConfig::default(),
            clip: 5.0,
            seed: 42,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<()> {
        self.autoencoder.validate()?;
        if !(self.clip > 0.0) {
            return Err(AnalysisError::Config(format!(
                "clip must be positive, got {}",
                self.clip
            )));
        }
        Ok(())
    }
}

/// Per-row anomaly scores for one batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Reconstruction error per row, in original units
    pub errors: Vec<f64>,
    /// Error at the anomaly percentile
    pub threshold: f64,
    /// `errors[i] > threshold`
    pub flags: Vec<bool>,
}

impl AnomalyReport {
    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Indices of flagged rows in input order
    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, &f)| f.then_some(i))
            .collect()
    }
}

/// Reconstruction-error anomaly scorer
#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer {
    config: AnomalyConfig,
}

impl AnomalyScorer {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    /// Fit a fresh model on the batch and score every row
    pub fn score(&self, data: &[NumericRow]) -> Result<AnomalyReport> {
        if data.is_empty() {
            return Ok(AnomalyReport::default());
        }

        let scaler = RobustScaler::fit(data, self.config.clip);
        let dataset = AutoencoderDataset::from_rows(&scaler.transform_all(data));

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut trainer = AutoencoderTrainer::new(self.config.autoencoder.clone());
        let model = trainer.train(&dataset, &mut rng)?;
        debug!(
            "Autoencoder trained for {} epochs, final loss {:.6}",
            model.epochs_run, model.final_loss
        );

        let report = score_with(&model, &scaler, data)?;
        if report.errors.iter().any(|e| !e.is_finite()) {
            return Err(AnalysisError::ModelDiverged(
                "non-finite reconstruction error".to_string(),
            ));
        }
        Ok(report)
    }
}

/// Score rows against an already fitted model and scaler
pub fn score_with<M: ReconstructionModel + ?Sized>(
    model: &M,
    scaler: &RobustScaler,
    data: &[NumericRow],
) -> Result<AnomalyReport> {
    let reconstructed = model.reconstruct(&scaler.transform_all(data))?;
    if reconstructed.len() != data.len() {
        return Err(AnalysisError::InvalidDimension {
            expected: data.len(),
            got: reconstructed.len(),
        });
    }

    let errors: Vec<f64> = data
        .iter()
        .zip(&reconstructed)
        .map(|(row, scaled)| reconstruction_error(row, &scaler.inverse_transform(scaled)))
        .collect();

    let threshold = percentile_of(&errors, ANOMALY_PERCENTILE);
    let flags = flag_above(&errors, threshold);
    debug!(
        "{}: threshold {:.6}, {} of {} flagged",
        model.name(),
        threshold,
        flags.iter().filter(|&&f| f).count(),
        flags.len()
    );

    Ok(AnomalyReport {
        errors,
        threshold,
        flags,
    })
}

/// Mean squared difference over the numeric fields
pub fn reconstruction_error(original: &NumericRow, reconstructed: &NumericRow) -> f64 {
    original
        .iter()
        .zip(reconstructed)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        / original.len() as f64
}
