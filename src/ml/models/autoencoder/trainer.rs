//! Autoencoder Training
//!
//! Mini-batch Adam training on the burn autodiff backend, with L2 weight
//! decay and loss-plateau early stopping.

use std::collections::HashMap;

use burn::{
    backend::{Autodiff, NdArray},
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::Backend, ElementConversion, Tensor},
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use super::network::{rows_to_tensor, tensor_to_rows, Autoencoder, AutoencoderConfig};
use crate::error::{AnalysisError, Result};
use crate::ml::features::{NumericRow, NUMERIC_FEATURES};

/// CPU backend used for inference
pub type InferenceBackend = NdArray;

/// Autodiff backend used for training
pub type TrainBackend = Autodiff<InferenceBackend>;

/// Training data for the autoencoder
#[derive(Debug, Clone, Default)]
pub struct AutoencoderDataset {
    samples: Vec<NumericRow>,
}

impl AutoencoderDataset {
    /// Create a new empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from already scaled rows
    pub fn from_rows(rows: &[NumericRow]) -> Self {
        Self {
            samples: rows.to_vec(),
        }
    }

    /// Add a sample
    pub fn add(&mut self, row: NumericRow) {
        self.samples.push(row);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Dataset<NumericRow> for AutoencoderDataset {
    fn get(&self, index: usize) -> Option<NumericRow> {
        self.samples.get(index).copied()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Stacks rows into a `[batch, 2]` tensor
#[derive(Clone, Debug)]
pub struct RowBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> RowBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<NumericRow, Tensor<B, 2>> for RowBatcher<B> {
    fn batch(&self, items: Vec<NumericRow>) -> Tensor<B, 2> {
        rows_to_tensor(&items, &self.device)
    }
}

/// Autoencoder trainer
#[derive(Debug)]
pub struct AutoencoderTrainer {
    config: AutoencoderConfig,
    /// Per-epoch loss
    loss_history: Vec<f64>,
    best_loss: f64,
    epochs_without_improvement: usize,
}

impl AutoencoderTrainer {
    /// Create a new trainer with configuration
    pub fn new(config: AutoencoderConfig) -> Self {
        Self {
            config,
            loss_history: Vec::new(),
            best_loss: f64::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Record an epoch loss and update the plateau counter
    pub fn record_loss(&mut self, loss: f64) {
        if loss > self.best_loss - self.config.tolerance {
            self.epochs_without_improvement += 1;
        } else {
            self.epochs_without_improvement = 0;
        }
        if loss < self.best_loss {
            self.best_loss = loss;
        }
        self.loss_history.push(loss);
    }

    /// Average over the recorded epochs
    pub fn average_loss(&self) -> f64 {
        if self.loss_history.is_empty() {
            return 0.0;
        }
        self.loss_history.iter().sum::<f64>() / self.loss_history.len() as f64
    }

    /// Check if the loss has plateaued for longer than `patience` epochs
    pub fn should_stop_early(&self) -> bool {
        self.epochs_without_improvement > self.config.patience
    }

    /// Train a freshly initialized network on the dataset
    ///
    /// The same RNG drives weight initialization and per-epoch shuffling,
    /// so a seeded RNG gives a reproducible model.
    pub fn train<R: Rng>(&mut self, dataset: &AutoencoderDataset, rng: &mut R) -> Result<TrainedAutoencoder> {
        if dataset.is_empty() {
            return Err(AnalysisError::InvalidDimension {
                expected: 1,
                got: 0,
            });
        }

        let device = <TrainBackend as Backend>::Device::default();
        let mut model = Autoencoder::<TrainBackend>::new(NUMERIC_FEATURES, &self.config, rng, &device);
        let mut optim = AdamConfig::new()
            .with_beta_1(0.9)
            .with_beta_2(0.999)
            .with_epsilon(1e-8)
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.l2_penalty as f32)))
            .init::<TrainBackend, Autoencoder<TrainBackend>>();
        let batcher = RowBatcher::<TrainBackend>::new(device);
        let loss_fn = MseLoss::new();

        let n = dataset.len();
        let batch_size = self.config.batch_size.min(n).max(1);
        let mut order: Vec<usize> = (0..n).collect();

        debug!(
            "Training autoencoder: {} samples, {} params, batch {}",
            n,
            model.num_params(),
            batch_size
        );

        for epoch in 0..self.config.epochs {
            order.shuffle(rng);
            let mut epoch_loss = 0.0;

            for chunk in order.chunks(batch_size) {
                let items: Vec<NumericRow> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
                let batch = batcher.batch(items);

                let output = model.forward(batch.clone());
                let loss = loss_fn.forward(output, batch, Reduction::Mean);
                let batch_loss: f64 = loss.clone().into_scalar().elem();
                epoch_loss += batch_loss * chunk.len() as f64 / n as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(self.config.learning_rate, model, grads);
            }

            if !epoch_loss.is_finite() {
                return Err(AnalysisError::ModelDiverged(format!(
                    "loss became {} at epoch {}",
                    epoch_loss, epoch
                )));
            }

            trace!("epoch {} loss {:.6}", epoch, epoch_loss);
            self.record_loss(epoch_loss);

            if self.should_stop_early() {
                debug!("Loss plateaued, stopping after {} epochs", epoch + 1);
                break;
            }
        }

        Ok(TrainedAutoencoder {
            network: model.valid(),
            epochs_run: self.loss_history.len(),
            final_loss: self.loss_history.last().copied().unwrap_or(0.0),
        })
    }
}

/// A trained autoencoder
#[derive(Debug)]
pub struct TrainedAutoencoder {
    network: Autoencoder<InferenceBackend>,
    pub epochs_run: usize,
    pub final_loss: f64,
}

impl TrainedAutoencoder {
    /// Reconstruct scaled rows
    ///
    /// Equal rows go through the network once and share one output, so
    /// identical inputs always get bit-identical reconstructions.
    pub fn reconstruct(&self, rows: &[NumericRow]) -> Result<Vec<NumericRow>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots: HashMap<[u64; NUMERIC_FEATURES], usize> = HashMap::new();
        let mut unique: Vec<NumericRow> = Vec::new();
        let index: Vec<usize> = rows
            .iter()
            .map(|row| {
                *slots.entry(row.map(f64::to_bits)).or_insert_with(|| {
                    unique.push(*row);
                    unique.len() - 1
                })
            })
            .collect();

        let device = <InferenceBackend as Backend>::Device::default();
        let output = self.network.forward(rows_to_tensor(&unique, &device));
        let reconstructed: Vec<NumericRow> = tensor_to_rows(output)?;

        Ok(index.into_iter().map(|i| reconstructed[i]).collect())
    }
}
