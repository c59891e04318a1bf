//! Autoencoder Network Architecture
//!
//! A small fully-connected autoencoder with ReLU hidden layers and a linear
//! output layer, built from burn `Linear` modules.
//!
//! ```text
//! Input (2D) -> 16 -> 8 -> 4 (latent) -> 8 -> 16 -> Output (2D)
//! ```

use burn::{
    module::{Module, Param},
    nn::{Initializer, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor, TensorData},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Autoencoder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    /// Hidden layer widths, encoder and decoder (must be an hourglass)
    pub hidden_layers: Vec<usize>,
    /// Number of training epochs
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Mini-batch size (capped at the number of samples)
    pub batch_size: usize,
    /// L2 penalty on weights
    pub l2_penalty: f64,
    /// Minimum loss improvement that resets the patience counter
    pub tolerance: f64,
    /// Epochs without improvement before training stops
    pub patience: usize,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![16, 8, 4, 8, 16],
            epochs: 200,
            learning_rate: 0.001,
            batch_size: 200,
            l2_penalty: 0.0001,
            tolerance: 1e-4,
            patience: 10,
        }
    }
}

impl AutoencoderConfig {
    /// Width of the bottleneck layer
    pub fn latent_dim(&self) -> usize {
        self.hidden_layers.get(self.hidden_layers.len() / 2).copied().unwrap_or(0)
    }

    /// Check that the layer list is a symmetric hourglass
    pub fn validate(&self) -> Result<()> {
        let layers = &self.hidden_layers;
        if layers.is_empty() || layers.iter().any(|&w| w == 0) {
            return Err(AnalysisError::Config(
                "hidden_layers must be non-empty with non-zero widths".to_string(),
            ));
        }
        if layers.len() % 2 == 0 {
            return Err(AnalysisError::Config(format!(
                "hidden_layers must have an odd number of layers, got {}",
                layers.len()
            )));
        }
        if !layers.iter().eq(layers.iter().rev()) {
            return Err(AnalysisError::Config(format!(
                "hidden_layers must be symmetric, got {:?}",
                layers
            )));
        }
        let latent = self.latent_dim();
        if layers.iter().any(|&w| w < latent) {
            return Err(AnalysisError::Config(format!(
                "middle layer must be the narrowest, got {:?}",
                layers
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(AnalysisError::Config(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(AnalysisError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.l2_penalty < 0.0 {
            return Err(AnalysisError::Config(format!(
                "l2_penalty must not be negative, got {}",
                self.l2_penalty
            )));
        }
        Ok(())
    }
}

/// Glorot-uniform initialized linear layer
///
/// Weights are drawn from the caller's RNG rather than the backend's global
/// one, so two networks built from equal seeds are identical.
fn glorot_linear<B: Backend, R: Rng>(
    inputs: usize,
    outputs: usize,
    rng: &mut R,
    device: &B::Device,
) -> Linear<B> {
    let bound = (6.0 / (inputs + outputs) as f64).sqrt();
    let weights: Vec<f32> = (0..inputs * outputs)
        .map(|_| rng.random_range(-bound..bound) as f32)
        .collect();
    let biases: Vec<f32> = (0..outputs)
        .map(|_| rng.random_range(-bound..bound) as f32)
        .collect();

    let mut linear = LinearConfig::new(inputs, outputs)
        .with_initializer(Initializer::Zeros)
        .init(device);
    linear.weight = Param::from_tensor(Tensor::from_data(
        TensorData::new(weights, [inputs, outputs]),
        device,
    ));
    linear.bias = Some(Param::from_tensor(Tensor::from_data(
        TensorData::new(biases, [outputs]),
        device,
    )));
    linear
}

/// Feed-forward autoencoder
#[derive(Module, Debug)]
pub struct Autoencoder<B: Backend> {
    /// Encoder then decoder layers; the last one has no activation
    layers: Vec<Linear<B>>,
    activation: Relu,
    latent_layer: usize,
}

impl<B: Backend> Autoencoder<B> {
    /// Create a new autoencoder for `input_dim` features
    pub fn new<R: Rng>(
        input_dim: usize,
        config: &AutoencoderConfig,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        let mut widths = Vec::with_capacity(config.hidden_layers.len() + 2);
        widths.push(input_dim);
        widths.extend_from_slice(&config.hidden_layers);
        widths.push(input_dim);

        let layers = widths
            .windows(2)
            .map(|pair| glorot_linear(pair[0], pair[1], rng, device))
            .collect();

        Self {
            layers,
            activation: Relu::new(),
            latent_layer: config.hidden_layers.len() / 2,
        }
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Encode input to latent representation
    pub fn encode(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.layers[..=self.latent_layer]
            .iter()
            .fold(x, |x, layer| self.activation.forward(layer.forward(x)))
    }

    /// Decode latent representation to reconstruction
    pub fn decode(&self, z: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len() - 1;
        self.layers[self.latent_layer + 1..]
            .iter()
            .enumerate()
            .fold(z, |x, (i, layer)| {
                let x = layer.forward(x);
                if self.latent_layer + 1 + i == last {
                    x
                } else {
                    self.activation.forward(x)
                }
            })
    }

    /// Forward pass: encode then decode
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let z = self.encode(x);
        self.decode(z)
    }
}

/// Build a `[rows, cols]` tensor from f64 rows
pub fn rows_to_tensor<B: Backend, const N: usize>(rows: &[[f64; N]], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = rows.iter().flat_map(|row| row.iter().map(|&v| v as f32)).collect();
    Tensor::from_data(TensorData::new(flat, [rows.len(), N]), device)
}

/// Read a `[rows, N]` tensor back into f64 rows
pub fn tensor_to_rows<B: Backend, const N: usize>(tensor: Tensor<B, 2>) -> Result<Vec<[f64; N]>> {
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| AnalysisError::ModelDiverged(format!("unreadable model output: {:?}", e)))?;

    Ok(values
        .chunks_exact(N)
        .map(|chunk| {
            let mut row = [0.0; N];
            for (r, &v) in row.iter_mut().zip(chunk) {
                *r = v as f64;
            }
            row
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray;

    #[test]
    fn test_autoencoder_config_default() {
        let config = AutoencoderConfig::default();
        assert_eq!(config.hidden_layers, vec![16, 8, 4, 8, 16]);
        assert_eq!(config.latent_dim(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_shapes() {
        let bad = |layers: Vec<usize>| AutoencoderConfig {
            hidden_layers: layers,
            ..Default::default()
        };
        assert!(bad(vec![]).validate().is_err());
        assert!(bad(vec![8, 4]).validate().is_err());
        assert!(bad(vec![8, 4, 16]).validate().is_err());
        assert!(bad(vec![4, 8, 4]).validate().is_err());
        assert!(bad(vec![8, 0, 8]).validate().is_err());
        assert!(bad(vec![8, 2, 8]).validate().is_ok());

        let zero_epochs = AutoencoderConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(zero_epochs.validate().is_err());
    }

    #[test]
    fn test_network_shape() {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(7);
        let net = Autoencoder::<TestBackend>::new(2, &AutoencoderConfig::default(), &mut rng, &device);

        assert_eq!(net.depth(), 6);
        // 2*16+16 + 16*8+8 + 8*4+4 + 4*8+8 + 8*16+16 + 16*2+2
        assert_eq!(net.num_params(), 458);

        let x = rows_to_tensor::<TestBackend, 2>(&[[0.5, -0.5], [1.0, 2.0], [0.0, 0.0]], &device);
        assert_eq!(net.encode(x.clone()).dims(), [3, 4]);
        assert_eq!(net.forward(x).dims(), [3, 2]);
    }

    #[test]
    fn test_same_seed_same_weights() {
        let device = Default::default();
        let config = AutoencoderConfig::default();
        let a = Autoencoder::<TestBackend>::new(2, &config, &mut StdRng::seed_from_u64(42), &device);
        let b = Autoencoder::<TestBackend>::new(2, &config, &mut StdRng::seed_from_u64(42), &device);

        let rows = [[1.0, 2.0], [-3.0, 0.5]];
        let out_a: Vec<[f64; 2]> = tensor_to_rows(a.forward(rows_to_tensor(&rows, &device))).unwrap();
        let out_b: Vec<[f64; 2]> = tensor_to_rows(b.forward(rows_to_tensor(&rows, &device))).unwrap();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_decoder_output_is_linear() {
        // Zero input through ReLU layers gives relu(bias) chains; the output
        // layer must still be able to go negative.
        let device = Default::default();
        let config = AutoencoderConfig {
            hidden_layers: vec![3, 2, 3],
            ..Default::default()
        };
        let outputs: Vec<f64> = (0..20)
            .flat_map(|seed| {
                let net = Autoencoder::<TestBackend>::new(2, &config, &mut StdRng::seed_from_u64(seed), &device);
                let rows: Vec<[f64; 2]> =
                    tensor_to_rows(net.forward(rows_to_tensor(&[[0.0, 0.0]], &device))).unwrap();
                rows[0].to_vec()
            })
            .collect();
        assert!(outputs.iter().any(|&v| v < 0.0));
    }

    #[test]
    fn test_tensor_roundtrip() {
        let device = Default::default();
        let rows = [[1.5, -2.0], [0.25, 8.0]];
        let back: Vec<[f64; 2]> = tensor_to_rows(rows_to_tensor::<TestBackend, 2>(&rows, &device)).unwrap();
        assert_eq!(back, rows.to_vec());
    }
}
