//! Configuration file support for capsift
//!
//! Supports loading configuration from TOML files with environment
//! variable overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::ml::{AnomalyConfig, ClusterConfig};

/// Root configuration structure
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// K-means settings
    pub clustering: ClusterConfig,

    /// Autoencoder and scaling settings
    pub anomaly: AnomalyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalysisError::Config(format!("Failed to read config file: {}", e))
        })?;
        let mut config = Self::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AnalysisError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to a TOML string
    pub fn to_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Generate default config file content with comments
    pub fn default_with_comments() -> &'static str {
        DEFAULT_CONFIG
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - CAPSIFT_SEED (clustering and anomaly seed)
    /// - CAPSIFT_EPOCHS
    /// - CAPSIFT_LOG_LEVEL
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CAPSIFT_SEED") {
            if let Ok(seed) = v.parse() {
                self.clustering.seed = seed;
                self.anomaly.seed = seed;
            }
        }
        if let Some(v) = lookup("CAPSIFT_EPOCHS") {
            self.anomaly.autoencoder.epochs = v.parse().unwrap_or(self.anomaly.autoencoder.epochs);
        }
        if let Some(v) = lookup("CAPSIFT_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Reject settings the models cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.clustering.max_iterations == 0 {
            return Err(AnalysisError::Config(
                "clustering.max_iterations must be positive".to_string(),
            ));
        }
        if self.clustering.tolerance < 0.0 {
            return Err(AnalysisError::Config(format!(
                "clustering.tolerance must not be negative, got {}",
                self.clustering.tolerance
            )));
        }
        self.anomaly.validate()
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# capsift configuration

[clustering]
# Maximum Lloyd iterations per batch
max_iterations = 300
# Stop when centroids move less than this fraction of the data variance
tolerance = 1e-4
seed = 42

[anomaly]
# Hourglass of hidden layer widths, narrowest in the middle
hidden_layers = [16, 8, 4, 8, 16]
epochs = 200
learning_rate = 0.001
batch_size = 200
l2_penalty = 0.0001
# Stop after `patience` epochs improving less than `tolerance`
tolerance = 1e-4
patience = 10
# Scaled inputs are clipped to +/- clip
clip = 5.0
seed = 42

[logging]
level = "info"
"#;
