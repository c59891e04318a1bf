//! Machine Learning / Triage Engine
//!
//! Turns decoded frames into feature vectors and runs the unsupervised
//! models over their numeric subset.
//!
//! # Features
//! - Fixed-schema feature extraction and protocol counters
//! - K-means clustering with a fixed cluster count
//! - Autoencoder reconstruction error with a percentile threshold
//!
//! # Example
//! ```ignore
//! use capsift::ml::{AnomalyScorer, FeatureExtractor, KMeans, numeric_matrix};
//!
//! let (vectors, summary) = FeatureExtractor::new().extract(&frames);
//! let matrix = numeric_matrix(&vectors);
//! let clusters = KMeans::default().fit(&matrix);
//! let report = AnomalyScorer::default().score(&matrix)?;
//! ```

pub mod anomaly;
pub mod features;
pub mod models;
pub mod normalization;
pub mod threshold;

pub use anomaly::{AnomalyConfig, AnomalyReport, AnomalyScorer};
pub use features::{
    numeric_matrix, FeatureExtractor, FeatureVector, NumericRow, ProtocolCounts, ProtocolSummary,
    FEATURE_NAMES, NUMERIC_FEATURES, NUM_FEATURES,
};
pub use models::{ClusterConfig, Clustering, KMeans, ReconstructionModel, CLUSTER_COUNT};
pub use normalization::RobustScaler;
pub use threshold::ANOMALY_PERCENTILE;
