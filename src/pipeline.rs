//! Analysis pipeline
//!
//! Runs feature extraction once, then clustering and anomaly scoring over
//! the same ordered batch. Index `i` of every output sequence describes the
//! same packet.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::core::FrameRecord;
use crate::error::Result;
use crate::ml::{
    numeric_matrix, AnomalyConfig, AnomalyReport, AnomalyScorer, ClusterConfig, Clustering,
    FeatureExtractor, FeatureVector, KMeans, ProtocolSummary,
};

/// Result of one analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Cluster id per packet
    #[serde(rename = "kmeans_labels")]
    pub labels: Vec<usize>,
    /// Anomaly flag per packet
    pub anomalies: Vec<bool>,
    /// Feature vector per packet
    #[serde(rename = "ethernet_headers")]
    pub vectors: Vec<FeatureVector>,
    pub summary: ProtocolSummary,
}

impl AnalysisResult {
    pub fn packet_count(&self) -> usize {
        self.vectors.len()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.iter().filter(|&&a| a).count()
    }

    /// Flagged packets with their index and cluster
    pub fn flagged(&self) -> impl Iterator<Item = (usize, usize, &FeatureVector)> + '_ {
        self.anomalies
            .iter()
            .zip(&self.labels)
            .zip(&self.vectors)
            .enumerate()
            .filter(|(_, ((&flag, _), _))| flag)
            .map(|(i, ((_, &label), vector))| (i, label, vector))
    }

    /// First and last capture timestamp
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let first = self.vectors.iter().map(|v| v.timestamp).reduce(f64::min)?;
        let last = self.vectors.iter().map(|v| v.timestamp).reduce(f64::max)?;
        Some((first, last))
    }
}

/// Analysis result together with the model diagnostics behind it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailedAnalysis {
    pub result: AnalysisResult,
    pub clustering: Option<Clustering>,
    pub anomaly: AnomalyReport,
}

/// Packet triage pipeline
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    extractor: FeatureExtractor,
    kmeans: KMeans,
    scorer: AnomalyScorer,
}

impl Analyzer {
    pub fn new(clustering: ClusterConfig, anomaly: AnomalyConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            kmeans: KMeans::new(clustering),
            scorer: AnomalyScorer::new(anomaly),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.clustering.clone(), config.anomaly.clone())
    }

    /// Analyze a batch of frames
    pub fn analyze(&self, frames: &[FrameRecord]) -> Result<AnalysisResult> {
        self.analyze_detailed(frames).map(|detailed| detailed.result)
    }

    /// Analyze a batch and keep centroids, errors and threshold
    pub fn analyze_detailed(&self, frames: &[FrameRecord]) -> Result<DetailedAnalysis> {
        let (vectors, summary) = self.extractor.extract(frames);

        if vectors.is_empty() {
            info!("No Ethernet frames in {} input frames", frames.len());
            return Ok(DetailedAnalysis {
                result: AnalysisResult {
                    summary,
                    ..Default::default()
                },
                ..Default::default()
            });
        }

        let matrix = numeric_matrix(&vectors);
        let clustering = self.kmeans.fit(&matrix);
        let anomaly = self.scorer.score(&matrix)?;

        let result = AnalysisResult {
            labels: clustering.labels.clone(),
            anomalies: anomaly.flags.clone(),
            vectors,
            summary,
        };

        info!(
            "Analyzed {} packets: {} clusters, {} anomalies",
            result.packet_count(),
            clustering.centroids.len(),
            result.anomaly_count()
        );

        Ok(DetailedAnalysis {
            result,
            clustering: Some(clustering),
            anomaly,
        })
    }
}
