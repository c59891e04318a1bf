//! capsift: packet capture triage
//!
//! Reads Ethernet frames, extracts a fixed per-packet feature vector and
//! runs two unsupervised passes over the numeric features: k-means
//! clustering and autoencoder reconstruction-error anomaly flags.
//!
//! ```ignore
//! use capsift::{capture::read_capture_file, Analyzer};
//!
//! let frames = read_capture_file("trace.pcap")?;
//! let result = Analyzer::default().analyze(&frames)?;
//! println!("{} anomalies", result.anomaly_count());
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod ml;
pub mod pipeline;

pub use crate::config::Config;
pub use crate::core::FrameRecord;
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisResult, Analyzer, DetailedAnalysis};
