use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed {field} field: {reason}")]
    MalformedField { field: &'static str, reason: String },

    #[error("model training diverged: {0}")]
    ModelDiverged(String),

    #[error("invalid matrix dimension: expected {expected}, got {got}")]
    InvalidDimension { expected: usize, got: usize },

    #[error("capture error: {0}")]
    Capture(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<pcap_file::PcapError> for AnalysisError {
    fn from(e: pcap_file::PcapError) -> Self {
        AnalysisError::Capture(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
