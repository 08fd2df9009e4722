use thiserror::Error;

#[derive(Error, Debug)]
pub enum IxError {
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Index report not found: {hash}")]
    ReportNotFound { hash: String },
    #[error("Indexing failed: {0}")]
    Index(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IxError>;
