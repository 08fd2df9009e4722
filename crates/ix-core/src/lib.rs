pub mod config;
pub mod error;
pub mod service;
pub mod types;

pub use config::{EncodingConfig, IndexerConfig, ServerConfig};
pub use error::{IxError, Result};
pub use service::Service;
pub use types::{IndexReport, Layer, Manifest};
