use serde::{Deserialize, Serialize};

use crate::error::{IxError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub server: ServerConfig,
    pub encoding: EncodingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tuning for the response compressor pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Idle compressors kept per scheme; extras are dropped on return.
    pub max_idle_per_scheme: usize,
    /// Scratch buffer size for deflate output, in bytes.
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            max_idle_per_scheme: 64,
            buffer_size: 32 * 1024,
        }
    }
}

impl IndexerConfig {
    /// Parse a JSON document; missing sections fall back to defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.encoding.buffer_size < 64 {
            return Err(IxError::Config(format!(
                "encoding.buffer_size must be at least 64 bytes, got {}",
                self.encoding.buffer_size
            )));
        }
        if self.encoding.max_idle_per_scheme == 0 {
            return Err(IxError::Config(
                "encoding.max_idle_per_scheme must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
