use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A container image manifest submitted for indexing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub hash: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// One layer of a manifest, fetched by the indexer from `uri`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub hash: String,
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
}

/// Result of indexing a manifest.
///
/// Only the envelope is typed; the findings themselves are carried opaquely
/// in `details` and serialized back out unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexReport {
    pub manifest_hash: String,
    pub state: String,
    pub success: bool,
    #[serde(default)]
    pub err: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl IndexReport {
    pub fn finished(manifest_hash: impl Into<String>) -> Self {
        Self {
            manifest_hash: manifest_hash.into(),
            state: "IndexFinished".into(),
            success: true,
            err: String::new(),
            details: serde_json::Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}
