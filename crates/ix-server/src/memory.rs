//! In-memory `Service` used for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use ix_core::{IndexReport, IxError, Manifest, Result, Service};
use parking_lot::RwLock;
use serde_json::json;

/// Reports keyed by manifest hash. The state token is fixed for the
/// lifetime of the service.
pub struct MemoryService {
    reports: RwLock<HashMap<String, IndexReport>>,
    state: String,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::with_state(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn with_state(state: impl Into<String>) -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
            state: state.into(),
        }
    }

    /// Seed a report as if its manifest had been indexed.
    pub fn insert(&self, report: IndexReport) {
        self.reports.write().insert(report.manifest_hash.clone(), report);
    }

    pub fn count(&self) -> usize {
        self.reports.read().len()
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for MemoryService {
    async fn index(&self, manifest: Manifest) -> Result<IndexReport> {
        if manifest.hash.trim().is_empty() {
            return Err(IxError::InvalidManifest("manifest hash is empty".into()));
        }
        if let Some(existing) = self.reports.read().get(&manifest.hash) {
            return Ok(existing.clone());
        }

        let layers: Vec<&str> = manifest.layers.iter().map(|l| l.hash.as_str()).collect();
        let report = IndexReport::finished(&manifest.hash).with_detail("layers", json!(layers));
        self.reports
            .write()
            .entry(manifest.hash.clone())
            .or_insert(report.clone());
        Ok(report)
    }

    async fn index_report(&self, manifest_hash: &str) -> Result<Option<IndexReport>> {
        Ok(self.reports.read().get(manifest_hash).cloned())
    }

    async fn state(&self) -> String {
        self.state.clone()
    }
}
