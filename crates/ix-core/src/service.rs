//! The indexing capability the HTTP transport fronts.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{IndexReport, Manifest};

#[async_trait]
pub trait Service: Send + Sync {
    /// Submit a manifest for indexing and return its report.
    async fn index(&self, manifest: Manifest) -> Result<IndexReport>;

    /// Fetch a previously produced report; `Ok(None)` when the hash is unknown.
    async fn index_report(&self, manifest_hash: &str) -> Result<Option<IndexReport>>;

    /// Opaque token that changes whenever previously returned reports may be stale.
    async fn state(&self) -> String;
}
