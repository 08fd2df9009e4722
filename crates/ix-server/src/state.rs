//! Application state shared across all handlers.

use std::sync::Arc;

use ix_core::Service;
use ix_encoding::Encoders;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn Service>,
    pub encoders: Encoders,
}

impl AppState {
    /// State backed by the process-wide compressor pools.
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self::with_encoders(service, Encoders::global().clone())
    }

    pub fn with_encoders(service: Arc<dyn Service>, encoders: Encoders) -> Self {
        Self { service, encoders }
    }
}
