//! Indexer HTTP transport (Axum).
//!
//! Exposes manifest submission, index report lookup and the indexer state
//! token. Report bodies are compressed according to the client's
//! `Accept-Encoding` through the pooled encoders in `ix-encoding`.

pub mod body;
pub mod error;
pub mod memory;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use ix_core::{IndexerConfig, Service};
use ix_encoding::Encoders;
use state::AppState;
use tracing::info;

pub const INDEX_API_PATH: &str = "/api/v1/index";
pub const INDEX_REPORT_API_PATH: &str = "/api/v1/index_report/";
pub const STATE_API_PATH: &str = "/api/v1/state";

/// Build the application router over an in-memory service.
pub fn app() -> Router {
    app_with_state(AppState::new(Arc::new(memory::MemoryService::new())))
}

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::index_routes())
        .merge(routes::state_routes())
        .with_state(state)
}

/// Bind `config.server` and serve until the listener fails.
pub async fn serve(config: &IndexerConfig, service: Arc<dyn Service>) -> ix_core::Result<()> {
    config.validate()?;
    let state = AppState::with_encoders(service, Encoders::new(&config.encoding));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %listener.local_addr()?, "indexer http transport listening");
    axum::serve(listener, app_with_state(state)).await?;
    Ok(())
}
