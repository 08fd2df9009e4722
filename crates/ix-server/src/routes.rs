use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{
        header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ix_core::{IxError, Manifest};

use crate::body::encoded_json;
use crate::error::ApiError;
use crate::state::AppState;
use crate::{INDEX_API_PATH, INDEX_REPORT_API_PATH, STATE_API_PATH};

pub fn index_routes() -> Router<AppState> {
    Router::new()
        .route(INDEX_API_PATH, post(index).fallback(post_only))
        .route(INDEX_REPORT_API_PATH, get(missing_hash).fallback(get_only))
        .route("/api/v1/index_report/{*hash}", get(index_report).fallback(get_only))
}

pub fn state_routes() -> Router<AppState> {
    Router::new().route(STATE_API_PATH, get(state).fallback(get_only))
}

async fn post_only() -> ApiError {
    ApiError::method_not_allowed("endpoint only allows POST")
}

async fn get_only() -> ApiError {
    ApiError::method_not_allowed("endpoint only allows GET")
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let manifest: Manifest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("failed to deserialize manifest: {e}")))?;

    let report = state.service.index(manifest).await.map_err(|e| match e {
        IxError::InvalidManifest(_) => ApiError::from(e),
        e => ApiError::index(format!("failed to start scan: {e}")),
    })?;

    encoded_json(&state.encoders, &headers, StatusCode::CREATED, &report)
}

async fn missing_hash() -> ApiError {
    ApiError::bad_request("malformed path. provide a single manifest hash")
}

async fn index_report(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(report) = state.service.index_report(&hash).await? else {
        return Err(ApiError::not_found(format!(
            "index report for manifest {hash} not found"
        )));
    };
    encoded_json(&state.encoders, &headers, StatusCode::OK, &report)
}

async fn state(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = state.service.state().await;
    let tag = format!("\"{token}\"");
    let etag = HeaderValue::from_str(&tag)
        .map_err(|_| ApiError::internal("state token is not a valid entity tag"))?;

    if etag_matches(&headers, &tag) {
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }
    // No trailing newline: the body is exactly the token.
    Ok((
        [(ETAG, etag), (CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        token,
    )
        .into_response())
}

/// Whether any `If-None-Match` entry names `tag` (weakly) or is `*`.
fn etag_matches(headers: &HeaderMap, tag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|t| t == "*" || t.strip_prefix("W/").unwrap_or(t) == tag)
}
