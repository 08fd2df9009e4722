//! Content-encoded JSON response bodies.

use std::io::{self, Write};

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use ix_encoding::Encoders;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Serialize `value` as newline-terminated JSON, compressed as the request's
/// `Accept-Encoding` asks.
///
/// The encoded writer is closed on every path. Nothing is sent before the
/// whole body is encoded, so a serialization failure still turns into a
/// clean `encoding-error` response.
pub fn encoded_json<T: Serialize>(
    encoders: &Encoders,
    request: &HeaderMap,
    status: StatusCode,
    value: &T,
) -> Result<Response, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let mut out = encoders.select_for(request, &mut headers, Vec::new());

    let written = serde_json::to_writer(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|()| out.write_all(b"\n"));
    let closed = out.close();

    if let Err(err) = written {
        if let Err(close_err) = closed {
            debug!(error = %close_err, "closing encoder after failed serialization");
        }
        return Err(ApiError::encoding(format!(
            "failed to encode response: {err}"
        )));
    }
    let body = closed.map_err(|err| {
        warn!(error = %err, "finishing encoded response failed");
        ApiError::encoding(format!("failed to finish response encoding: {err}"))
    })?;

    Ok((status, headers, Body::from(body)).into_response())
}
