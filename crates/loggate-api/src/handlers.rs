//! Request handlers for the three surfaces.

use std::io;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::{error, trace, warn};

use crate::{IngestState, RecordState, ScrapeState};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// POST /c/{collection}/{tenant_id}
///
/// Path segments carry the same constraints the original route patterns
/// enforced; a segment that does not match is treated as an unknown
/// route, not a bad request.
pub async fn ingest_batch(
    State(state): State<IngestState>,
    Path((collection, tenant_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !valid_collection(&collection) || !valid_tenant_id(&tenant_id) {
        warn!(%collection, %tenant_id, "ingest path constraint mismatch");
        return StatusCode::NOT_FOUND.into_response();
    }

    let content_encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok());

    match state
        .pipeline
        .ingest(&tenant_id, &collection, body, content_encoding)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(error = %e, %collection, tenant = %tenant_id, "ingest request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /metrics — client-metric exposition.
pub async fn client_metrics(State(state): State<IngestState>) -> Response {
    let Some(registry) = &state.registry else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match registry.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "rendering exposition");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /record — streamed session recording.
///
/// The body is consumed as a stream for the lifetime of the connection;
/// no read deadline applies once streaming begins.
pub async fn record_session(State(state): State<RecordState>, request: Request) -> Response {
    trace!("starting session recording");
    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(io::Error::other);
    let mut reader = tokio::io::BufReader::new(StreamReader::new(stream));

    match state.recorder.record(&mut reader).await {
        Ok(_) => {
            trace!("session recording finished");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!(error = %e, "recording session");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /metrics on the scrape listener — federated peer exposition.
pub async fn peer_metrics(State(state): State<ScrapeState>) -> Response {
    let body = state.aggregator.gather().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Fallback for every router.
pub async fn not_found(uri: Uri) -> StatusCode {
    warn!(%uri, "unknown path called");
    StatusCode::NOT_FOUND
}

fn valid_collection(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn valid_tenant_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}
