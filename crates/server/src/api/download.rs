//! Artifact download with single-range resume support.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};
use trailforge_core::ArtifactError;

use super::handlers::ErrorResponse;
use crate::metrics::ARTIFACT_TRANSFERS_TOTAL;
use crate::state::AppState;

/// GET /api/download/{job_id}/{filename}
///
/// Full transfer (200) without a `Range` header, partial (206) with one.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((job_id, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    // A non-ASCII header value can never be a valid range.
    let range = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());

    let download = match state.artifacts().open(&job_id, &filename, range).await {
        Ok(download) => download,
        Err(e) => {
            ARTIFACT_TRANSFERS_TOTAL.with_label_values(&["rejected"]).inc();
            return artifact_error_response(e);
        }
    };

    let (status, kind) = match download.range {
        Some(_) => (StatusCode::PARTIAL_CONTENT, "partial"),
        None => (StatusCode::OK, "full"),
    };
    ARTIFACT_TRANSFERS_TOTAL.with_label_values(&[kind]).inc();
    debug!(%job_id, "Sending {} ({})", download.filename, kind);

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, download.content_length())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.filename),
        );
    if let Some(content_range) = download.content_range() {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    match builder.body(Body::from_stream(download.body)) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build download response: {}", e);
            ErrorResponse::with_status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn artifact_error_response(err: ArtifactError) -> Response {
    let status = match &err {
        ArtifactError::InvalidFilename { .. } | ArtifactError::InvalidJobId(_) => {
            StatusCode::BAD_REQUEST
        }
        ArtifactError::NotFound { .. } => StatusCode::NOT_FOUND,
        ArtifactError::Range(range) => {
            let body = Json(ErrorResponse::new(range.to_string()));
            return match range.content_range() {
                Some(content_range) => (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, content_range)],
                    body,
                )
                    .into_response(),
                None => (StatusCode::RANGE_NOT_SATISFIABLE, body).into_response(),
            };
        }
        ArtifactError::Io(e) => {
            error!("Failed to read artifact: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    ErrorResponse::with_status(status, err.to_string())
}
