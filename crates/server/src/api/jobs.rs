//! Job submission and status polling.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trailforge_core::{BoundingBox, QueueError, TaskState};

use super::handlers::ErrorResponse;
use crate::metrics::{BBOX_REJECTIONS_TOTAL, JOBS_SUBMITTED_TOTAL};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub bbox: BoundingBox,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: String,
}

/// Status as reported to pollers. Only the fields relevant to `status` are set.
#[derive(Debug, Default, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TaskState> for StatusResponse {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => Self {
                status: "queued".to_string(),
                ..Default::default()
            },
            TaskState::Progress { stage, step } => Self {
                status: "processing".to_string(),
                stage: Some(stage.to_string()),
                progress: Some(step),
                ..Default::default()
            },
            TaskState::Success { artifact } => Self {
                status: "completed".to_string(),
                filename: Some(artifact.filename),
                file_size: Some(artifact.size),
                ..Default::default()
            },
            TaskState::Failure { error, .. } => Self {
                status: "failed".to_string(),
                error: Some(error),
                ..Default::default()
            },
            TaskState::Other(raw) => Self {
                status: raw.to_lowercase(),
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/generate
///
/// Validates the bounding box and enqueues a map job for it.
///
/// Edges given in either order are accepted and stored south-west first.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            BBOX_REJECTIONS_TOTAL.inc();
            return ErrorResponse::with_status(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let area = match request.bbox.validate(state.limits()) {
        Ok(area) => area,
        Err(e) => {
            BBOX_REJECTIONS_TOTAL.inc();
            return ErrorResponse::with_status(StatusCode::BAD_REQUEST, e.to_string());
        }
    };
    let bbox = request.bbox.normalized();

    match state.queue().enqueue(bbox).await {
        Ok(job_id) => {
            JOBS_SUBMITTED_TOTAL.inc();
            info!(%job_id, "Queued map job for {:?} ({:.4} deg²)", bbox, area);
            Json(GenerateResponse {
                job_id,
                status: "queued".to_string(),
            })
            .into_response()
        }
        Err(e) => {
            warn!("Failed to enqueue job: {}", e);
            ErrorResponse::with_status(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// GET /api/status/{job_id}
pub async fn status(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> Response {
    match state.queue().get_state(&job_id).await {
        Ok(task) => Json(StatusResponse::from(task)).into_response(),
        Err(QueueError::NotFound(_)) => {
            ErrorResponse::with_status(StatusCode::NOT_FOUND, format!("Job not found: {}", job_id))
        }
        Err(e) => ErrorResponse::with_status(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
