//! Place-name search proxy.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::warn;
use trailforge_core::GeocodeError;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
    #[serde(default)]
    pub q: String,
}

/// GET /api/geocode?q=
///
/// Returns the geocoder's JSON answer unchanged.
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeParams>,
) -> Response {
    let query = params.q.trim();
    if query.is_empty() {
        return ErrorResponse::with_status(StatusCode::BAD_REQUEST, "Missing query parameter 'q'");
    }

    match state.geocoder().search(query).await {
        Ok(result) => Json(result).into_response(),
        Err(GeocodeError::EmptyQuery) => {
            ErrorResponse::with_status(StatusCode::BAD_REQUEST, GeocodeError::EmptyQuery.to_string())
        }
        Err(e) => {
            warn!("Geocoding '{}' failed: {}", query, e);
            ErrorResponse::with_status(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
