//! Liveness endpoint.

use axum::{extract::State, Json};
use tracing::instrument;

use crate::api::middleware::error::ApiError;
use crate::api::models::HealthResponse;
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Store reachable", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = crate::api::models::ErrorResponse)
    ),
    tag = "Health"
)]
/// Reports liveness and the number of stored transfers.
///
/// There is no degraded state: if the count cannot be read the request fails.
/// Ingestion errors do not affect this endpoint.
#[instrument(skip(state))]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let events_collected = state.store.count().await?;

    Ok(Json(HealthResponse {
        ok: true,
        events_collected,
    }))
}
