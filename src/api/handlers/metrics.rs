//! Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::middleware::error::ApiError;
use crate::app_state::AppState;

/// Content type of the OpenMetrics text exposition format.
pub const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Metrics in OpenMetrics text format", content_type = "application/openmetrics-text")
    ),
    tag = "Metrics"
)]
/// Encodes the process metrics registry.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| ApiError::InternalError(format!("Failed to encode metrics: {e}")))?;

    Ok(([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body).into_response())
}
