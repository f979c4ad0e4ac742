//! OpenAPI documentation for the HTTP API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the HTTP API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::healthz,
        handlers::metrics::metrics,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::ErrorResponse,
    )),
    tags(
        (name = "Health", description = "Liveness and transfer count"),
        (name = "Metrics", description = "Prometheus metrics"),
    ),
    info(
        title = "Token Transfer Indexer API",
        version = "1.0.0",
        description = "Liveness and telemetry for the ERC-20 Transfer indexer",
    )
)]
pub struct ApiDoc;
