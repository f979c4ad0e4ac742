//! Axum server setup and routing.

use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{docs::ApiDoc, handlers, middleware as api_middleware};
use crate::app_state::AppState;

/// Build the application router.
///
/// Routes:
/// - `GET /healthz`
/// - `GET /metrics`
/// - `GET /api-docs/openapi.json` and `/swagger-ui` (rate limited)
///
/// Liveness probes and metric scrapes are never rate limited.
pub fn build_router(state: AppState, rate_limit_rpm: u32, cors_origins: &[String]) -> Router {
    let limiter = api_middleware::rate_limit::create_rate_limiter(rate_limit_rpm);

    let docs: Router<AppState> = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(move |req, next| {
            api_middleware::rate_limit::rate_limit(limiter.clone(), req, next)
        }));

    let routes = Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/metrics", get(handlers::metrics::metrics))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_middleware::metrics::track_metrics,
        ));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .layer(middleware::from_fn(api_middleware::logging::log_requests));

    Router::new()
        .merge(docs)
        .merge(routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Bind the API listener on all interfaces.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API listener bound");
    Ok(listener)
}

/// Serve `router` until `shutdown` carries `true`, then drain open connections.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn run_server(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    info!("Starting API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                warn!("Shutdown channel closed; stopping API server");
            }
        })
        .await?;

    info!("API server stopped");
    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new().allow_origin(allowed)
    }
}
