//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{frames_preview, health, ready, serve_artifact, trim_video, upload_video};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // JSON processing routes
    let job_routes = Router::new()
        .route("/frames-preview", post(frames_preview))
        .route("/trim-video", post(trim_video))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size));

    // Uploads stream straight to disk, so they get their own (much larger) limit
    let upload_routes = Router::new()
        .route("/upload-video", post(upload_video))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size));

    let api_routes = Router::new().merge(job_routes).merge(upload_routes);

    let artifact_routes = Router::new().route("/artifacts/*path", get(serve_artifact));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(artifact_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
