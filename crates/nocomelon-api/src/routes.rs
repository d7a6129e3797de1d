//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    analyze_drawing, analyze_drawing_sync, assemble_video, delete_from_library, generate_images,
    generate_pipeline, generate_presigned_url, generate_story, generate_story_sync,
    generate_voice, get_job_status, health, list_library, save_to_library, status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let generation_routes = Router::new()
        .route("/vision/analyze", post(analyze_drawing))
        .route("/vision/analyze/sync", post(analyze_drawing_sync))
        .route("/story/generate", post(generate_story))
        .route("/story/generate/sync", post(generate_story_sync))
        .route("/images/generate", post(generate_images))
        .route("/voice/generate", post(generate_voice))
        .route("/video/assemble", post(assemble_video))
        .route("/pipeline/generate", post(generate_pipeline));

    let job_routes = Router::new().route("/jobs/:run_id/status", get(get_job_status));

    let library_routes = Router::new()
        .route("/library", get(list_library).post(save_to_library))
        .route("/library/:id", delete(delete_from_library));

    let storage_routes = Router::new().route("/storage/presigned-url", post(generate_presigned_url));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .route("/status", get(status))
        .merge(generation_routes)
        .merge(job_routes)
        .merge(library_routes)
        .merge(storage_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health))
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
