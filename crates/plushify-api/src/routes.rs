//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::admin::{get_account, grant_credits};
use crate::handlers::credits::{get_credit_history, get_credits, get_me, purchase_credits};
use crate::handlers::generations::{
    delete_generation, get_image_urls, list_generations, record_generation, toggle_favorite,
};
use crate::handlers::health::{health, ready};
use crate::handlers::uploads::presign_upload;
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let generation_routes = Router::new()
        // Record a paid-for generation (the credit transaction)
        .route("/generations", post(record_generation))
        // Gallery
        .route("/generations", get(list_generations))
        .route("/generations/:id/favorite", post(toggle_favorite))
        .route("/generations/:id/image-urls", get(get_image_urls))
        .route("/generations/:id", delete(delete_generation));

    let credit_routes = Router::new()
        .route("/me", get(get_me))
        .route("/credits", get(get_credits))
        .route("/credits/history", get(get_credit_history))
        .route("/credits/purchase", post(purchase_credits));

    let upload_routes = Router::new().route("/uploads/presign", post(presign_upload));

    // Admin routes for support and corrections (admin role only)
    let admin_routes = Router::new()
        .route("/admin/users/:uid", get(get_account))
        .route("/admin/users/:uid/credits", post(grant_credits));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(generation_routes)
        .merge(credit_routes)
        .merge(upload_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

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
        .merge(health_routes)
        .merge(metrics_routes)
        // Request body size limit: image bytes never pass through the API
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
