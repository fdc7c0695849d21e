pub mod config;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};

use handlers::{
    cors_layer, create_api_router, health_check, metrics_handler, request_validation_middleware,
    root, security_headers_middleware, AppState, RequestLimits,
};
use observability::observability_middleware;

pub use config::{Config, ConfigError, ParameterStoreConfig};
pub use observability::{init_observability, shutdown_observability, Metrics};

/// Build the full application router
pub fn create_app(state: AppState, limits: RequestLimits) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/", get(root))
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(create_api_router(state.clone()))
        // Add middleware layers (the last one added runs first)
        .layer(DefaultBodyLimit::max(limits.max_request_size))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn_with_state(
            limits,
            request_validation_middleware,
        ))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics.clone(), req, next)
        }))
        .layer(cors_layer())
        .with_state(state)
}
