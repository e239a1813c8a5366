//! HTTP API for the reputation service
//!
//! Provides REST APIs for:
//! - Reputation administration (scores, policies, outcome ingestion)
//! - Security middleware (auth, body limits, headers, logging)

pub mod middleware;
pub mod reputation;

pub use middleware::{
    PUBLIC_PATHS, SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
    logging_middleware, mask_address, security_headers_middleware,
};
pub use reputation::{ReputationApiState, create_reputation_router};

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

/// Full application router with the security layers applied
pub fn create_app(state: ReputationApiState, security: SecurityState) -> Router {
    Router::new()
        .nest("/reputation", create_reputation_router(state))
        .route("/health", get(|| async { "OK" }))
        // Each layer wraps the ones above it
        .layer(security.body_limit())
        .layer(from_fn_with_state(security.clone(), body_size_middleware))
        .layer(from_fn_with_state(security.clone(), auth_middleware))
        .layer(from_fn_with_state(security, logging_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
}
