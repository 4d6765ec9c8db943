use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all CVR endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/deployments", post(handler::create_deployment_handler))
        .route("/v1/deployments/:id", get(handler::deployment_handler))
        .route(
            "/v1/owners/:owner/deployments",
            get(handler::owner_deployments_handler),
        )
        .route(
            "/v1/owners/:owner/repositories",
            get(handler::repositories_handler),
        )
        .route(
            "/v1/owners/:owner/repositories/:repository/deployments",
            get(handler::repository_deployments_handler),
        )
        .route(
            "/v1/owners/:owner/repositories/:repository/stats",
            get(handler::repository_stats_handler),
        )
        .route("/v1/payloads/:hash", get(handler::payload_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
