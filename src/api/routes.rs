use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{connection, metadata, mirror, query, AppState};

/// Create router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/remote/connect", post(connection::connect_remote))
        .route("/api/tables/remote", get(metadata::list_remote_tables))
        .route("/api/tables/local", get(metadata::list_local_tables))
        .route("/api/mirror", post(mirror::run_mirror))
        .route("/api/query", post(query::execute_query))
        .route("/api/query/chain", post(query::execute_chain))
        .route("/api/cells/update", post(query::update_cell))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
