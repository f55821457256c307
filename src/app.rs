use std::path::Path;

use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers;
use crate::middleware::{rate_limit::rate_limit, request_log::log_request};
use crate::server::AppState;

/// Assembles the HTTP surface.
///
/// Page, ingestion and download routes share the per-client rate limit;
/// `/health` and `/static` are exempt. Every request, static files included,
/// goes through the request logger.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let limited = Router::new()
        .route("/", get(handlers::index))
        .route("/-/download/{ingest_id}", get(handlers::download))
        .route("/{owner}/{repo}", get(handlers::ingest))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(limited)
        .route("/health", get(handlers::health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(from_fn_with_state(state.clone(), log_request))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
