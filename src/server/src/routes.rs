//! Route definitions

use crate::{handlers, state::AppState};
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the application router
///
/// - `GET /` runs a crawl and loads the result
/// - `GET /_ah/health` liveness probe
/// - `GET /metrics` Prometheus metrics
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::run_crawl))
        .route("/_ah/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
