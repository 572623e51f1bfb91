//! Route table and middleware stack

use std::path::Path;

use axum::{middleware, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::monitor;
use crate::state::AppState;

pub fn create_router(state: AppState, static_root: &Path) -> Router {
    let monitor_handle = state.monitor.clone();

    Router::new()
        .route("/api/zaif/1/oldstream/:pair", get(handlers::stream::oldstream))
        .route("/api/zaif/1/lastprice/:pair", get(handlers::stream::lastprice))
        .route("/api/zaif/1/depth/:pair", get(handlers::market::depth))
        .route("/api/zaif/1/ticks/:pair", get(handlers::market::ticks))
        .route("/api/unko.in/1/monitor", get(handlers::monitor::summary))
        .fallback_service(ServeDir::new(static_root))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            monitor_handle,
            monitor::track_responses,
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
