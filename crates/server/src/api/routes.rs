use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{access_middleware, metrics_middleware};
use super::{doramas, handlers, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Accumulated catalog
        .route("/doramas", get(doramas::list))
        .route("/doramas/status", get(doramas::status))
        // Lifecycle
        .route("/doramas/start", post(doramas::start))
        .route("/doramas/pause", post(doramas::pause))
        .route("/doramas/resume", post(doramas::resume))
        .route("/doramas/abandon", post(doramas::abandon))
        .route("/doramas/refresh", post(doramas::refresh))
        // Live progress
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
