//! Dorama catalog API handlers.
//!
//! Lifecycle calls are what a client issues when the catalog view becomes
//! visible (start/resume) or hidden (pause).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dorama_core::{AccessLevel, ControllerStatus, LifecycleError, LifecycleState, Page};

use super::middleware::Access;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// 1-based page number; missing or 0 means the first page.
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    #[serde(flatten)]
    pub page: Page,
    pub page_count: usize,
    pub state: LifecycleState,
}

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub state: LifecycleState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Read one page of the accumulated list. Never starts a harvest.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Access(access): Access,
    Query(query): Query<PageQuery>,
) -> Json<PageResponse> {
    let controller = state.controller();
    let mut page = controller.page(query.page.unwrap_or(1));
    let page_count = page.page_count();

    if !access.has_access() {
        page = page.preview(state.preview_items());
    }

    Json(PageResponse {
        page,
        page_count,
        state: controller.state().await,
    })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller().status().await)
}

pub async fn start(State(state): State<Arc<AppState>>) -> Json<LifecycleResponse> {
    let new_state = state.controller().start().await;
    state.ws_broadcaster().lifecycle_changed(new_state);
    Json(LifecycleResponse { state: new_state })
}

pub async fn pause(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LifecycleResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = state.controller().pause().await;
    transition_response(&state, result)
}

pub async fn resume(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LifecycleResponse>, (StatusCode, Json<ErrorResponse>)> {
    let result = state.controller().resume().await;
    transition_response(&state, result)
}

/// Give up on a paused run. Requires full access.
pub async fn abandon(
    State(state): State<Arc<AppState>>,
    Access(access): Access,
) -> Result<Json<LifecycleResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_access(access, "abandon")?;
    let result = state.controller().abandon().await;
    transition_response(&state, result)
}

/// Drop the cache and harvest again from scratch. Requires full access.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Access(access): Access,
) -> Result<Json<LifecycleResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_access(access, "refresh")?;
    let new_state = state.controller().refresh().await;
    state.ws_broadcaster().lifecycle_changed(new_state);
    Ok(Json(LifecycleResponse { state: new_state }))
}

fn require_access(
    access: AccessLevel,
    operation: &str,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if access.has_access() {
        return Ok(());
    }
    Err((
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            error: format!("{} requires an API key", operation),
        }),
    ))
}

fn transition_response(
    state: &AppState,
    result: Result<LifecycleState, LifecycleError>,
) -> Result<Json<LifecycleResponse>, (StatusCode, Json<ErrorResponse>)> {
    match result {
        Ok(new_state) => {
            state.ws_broadcaster().lifecycle_changed(new_state);
            Ok(Json(LifecycleResponse { state: new_state }))
        }
        Err(e) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
