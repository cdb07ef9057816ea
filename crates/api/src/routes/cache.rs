//! Reference cache maintenance.

use axum::{Json, Router, extract::State, routing::post};
use serde::Serialize;

use crate::AppState;

/// Response of an invalidation.
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    /// Cached query results dropped.
    pub dropped: u64,
}

/// Creates the cache routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/cache/invalidate", post(invalidate_cache))
}

/// Drops every cached reference read, e.g. after projects or items were
/// edited outside this service.
async fn invalidate_cache(State(state): State<AppState>) -> Json<InvalidateResponse> {
    state.cache.run_pending_tasks();
    let dropped = state.cache.entry_count();
    state.cache.invalidate_all();
    tracing::info!(dropped, "Reference cache invalidated");
    Json(InvalidateResponse { dropped })
}
