//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod budget;
pub mod cache;
pub mod dashboard;
pub mod health;
pub mod payments;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(budget::routes())
        .merge(payments::routes())
        .merge(dashboard::routes())
        .merge(cache::routes())
}
