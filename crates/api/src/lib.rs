//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes over the budget, payment and dashboard repositories
//! - JSON error responses
//! - Request tracing, CORS and a request timeout

pub mod error;
pub mod params;
pub mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use obrafin_db::{
    BudgetRepository, DashboardRepository, Datastore, PaymentRepository, QueryCache, StoreHandle,
};
use obrafin_shared::AppConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Budget matrix and budget writes.
    pub budgets: BudgetRepository,
    /// Payment order state.
    pub payments: PaymentRepository,
    /// Fleet-wide KPIs.
    pub dashboard: DashboardRepository,
    /// Reference data cache, shared with the store decorator.
    pub cache: Arc<QueryCache>,
    /// Debt evolution points when the request does not say.
    pub evolution_months: u32,
}

impl AppState {
    /// Builds the repositories over `store`.
    pub fn new(store: Arc<dyn Datastore>, cache: Arc<QueryCache>, config: &AppConfig) -> Self {
        let handle = StoreHandle::new(store, &config.datastore);
        Self {
            budgets: BudgetRepository::new(handle.clone()),
            payments: PaymentRepository::new(handle.clone(), config.payments.max_days_ahead),
            dashboard: DashboardRepository::new(handle),
            cache,
            evolution_months: config.dashboard.evolution_months,
        }
    }
}

/// Creates the main application router.
#[allow(deprecated)]
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
