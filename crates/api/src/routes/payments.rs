//! Payment order state routes: abonos and payment dates.

use axum::{
    Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::{Local, NaiveDate};
use obrafin_core::payment::{AbonoInput, PaymentStatus};
use obrafin_core::records::PartialPayment;
use obrafin_db::repositories::{AbonoReceipt, BatchClearReport};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiResult};

/// Creates the payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-orders/{orden}/state", get(get_payment_state))
        .route(
            "/payment-orders/{orden}/abonos",
            get(list_abonos).post(record_abono),
        )
        .route("/abonos/{id}", delete(delete_abono))
        .route(
            "/payment-orders/{orden}/payment-date",
            put(set_payment_date).delete(clear_payment_date),
        )
        .route(
            "/payment-orders/payment-date/clear",
            post(clear_payment_dates),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for setting a payment date.
#[derive(Debug, Deserialize)]
pub struct SetPaymentDateRequest {
    /// Date the order was paid in full.
    pub fecha_pago: NaiveDate,
}

/// Response of a single clear.
#[derive(Debug, Serialize)]
pub struct ClearPaymentDateResponse {
    /// Payment order number.
    pub orden_numero: i64,
    /// Whether a date was removed.
    pub cleared: bool,
}

/// Request body for a batch clear.
#[derive(Debug, Deserialize)]
pub struct BatchClearRequest {
    /// Payment order numbers.
    pub ordenes: Vec<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_payment_state(
    State(state): State<AppState>,
    orden: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<PaymentStatus>> {
    let Path(orden) = orden?;
    Ok(Json(state.payments.get_payment_state(orden).await?))
}

async fn list_abonos(
    State(state): State<AppState>,
    orden: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<PartialPayment>>> {
    let Path(orden) = orden?;
    Ok(Json(state.payments.list_abonos(orden).await?))
}

async fn record_abono(
    State(state): State<AppState>,
    orden: Result<Path<i64>, PathRejection>,
    input: Result<Json<AbonoInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AbonoReceipt>)> {
    let Path(orden) = orden?;
    let Json(input) = input?;
    let receipt = state.payments.record_partial_payment(orden, &input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn delete_abono(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<PaymentStatus>> {
    let Path(id) = id?;
    Ok(Json(state.payments.delete_partial_payment(id).await?))
}

async fn set_payment_date(
    State(state): State<AppState>,
    orden: Result<Path<i64>, PathRejection>,
    request: Result<Json<SetPaymentDateRequest>, JsonRejection>,
) -> ApiResult<Json<PaymentStatus>> {
    let Path(orden) = orden?;
    let Json(request) = request?;
    let today = Local::now().date_naive();
    let status = state
        .payments
        .set_payment_date(orden, request.fecha_pago, today)
        .await?;
    Ok(Json(status))
}

async fn clear_payment_date(
    State(state): State<AppState>,
    orden: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<ClearPaymentDateResponse>> {
    let Path(orden) = orden?;
    let cleared = state.payments.clear_payment_date(orden).await?;
    Ok(Json(ClearPaymentDateResponse {
        orden_numero: orden,
        cleared,
    }))
}

async fn clear_payment_dates(
    State(state): State<AppState>,
    request: Result<Json<BatchClearRequest>, JsonRejection>,
) -> ApiResult<Json<BatchClearReport>> {
    let Json(request) = request?;
    Ok(Json(state.payments.clear_payment_dates(&request.ordenes).await?))
}
