//! HTTP rendering of [`AppError`].

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use obrafin_db::StoreError;
use obrafin_db::repositories::{BudgetRepoError, PaymentRepoError};
use obrafin_shared::AppError;
use serde_json::json;

/// Handler error: an [`AppError`] rendered as a JSON body.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Result type of the route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// A 400 for a malformed request parameter.
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.public_message(),
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<BudgetRepoError> for ApiError {
    fn from(err: BudgetRepoError) -> Self {
        Self(err.into())
    }
}

impl From<PaymentRepoError> for ApiError {
    fn from(err: PaymentRepoError) -> Self {
        Self(err.into())
    }
}
