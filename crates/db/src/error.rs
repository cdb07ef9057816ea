//! Conversions from repository errors into [`AppError`].

use obrafin_core::budget::BudgetError;
use obrafin_core::payment::PaymentError;
use obrafin_shared::AppError;

use crate::repositories::{BudgetRepoError, PaymentRepoError};
use crate::store::StoreError;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Datastore call failed");
        match err {
            StoreError::Timeout(_) => Self::Timeout(err.to_string()),
            StoreError::Database(_)
            | StoreError::Incomplete { .. }
            | StoreError::Decode { .. }
            | StoreError::InvalidQuery(_) => Self::Database(err.to_string()),
        }
    }
}

impl From<BudgetRepoError> for AppError {
    fn from(err: BudgetRepoError) -> Self {
        match err {
            BudgetRepoError::Budget(err @ BudgetError::ProjectNotFound(_)) => {
                Self::NotFound(err.to_string())
            }
            BudgetRepoError::Budget(err) => Self::Validation(err.to_string()),
            BudgetRepoError::Store(err) => err.into(),
        }
    }
}

fn payment_error(err: &PaymentError) -> AppError {
    match err {
        PaymentError::OrderNotFound(_) | PaymentError::AbonoNotFound(_) => {
            AppError::NotFound(err.to_string())
        }
        PaymentError::ClearRefused { .. } => AppError::BusinessRule(err.to_string()),
        PaymentError::InvalidAmount(_)
        | PaymentError::OverPayment { .. }
        | PaymentError::FutureDate { .. } => AppError::Validation(err.to_string()),
    }
}

impl From<PaymentRepoError> for AppError {
    fn from(err: PaymentRepoError) -> Self {
        match err {
            PaymentRepoError::Payment(err) => payment_error(&err),
            PaymentRepoError::Store(err) => err.into(),
        }
    }
}
