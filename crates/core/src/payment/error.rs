//! Payment error types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors of the payment state operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// Abono amount is zero or negative.
    #[error("Abono amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// Abono would push the paid sum over the order total.
    #[error(
        "Abono of {amount} exceeds the balance of order {orden_numero} (total {total}, already paid {abonado})"
    )]
    OverPayment {
        /// Payment order number.
        orden_numero: i64,
        /// Order total.
        total: Decimal,
        /// Sum of existing abonos.
        abonado: Decimal,
        /// Rejected amount.
        amount: Decimal,
    },

    /// Payment date is too far in the future.
    #[error("Payment date {date} is after the allowed limit {limit}")]
    FutureDate {
        /// Requested date.
        date: NaiveDate,
        /// Latest accepted date.
        limit: NaiveDate,
    },

    /// Payment order has no lines.
    #[error("Payment order not found: {0}")]
    OrderNotFound(i64),

    /// Abono id does not exist.
    #[error("Abono not found: {0}")]
    AbonoNotFound(i64),

    /// Order is fully covered by abonos; its date cannot be cleared.
    #[error(
        "Payment date of order {orden_numero} cannot be cleared: abonos ({abonado}) cover the total ({total})"
    )]
    ClearRefused {
        /// Payment order number.
        orden_numero: i64,
        /// Order total.
        total: Decimal,
        /// Sum of abonos.
        abonado: Decimal,
    },
}
