//! Payment state rules.
//!
//! The service only decides; reading the signals and applying the decision
//! under the per-order lock belongs to the persistence layer.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use super::error::PaymentError;
use super::types::{AbonoDecision, DateAction, PaymentSnapshot};
use crate::records::DateOrigin;

/// Payment service for business logic.
pub struct PaymentService;

impl PaymentService {
    /// Validates an abono against the order's current signals.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` if `amount` is not positive.
    /// Returns `PaymentError::OrderNotFound` if the order has no lines.
    /// Returns `PaymentError::OverPayment` if the abonos would exceed the
    /// order total.
    pub fn validate_partial_payment(
        snapshot: &PaymentSnapshot,
        amount: Decimal,
    ) -> Result<AbonoDecision, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }
        if !snapshot.exists() {
            return Err(PaymentError::OrderNotFound(snapshot.orden_numero));
        }

        let new_total = snapshot.total_abonado + amount;
        if new_total > snapshot.total_amount {
            return Err(PaymentError::OverPayment {
                orden_numero: snapshot.orden_numero,
                total: snapshot.total_amount,
                abonado: snapshot.total_abonado,
                amount,
            });
        }

        Ok(AbonoDecision {
            new_total,
            completes_order: new_total == snapshot.total_amount,
        })
    }

    /// Decides the fate of the payment date after an abono was deleted.
    ///
    /// `snapshot` holds the signals re-read after the delete. With no abonos
    /// left any date goes; with a partial sum only a date that was not set
    /// manually goes.
    #[must_use]
    pub fn after_abono_removed(snapshot: &PaymentSnapshot) -> DateAction {
        if snapshot.payment_date.is_none() {
            return DateAction::Keep;
        }
        if snapshot.total_abonado <= Decimal::ZERO {
            return DateAction::Delete;
        }
        if snapshot.total_abonado < snapshot.total_amount
            && snapshot.date_origin != Some(DateOrigin::Manual)
        {
            return DateAction::Delete;
        }
        DateAction::Keep
    }

    /// Latest payment date accepted on `today`.
    #[must_use]
    pub fn latest_payment_date(today: NaiveDate, max_days_ahead: i64) -> NaiveDate {
        let days = Days::new(u64::try_from(max_days_ahead).unwrap_or_default());
        today.checked_add_days(days).unwrap_or(NaiveDate::MAX)
    }

    /// Validates setting a payment date directly.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::FutureDate` if `date` is more than
    /// `max_days_ahead` days after `today`.
    /// Returns `PaymentError::OrderNotFound` if the order has no lines.
    pub fn validate_payment_date(
        snapshot: &PaymentSnapshot,
        date: NaiveDate,
        today: NaiveDate,
        max_days_ahead: i64,
    ) -> Result<(), PaymentError> {
        let limit = Self::latest_payment_date(today, max_days_ahead);
        if date > limit {
            return Err(PaymentError::FutureDate { date, limit });
        }
        if !snapshot.exists() {
            return Err(PaymentError::OrderNotFound(snapshot.orden_numero));
        }
        Ok(())
    }

    /// Validates clearing the payment date; returns whether there is a date
    /// row to delete.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order has no lines.
    /// Returns `PaymentError::ClearRefused` if the abonos cover the total,
    /// since the order would still be paid without its date.
    pub fn validate_clear(snapshot: &PaymentSnapshot) -> Result<bool, PaymentError> {
        if !snapshot.exists() {
            return Err(PaymentError::OrderNotFound(snapshot.orden_numero));
        }
        if snapshot.total_abonado >= snapshot.total_amount {
            return Err(PaymentError::ClearRefused {
                orden_numero: snapshot.orden_numero,
                total: snapshot.total_amount,
                abonado: snapshot.total_abonado,
            });
        }
        Ok(snapshot.payment_date.is_some())
    }
}
