//! Payment state types.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::records::{DateOrigin, PartialPayment, PaymentDate, PaymentOrderLine};

/// Derived payment state of a payment order.
///
/// Never stored; always computed from the order lines, its abonos and its
/// payment date row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentState {
    /// Nothing paid.
    Pending,
    /// Partially paid through abonos.
    Abono,
    /// Paid in full.
    Paid,
}

impl PaymentState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Abono => "ABONO",
            Self::Paid => "PAID",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both completion signals of one payment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSnapshot {
    /// Payment order number.
    pub orden_numero: i64,
    /// Number of order lines; zero means the order does not exist.
    pub line_count: usize,
    /// Sum of the line amounts.
    pub total_amount: Decimal,
    /// Sum of the abonos.
    pub total_abonado: Decimal,
    /// Explicit payment date.
    pub payment_date: Option<NaiveDate>,
    /// How the payment date was set.
    pub date_origin: Option<DateOrigin>,
}

impl PaymentSnapshot {
    /// Builds a snapshot from the rows of one order.
    pub fn from_rows<'a>(
        orden_numero: i64,
        lines: impl IntoIterator<Item = &'a PaymentOrderLine>,
        abonos: impl IntoIterator<Item = &'a PartialPayment>,
        date: Option<&PaymentDate>,
    ) -> Self {
        let (line_count, total_amount) = lines
            .into_iter()
            .fold((0, Decimal::ZERO), |(count, sum), line| {
                (count + 1, sum + line.amount)
            });
        let date = date.filter(|d| d.paid_on.is_some());

        Self {
            orden_numero,
            line_count,
            total_amount,
            total_abonado: abonos.into_iter().map(|a| a.amount).sum(),
            payment_date: date.and_then(|d| d.paid_on),
            date_origin: date.and_then(|d| d.origin),
        }
    }

    /// Whether the order has any lines.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.line_count > 0
    }

    /// Order total minus abonos; may be negative on legacy data.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.total_amount - self.total_abonado
    }

    /// Whether the payment date was set directly by a user.
    #[must_use]
    pub fn has_manual_date(&self) -> bool {
        self.payment_date.is_some() && self.date_origin == Some(DateOrigin::Manual)
    }

    /// Derives the payment state.
    ///
    /// A manually set payment date means paid in full. Otherwise an open
    /// balance with abonos is `Abono`, a payment date or a covered balance is
    /// `Paid`, and anything else is `Pending`.
    #[must_use]
    pub fn state(&self) -> PaymentState {
        let remaining = self.remaining();

        if self.has_manual_date() {
            PaymentState::Paid
        } else if self.total_abonado > Decimal::ZERO && remaining > Decimal::ZERO {
            PaymentState::Abono
        } else if self.payment_date.is_some() || remaining <= Decimal::ZERO {
            PaymentState::Paid
        } else {
            PaymentState::Pending
        }
    }

    /// Amount still owed: zero when paid, never negative.
    #[must_use]
    pub fn balance(&self) -> Decimal {
        match self.state() {
            PaymentState::Paid => Decimal::ZERO,
            PaymentState::Pending | PaymentState::Abono => self.remaining().max(Decimal::ZERO),
        }
    }

    /// Caller-facing summary.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus {
            orden_numero: self.orden_numero,
            state: self.state(),
            total_amount: self.total_amount,
            total_abonado: self.total_abonado,
            balance: self.balance(),
            fecha_pago: self.payment_date,
            date_origin: self.date_origin,
        }
    }
}

/// Payment state of an order as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    /// Payment order number.
    pub orden_numero: i64,
    /// Derived state.
    pub state: PaymentState,
    /// Order total.
    pub total_amount: Decimal,
    /// Sum of abonos.
    pub total_abonado: Decimal,
    /// Amount still owed.
    pub balance: Decimal,
    /// Explicit payment date.
    pub fecha_pago: Option<NaiveDate>,
    /// How the payment date was set.
    pub date_origin: Option<DateOrigin>,
}

/// Outcome of a validated abono.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbonoDecision {
    /// Sum of abonos after this one.
    pub new_total: Decimal,
    /// The abono brings the order to exactly its total.
    pub completes_order: bool,
}

/// What to do with the payment date row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateAction {
    /// Leave it as is.
    Keep,
    /// Delete it.
    Delete,
}

/// A partial payment to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbonoInput {
    /// Amount paid.
    pub amount: Decimal,
    /// Payment date.
    pub date: NaiveDate,
    /// Free-text note.
    #[serde(default)]
    pub note: Option<String>,
}
