//! Tests for payment state resolution.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::records::{DateOrigin, PartialPayment, PaymentDate, PaymentOrderLine};

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn snapshot(
    total: Decimal,
    abonado: Decimal,
    paid_on: Option<&str>,
    origin: Option<DateOrigin>,
) -> PaymentSnapshot {
    PaymentSnapshot {
        orden_numero: 500,
        line_count: 2,
        total_amount: total,
        total_abonado: abonado,
        payment_date: paid_on.map(date),
        date_origin: origin,
    }
}

fn line(orden_numero: i64, amount: Decimal) -> PaymentOrderLine {
    PaymentOrderLine {
        id: None,
        orden_numero,
        project_id: Some(1),
        supplier_id: None,
        purchase_order: None,
        item: None,
        month: None,
        amount,
        invoice_date: None,
        receipt_id: None,
        document: None,
        document_status: None,
    }
}

#[test]
fn test_snapshot_from_rows() {
    let lines = [line(9, dec!(600)), line(9, dec!(400))];
    let abonos = [PartialPayment {
        id: 1,
        orden_numero: 9,
        amount: dec!(250),
        paid_on: Some(date("2024-05-02")),
        note: None,
    }];
    let paid = PaymentDate {
        orden_numero: 9,
        paid_on: None,
        origin: Some(DateOrigin::Manual),
    };

    let snap = PaymentSnapshot::from_rows(9, &lines, &abonos, Some(&paid));

    assert!(snap.exists());
    assert_eq!(snap.total_amount, dec!(1000));
    assert_eq!(snap.total_abonado, dec!(250));
    assert_eq!(snap.payment_date, None);
    assert_eq!(snap.date_origin, None);
    assert_eq!(snap.state(), PaymentState::Abono);
    assert_eq!(snap.balance(), dec!(750));
}

#[test]
fn test_state_rules() {
    let pending = snapshot(dec!(1000), Decimal::ZERO, None, None);
    assert_eq!(pending.state(), PaymentState::Pending);
    assert_eq!(pending.balance(), dec!(1000));

    let abono = snapshot(dec!(1000), dec!(400), None, None);
    assert_eq!(abono.state(), PaymentState::Abono);
    assert_eq!(abono.balance(), dec!(600));

    let covered = snapshot(dec!(1000), dec!(1000), None, None);
    assert_eq!(covered.state(), PaymentState::Paid);
    assert_eq!(covered.balance(), Decimal::ZERO);

    let dated = snapshot(dec!(1000), Decimal::ZERO, Some("2024-01-31"), None);
    assert_eq!(dated.state(), PaymentState::Paid);
}

#[test]
fn test_auto_date_with_open_balance_stays_abono() {
    let snap = snapshot(dec!(1000), dec!(400), Some("2024-02-01"), Some(DateOrigin::Abono));
    assert_eq!(snap.state(), PaymentState::Abono);
    assert_eq!(snap.balance(), dec!(600));

    let legacy = snapshot(dec!(1000), dec!(400), Some("2024-02-01"), None);
    assert_eq!(legacy.state(), PaymentState::Abono);
}

#[test]
fn test_direct_date_overrides_abono_bookkeeping() {
    // total 1000, one abono of 400, then the user sets the date directly
    let snap = snapshot(dec!(1000), dec!(400), Some("2024-02-01"), Some(DateOrigin::Manual));
    let status = snap.status();

    assert_eq!(status.state, PaymentState::Paid);
    assert_eq!(status.balance, Decimal::ZERO);
    assert_eq!(status.total_abonado, dec!(400));
}

#[test]
fn test_partial_payment_validation() {
    let snap = snapshot(dec!(1000), dec!(300), None, None);

    assert_eq!(
        PaymentService::validate_partial_payment(&snap, Decimal::ZERO),
        Err(PaymentError::InvalidAmount(Decimal::ZERO))
    );
    assert_eq!(
        PaymentService::validate_partial_payment(&snap, dec!(-5)),
        Err(PaymentError::InvalidAmount(dec!(-5)))
    );

    let decision = PaymentService::validate_partial_payment(&snap, dec!(200)).unwrap();
    assert_eq!(decision.new_total, dec!(500));
    assert!(!decision.completes_order);

    let decision = PaymentService::validate_partial_payment(&snap, dec!(700)).unwrap();
    assert!(decision.completes_order);
}

#[test]
fn test_over_payment_is_rejected() {
    let snap = snapshot(dec!(1000), dec!(300), None, None);
    let err = PaymentService::validate_partial_payment(&snap, dec!(700.01)).unwrap_err();

    assert_eq!(
        err,
        PaymentError::OverPayment {
            orden_numero: 500,
            total: dec!(1000),
            abonado: dec!(300),
            amount: dec!(700.01),
        }
    );
    assert!(err.to_string().contains("order 500"));
}

#[test]
fn test_unknown_order_is_rejected() {
    let mut snap = snapshot(Decimal::ZERO, Decimal::ZERO, None, None);
    snap.line_count = 0;

    assert_eq!(
        PaymentService::validate_partial_payment(&snap, dec!(1)),
        Err(PaymentError::OrderNotFound(500))
    );
    assert_eq!(
        PaymentService::validate_clear(&snap),
        Err(PaymentError::OrderNotFound(500))
    );
    let today = date("2024-06-10");
    assert_eq!(
        PaymentService::validate_payment_date(&snap, today, today, 7),
        Err(PaymentError::OrderNotFound(500))
    );
}

#[test]
fn test_payment_date_window() {
    let snap = snapshot(dec!(10), Decimal::ZERO, None, None);
    let today = date("2024-06-10");

    assert!(PaymentService::validate_payment_date(&snap, date("2024-06-17"), today, 7).is_ok());
    assert!(PaymentService::validate_payment_date(&snap, date("2023-01-01"), today, 7).is_ok());
    assert_eq!(
        PaymentService::validate_payment_date(&snap, date("2024-06-18"), today, 7),
        Err(PaymentError::FutureDate {
            date: date("2024-06-18"),
            limit: date("2024-06-17"),
        })
    );
}

#[test]
fn test_clear_refused_when_abonos_cover_total() {
    let snap = snapshot(dec!(1000), dec!(1000), Some("2024-03-01"), Some(DateOrigin::Abono));
    let err = PaymentService::validate_clear(&snap).unwrap_err();
    assert!(matches!(err, PaymentError::ClearRefused { orden_numero: 500, .. }));

    let partial = snapshot(dec!(1000), dec!(100), Some("2024-03-01"), Some(DateOrigin::Manual));
    assert_eq!(PaymentService::validate_clear(&partial), Ok(true));

    let undated = snapshot(dec!(1000), Decimal::ZERO, None, None);
    assert_eq!(PaymentService::validate_clear(&undated), Ok(false));
}

#[test]
fn test_date_after_abono_removed() {
    // no abonos left: any date goes
    let none_left = snapshot(
        dec!(1000),
        Decimal::ZERO,
        Some("2024-03-01"),
        Some(DateOrigin::Manual),
    );
    assert_eq!(PaymentService::after_abono_removed(&none_left), DateAction::Delete);

    // partial sum: only an automatic date goes
    let auto = snapshot(dec!(1000), dec!(500), Some("2024-03-01"), Some(DateOrigin::Abono));
    assert_eq!(PaymentService::after_abono_removed(&auto), DateAction::Delete);
    let manual = snapshot(dec!(1000), dec!(500), Some("2024-03-01"), Some(DateOrigin::Manual));
    assert_eq!(PaymentService::after_abono_removed(&manual), DateAction::Keep);

    let undated = snapshot(dec!(1000), dec!(500), None, None);
    assert_eq!(PaymentService::after_abono_removed(&undated), DateAction::Keep);
}

#[test]
fn test_state_serializes_uppercase() {
    assert_eq!(serde_json::to_string(&PaymentState::Abono).unwrap(), "\"ABONO\"");
    assert_eq!(PaymentState::Paid.to_string(), "PAID");
}

proptest! {
    /// Recording valid abonos never moves an order backwards.
    #[test]
    fn test_abonos_progress_monotonically(
        total_cents in 1i64..10_000_000,
        parts in prop::collection::vec(1i64..5_000_000, 1..12),
    ) {
        let mut snap = snapshot(Decimal::new(total_cents, 2), Decimal::ZERO, None, None);
        let mut previous = snap.state();
        prop_assert_eq!(previous, PaymentState::Pending);

        for cents in parts {
            let amount = Decimal::new(cents, 2);
            match PaymentService::validate_partial_payment(&snap, amount) {
                Ok(decision) => {
                    snap.total_abonado = decision.new_total;
                    if decision.completes_order {
                        snap.payment_date = Some(date("2024-01-01"));
                        snap.date_origin = Some(DateOrigin::Abono);
                    }
                }
                Err(PaymentError::OverPayment { .. }) => {
                    prop_assert!(snap.total_abonado + amount > snap.total_amount);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            let state = snap.state();
            prop_assert!(state >= previous);
            prop_assert!(snap.total_abonado <= snap.total_amount);
            previous = state;
        }
    }

    /// Whenever abonos cover the total, clearing the date is refused.
    #[test]
    fn test_clear_refused_whenever_covered(
        total_cents in 0i64..1_000_000,
        extra_cents in 0i64..1_000,
    ) {
        let total = Decimal::new(total_cents, 2);
        let snap = snapshot(total, total + Decimal::new(extra_cents, 2), Some("2024-01-01"), None);
        let refused = matches!(
            PaymentService::validate_clear(&snap),
            Err(PaymentError::ClearRefused { .. })
        );
        prop_assert!(refused);
        prop_assert_eq!(snap.state(), PaymentState::Paid);
    }

    /// The balance is never negative and zero exactly when paid.
    #[test]
    fn test_balance_bounds(
        total_cents in 0i64..1_000_000,
        abonado_cents in 0i64..1_000_000,
        dated in any::<bool>(),
        manual in any::<bool>(),
    ) {
        let origin = manual.then_some(DateOrigin::Manual);
        let snap = snapshot(
            Decimal::new(total_cents, 2),
            Decimal::new(abonado_cents, 2),
            dated.then_some("2024-01-01"),
            origin,
        );
        let balance = snap.balance();
        prop_assert!(balance >= Decimal::ZERO);
        prop_assert_eq!(balance.is_zero(), snap.state() == PaymentState::Paid);
    }
}
