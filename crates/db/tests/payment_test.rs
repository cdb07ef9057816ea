//! Payment repository tests: abonos, payment dates and concurrent writes.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use obrafin_core::payment::{AbonoInput, PaymentError, PaymentState};
use obrafin_core::records::DateOrigin;
use obrafin_db::repositories::{PaymentRepoError, RefusedClear};
use obrafin_db::{MemoryStore, PaymentRepository, tables};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

const MAX_DAYS_AHEAD: i64 = 7;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn abono(amount: Decimal, on: &str) -> AbonoInput {
    AbonoInput {
        amount,
        date: date(on),
        note: None,
    }
}

async fn repository() -> (Arc<MemoryStore>, PaymentRepository) {
    let store = common::seeded_store().await;
    let repo = PaymentRepository::new(common::handle(&store), MAX_DAYS_AHEAD);
    (store, repo)
}

#[tokio::test]
async fn test_abonos_move_the_order_to_paid() {
    let (store, repo) = repository().await;

    let pending = repo.get_payment_state(101).await.unwrap();
    assert_eq!(pending.state, PaymentState::Pending);
    assert_eq!(pending.balance, dec!(1000));

    let first = repo
        .record_partial_payment(
            101,
            &AbonoInput {
                amount: dec!(300),
                date: date("2024-05-02"),
                note: Some("  primer pago ".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(first.abono.note.as_deref(), Some("primer pago"));
    assert_eq!(first.status.state, PaymentState::Abono);
    assert_eq!(first.status.balance, dec!(700));
    assert!(store.rows(tables::PAYMENT_DATES).await.is_empty());

    let second = repo
        .record_partial_payment(101, &abono(dec!(700), "2024-05-20"))
        .await
        .unwrap();
    assert_eq!(second.status.state, PaymentState::Paid);
    assert_eq!(second.status.balance, Decimal::ZERO);
    assert_eq!(second.status.fecha_pago, Some(date("2024-05-20")));
    assert_eq!(second.status.date_origin, Some(DateOrigin::Abono));

    let listed = repo.list_abonos(101).await.unwrap();
    let amounts: Vec<Decimal> = listed.iter().map(|a| a.amount).collect();
    assert_eq!(amounts, vec![dec!(300), dec!(700)]);
}

#[tokio::test]
async fn test_rejected_abonos_write_nothing() {
    let (store, repo) = repository().await;

    repo.record_partial_payment(100, &abono(dec!(400), "2024-04-01"))
        .await
        .unwrap();

    let err = repo
        .record_partial_payment(100, &abono(dec!(200), "2024-04-02"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentRepoError::Payment(PaymentError::OverPayment { orden_numero: 100, .. })
    ));

    let err = repo
        .record_partial_payment(100, &abono(Decimal::ZERO, "2024-04-02"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentRepoError::Payment(PaymentError::InvalidAmount(_))));

    let err = repo
        .record_partial_payment(999, &abono(dec!(1), "2024-04-02"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentRepoError::Payment(PaymentError::OrderNotFound(999))));

    assert_eq!(store.rows(tables::ABONOS).await.len(), 1);
    let status = repo.get_payment_state(100).await.unwrap();
    assert_eq!(status.total_abonado, dec!(400));
    assert_eq!(status.balance, dec!(100));
}

#[tokio::test]
async fn test_deleting_an_abono_drops_the_automatic_date() {
    let (store, repo) = repository().await;

    repo.record_partial_payment(103, &abono(dec!(40), "2024-06-01"))
        .await
        .unwrap();
    let completing = repo
        .record_partial_payment(103, &abono(dec!(50), "2024-06-05"))
        .await
        .unwrap();
    assert_eq!(completing.status.state, PaymentState::Paid);

    let status = repo.delete_partial_payment(completing.abono.id).await.unwrap();
    assert_eq!(status.state, PaymentState::Abono);
    assert_eq!(status.fecha_pago, None);
    assert_eq!(status.balance, dec!(50));
    assert!(store.rows(tables::PAYMENT_DATES).await.is_empty());

    let err = repo.delete_partial_payment(completing.abono.id).await.unwrap_err();
    assert!(matches!(err, PaymentRepoError::Payment(PaymentError::AbonoNotFound(_))));
}

#[tokio::test]
async fn test_manual_date_survives_abonos() {
    let (_store, repo) = repository().await;
    let today = date("2024-06-10");

    let status = repo
        .set_payment_date(103, date("2024-06-01"), today)
        .await
        .unwrap();
    assert_eq!(status.state, PaymentState::Paid);
    assert_eq!(status.balance, Decimal::ZERO);

    let partial = repo
        .record_partial_payment(103, &abono(dec!(30), "2024-06-03"))
        .await
        .unwrap();
    assert_eq!(partial.status.state, PaymentState::Paid);

    let completing = repo
        .record_partial_payment(103, &abono(dec!(60), "2024-06-08"))
        .await
        .unwrap();
    assert_eq!(completing.status.fecha_pago, Some(date("2024-06-01")));
    assert_eq!(completing.status.date_origin, Some(DateOrigin::Manual));

    let status = repo.delete_partial_payment(completing.abono.id).await.unwrap();
    assert_eq!(status.state, PaymentState::Paid);
    assert_eq!(status.fecha_pago, Some(date("2024-06-01")));
}

#[tokio::test]
async fn test_payment_date_limits() {
    let (_store, repo) = repository().await;
    let today = date("2024-06-10");

    let err = repo
        .set_payment_date(100, date("2024-06-18"), today)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentRepoError::Payment(PaymentError::FutureDate { .. })));

    let status = repo
        .set_payment_date(100, date("2024-06-17"), today)
        .await
        .unwrap();
    assert_eq!(status.fecha_pago, Some(date("2024-06-17")));

    let err = repo
        .set_payment_date(999, date("2024-06-01"), today)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentRepoError::Payment(PaymentError::OrderNotFound(999))));
}

#[tokio::test]
async fn test_clearing_payment_dates() {
    let (store, repo) = repository().await;
    let today = date("2024-06-10");

    assert!(!repo.clear_payment_date(100).await.unwrap());

    repo.set_payment_date(100, date("2024-06-01"), today)
        .await
        .unwrap();
    assert!(repo.clear_payment_date(100).await.unwrap());
    assert_eq!(
        repo.get_payment_state(100).await.unwrap().state,
        PaymentState::Pending
    );

    repo.record_partial_payment(103, &abono(dec!(90), "2024-06-05"))
        .await
        .unwrap();
    let err = repo.clear_payment_date(103).await.unwrap_err();
    assert!(matches!(
        err,
        PaymentRepoError::Payment(PaymentError::ClearRefused { orden_numero: 103, .. })
    ));
    assert_eq!(store.rows(tables::PAYMENT_DATES).await.len(), 1);
}

#[tokio::test]
async fn test_legacy_date_without_origin_counts_as_paid() {
    let (store, repo) = repository().await;
    store
        .seed(
            tables::PAYMENT_DATES,
            vec![json!({"orden_numero": 102, "fecha_pago": "2024-03-01 00:00:00", "origen": null})],
        )
        .await
        .unwrap();

    let status = repo.get_payment_state(102).await.unwrap();
    assert_eq!(status.state, PaymentState::Paid);
    assert_eq!(status.date_origin, None);

    assert!(repo.clear_payment_date(102).await.unwrap());
    assert_eq!(
        repo.get_payment_state(102).await.unwrap().state,
        PaymentState::Pending
    );
}

#[tokio::test]
async fn test_batch_clear_reports_each_order() {
    let (_store, repo) = repository().await;
    let today = date("2024-06-10");

    repo.set_payment_date(100, date("2024-06-01"), today)
        .await
        .unwrap();
    repo.record_partial_payment(103, &abono(dec!(90), "2024-06-05"))
        .await
        .unwrap();

    let report = repo
        .clear_payment_dates(&[103, 100, 999, 100, 101])
        .await
        .unwrap();
    assert_eq!(report.cleared, vec![100, 101]);
    assert_eq!(report.missing, vec![999]);
    assert_eq!(report.refused.len(), 1);
    let RefusedClear { orden_numero, reason } = &report.refused[0];
    assert_eq!(*orden_numero, 103);
    assert!(reason.contains("cannot be cleared"));

    assert_eq!(
        repo.get_payment_state(100).await.unwrap().state,
        PaymentState::Pending
    );
}

#[tokio::test]
async fn test_concurrent_abonos_never_overpay() {
    let (store, repo) = repository().await;
    let repo = Arc::new(repo);

    let attempts = (0..10).map(|_| {
        let repo = Arc::clone(&repo);
        async move {
            repo.record_partial_payment(101, &abono(dec!(150), "2024-05-02"))
                .await
        }
    });
    let results = join_all(attempts).await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 6);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|err| matches!(
        err,
        PaymentRepoError::Payment(PaymentError::OverPayment { .. })
    )));

    let status = repo.get_payment_state(101).await.unwrap();
    assert_eq!(status.total_abonado, dec!(900));
    assert_eq!(status.state, PaymentState::Abono);
    assert_eq!(store.rows(tables::ABONOS).await.len(), 6);
}

#[tokio::test]
async fn test_concurrent_abonos_across_tasks() {
    let (_store, repo) = repository().await;

    let handles: Vec<_> = [dec!(250), dec!(250), dec!(250), dec!(250), dec!(250)]
        .into_iter()
        .map(|amount| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.record_partial_payment(101, &abono(amount, "2024-05-02"))
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 4);

    let status = repo.get_payment_state(101).await.unwrap();
    assert_eq!(status.state, PaymentState::Paid);
    assert_eq!(status.date_origin, Some(DateOrigin::Abono));
}
