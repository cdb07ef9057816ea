//! Dashboard KPIs and reference caching over the seeded store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use obrafin_core::normalize::MonthKey;
use obrafin_db::store::record;
use obrafin_db::{
    CachingStore, DashboardRepository, Datastore, MemoryStore, QueryCache, ReferenceRepository,
    StoreHandle, tables,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_kpis_with_every_order_pending() {
    let store = common::seeded_store().await;
    let repo = DashboardRepository::new(common::handle(&store));

    let kpis = repo.get_dashboard_kpis(date("2024-06-30"), 4).await.unwrap();

    assert_eq!(kpis.order_counts.pending, 4);
    assert_eq!(kpis.order_counts.paid, 0);
    assert_eq!(kpis.outstanding_total, dec!(2040));

    let suppliers: Vec<(Option<i64>, &str, Decimal, u64)> = kpis
        .by_supplier
        .iter()
        .map(|s| (s.supplier_id, s.name.as_str(), s.amount, s.orders))
        .collect();
    assert_eq!(
        suppliers,
        vec![
            (Some(2), "Hormigones Ltda", dec!(1450), 2),
            (Some(1), "Ferreteria Sur", dec!(590), 2),
        ]
    );
    let projects: Vec<(Option<i64>, Decimal)> = kpis
        .by_project
        .iter()
        .map(|p| (p.project_id, p.amount))
        .collect();
    assert_eq!(
        projects,
        vec![(Some(1), dec!(1500)), (Some(2), dec!(450)), (Some(4), dec!(90))]
    );

    assert_eq!(kpis.unreceived_orders.len(), 1);
    let unreceived = &kpis.unreceived_orders[0];
    assert_eq!(unreceived.orden_compra, 500);
    assert_eq!(unreceived.lines, 1);
    assert_eq!(unreceived.amount, dec!(200));
    assert_eq!(unreceived.days_open, Some(121));
    assert_eq!(unreceived.supplier_name.as_deref(), Some("Ferreteria Sur"));
    assert_eq!(kpis.unreceived_total, dec!(200));
    assert_eq!(kpis.aging.over_90, dec!(200));
    assert_eq!(kpis.invoices_pending, 1);

    let evolution: Vec<(MonthKey, Decimal)> = kpis
        .debt_evolution
        .iter()
        .map(|p| (p.month, p.amount))
        .collect();
    assert_eq!(
        evolution,
        vec![
            (MonthKey::new(2024, 3).unwrap(), dec!(950)),
            (MonthKey::new(2024, 4).unwrap(), dec!(1950)),
            (MonthKey::new(2024, 5).unwrap(), dec!(2040)),
            (MonthKey::new(2024, 6).unwrap(), dec!(2040)),
        ]
    );
}

#[tokio::test]
async fn test_kpis_follow_abonos_and_payment_dates() {
    let store = common::seeded_store().await;
    store
        .seed(
            tables::ABONOS,
            vec![
                json!({"orden_numero": 101, "monto_abono": "400", "fecha_abono": "2024-05-10"}),
                json!({"orden_numero": 103, "monto_abono": "90", "fecha_abono": "2024-07-05"}),
            ],
        )
        .await
        .unwrap();
    store
        .seed(
            tables::PAYMENT_DATES,
            vec![json!({"orden_numero": 102, "fecha_pago": "2024-04-15", "origen": "manual"})],
        )
        .await
        .unwrap();
    let repo = DashboardRepository::new(common::handle(&store));

    let kpis = repo.get_dashboard_kpis(date("2024-06-30"), 4).await.unwrap();

    assert_eq!(kpis.order_counts.pending, 2);
    assert_eq!(kpis.order_counts.abono, 1);
    assert_eq!(kpis.order_counts.paid, 1);
    assert_eq!(kpis.outstanding_total, dec!(1190));
    assert!(kpis.by_project.iter().all(|p| p.project_id != Some(2)));

    let evolution: Vec<Decimal> = kpis.debt_evolution.iter().map(|p| p.amount).collect();
    assert_eq!(evolution, vec![dec!(950), dec!(1500), dec!(1190), dec!(1190)]);

    let later = repo.get_dashboard_kpis(date("2024-07-31"), 1).await.unwrap();
    assert_eq!(later.order_counts.paid, 2);
    assert_eq!(later.outstanding_total, dec!(1100));
}

#[tokio::test]
async fn test_unreceived_lines_before_as_of_only() {
    let store = common::seeded_store().await;
    let repo = DashboardRepository::new(common::handle(&store));

    let early = repo.get_dashboard_kpis(date("2024-02-15"), 1).await.unwrap();
    assert!(early.unreceived_orders.is_empty());
    assert_eq!(early.unreceived_total, Decimal::ZERO);
    assert_eq!(early.order_counts.pending, 1);
    assert_eq!(early.outstanding_total, dec!(450));
    assert_eq!(early.debt_evolution[0].amount, dec!(450));

    let fresh = repo.get_dashboard_kpis(date("2024-03-05"), 1).await.unwrap();
    assert_eq!(fresh.unreceived_orders[0].days_open, Some(4));
    assert_eq!(fresh.aging.days_0_30, dec!(200));
}

#[tokio::test]
async fn test_reference_reads_are_cached_until_written() {
    let inner = MemoryStore::new();
    common::load(&inner).await;
    let store = Arc::new(CachingStore::new(inner, Arc::new(QueryCache::new()), true));
    let handle =
        StoreHandle::with_settings(store.clone(), common::PAGE_SIZE, Duration::from_secs(5));
    let reference = ReferenceRepository::new(handle.clone());

    assert_eq!(reference.projects().await.unwrap().len(), 4);
    let served = store.inner().select_count();
    assert!(served > 0);

    assert_eq!(reference.projects().await.unwrap().len(), 4);
    assert_eq!(store.inner().select_count(), served);

    DashboardRepository::new(handle)
        .get_dashboard_kpis(date("2024-06-30"), 1)
        .await
        .unwrap();
    let after_dashboard = store.inner().select_count();

    store
        .insert(
            tables::PROJECTS,
            vec![record([
                ("proyecto", "Puente Este".into()),
                ("activo", true.into()),
            ])],
        )
        .await
        .unwrap();

    assert_eq!(reference.projects().await.unwrap().len(), 5);
    assert!(store.inner().select_count() > after_dashboard);
}
