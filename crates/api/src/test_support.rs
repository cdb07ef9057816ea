//! Router fixture for handler tests: a small seeded in-memory store behind
//! the reference cache.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use obrafin_db::{CachingStore, MemoryStore, QueryCache, tables};
use obrafin_shared::AppConfig;
use obrafin_shared::config::{
    CacheConfig, DashboardConfig, DatabaseConfig, DatastoreConfig, PaymentsConfig, ServerConfig,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{AppState, create_router};

fn config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        datastore: DatastoreConfig::default(),
        cache: CacheConfig::default(),
        payments: PaymentsConfig::default(),
        dashboard: DashboardConfig::default(),
    }
}

async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    let rows = [
        (
            tables::PROJECTS,
            vec![
                json!({"id": 1, "proyecto": "Edificio Centro", "venta": "100000", "produccion": "80000", "activo": true}),
                json!({"id": 2, "proyecto": "Torre Norte", "activo": true, "observacion": "finalizado"}),
            ],
        ),
        (
            tables::ITEMS,
            vec![
                json!({"id": 1, "tipo": "Materiales"}),
                json!({"id": 2, "tipo": "Fletes"}),
            ],
        ),
        (
            tables::SUPPLIERS,
            vec![json!({"id": 1, "nombre": "Ferreteria Sur"})],
        ),
        (
            tables::BUDGET_LINES,
            vec![json!({"proyecto_id": 1, "item": "Materiales", "monto": "900", "mes_numero": 3, "anio": 2024})],
        ),
        (
            tables::PAYMENT_ORDERS,
            vec![
                json!({"orden_numero": 10, "proyecto": 1, "proveedor": 1, "item": 1, "mes": "marzo", "costo_final_con_iva": "600", "fecha_factura": "2024-03-04", "factura": "F-1"}),
                json!({"orden_numero": 10, "proyecto": 1, "proveedor": 1, "item": "fletes", "mes": 3, "costo_final_con_iva": "400", "fecha_factura": "2024-03-06", "factura": "F-2"}),
                json!({"orden_numero": 11, "proyecto": 1, "proveedor": 1, "item": 1, "costo_final_con_iva": "250", "fecha_factura": "2024-04-01"}),
            ],
        ),
    ];
    for (table, rows) in rows {
        store.seed(table, rows).await.unwrap();
    }
    store
}

/// Router over a freshly seeded store.
pub async fn app() -> (Router, AppState) {
    let cache = Arc::new(QueryCache::new());
    let store = Arc::new(CachingStore::new(seeded().await, cache.clone(), true));
    let state = AppState::new(store, cache, &config());
    (create_router(state.clone(), Duration::from_secs(5)), state)
}

/// Sends one request and decodes the JSON answer.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_text(app, method, uri, body.map(|body| body.to_string())).await
}

/// Like [`send`], with the body taken verbatim so it may be malformed.
pub async fn send_text(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body)),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
