//! Shared fixture for repository tests: an in-memory store seeded with
//! projects, budget, spend, payment and purchasing rows.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use obrafin_db::{MemoryStore, StoreHandle, tables};
use serde_json::json;

/// Small pages so every read spans several of them.
pub const PAGE_SIZE: u32 = 2;

pub fn handle(store: &Arc<MemoryStore>) -> StoreHandle {
    StoreHandle::with_settings(store.clone(), PAGE_SIZE, Duration::from_secs(5))
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    seed(MemoryStore::new()).await
}

pub async fn seed(store: MemoryStore) -> Arc<MemoryStore> {
    load(&store).await;
    Arc::new(store)
}

/// Loads the fixture rows into `store`.
pub async fn load(store: &MemoryStore) {
    store
        .seed(
            tables::PROJECTS,
            vec![
                json!({"id": 1, "proyecto": "Edificio Centro", "venta": "1000000", "produccion": "900000", "activo": true, "observacion": null}),
                json!({"id": 2, "proyecto": "Torre Norte", "venta": "500000", "produccion": null, "activo": true, "observacion": " Finalizado "}),
                json!({"id": 3, "proyecto": "Bodega Sur", "venta": null, "produccion": null, "activo": false, "observacion": null}),
                json!({"id": 4, "proyecto": "Fibra Ruta 5", "venta": null, "produccion": null, "activo": true, "observacion": null}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::ITEMS,
            vec![
                json!({"id": 1, "tipo": "Materiales"}),
                json!({"id": 2, "tipo": "Mano de obra"}),
                json!({"id": 3, "tipo": "Fletes"}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::SUPPLIERS,
            vec![
                json!({"id": 1, "nombre": "Ferreteria Sur", "rut": "76.123.456-7"}),
                json!({"id": 2, "nombre": "Hormigones Ltda", "rut": null}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::WORKERS,
            vec![
                json!({"id": 1, "nombre": "Ana Rojas", "rut": "12.345.678-9", "activo": true}),
                json!({"id": 2, "nombre": "Luis Vera", "rut": null, "activo": false}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::BUDGET_LINES,
            vec![
                json!({"id": 1, "proyecto_id": 1, "item": "1", "monto": "500", "mes_numero": 3, "mes_nombre": null, "anio": 2024, "fecha": null}),
                json!({"id": 2, "proyecto_id": 1, "item": "Materiales", "monto": "200", "mes_numero": null, "mes_nombre": "abril", "anio": 2024, "fecha": null}),
                json!({"id": 3, "proyecto_id": 1, "item": "mano de obra", "monto": "800", "mes_numero": null, "mes_nombre": null, "anio": null, "fecha": "2024-04-01"}),
                json!({"id": 4, "proyecto_id": 1, "item": "99", "monto": "70", "mes_numero": 3, "mes_nombre": null, "anio": 2024, "fecha": null}),
                json!({"id": 5, "proyecto_id": 4, "item": "Fletes", "monto": "40", "mes_numero": 5, "mes_nombre": null, "anio": 2024, "fecha": null}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::PAYMENT_ORDERS,
            vec![
                json!({"id": 1, "orden_numero": 100, "proyecto": 1, "proveedor": 1, "orden_compra": 500, "item": "Materiales", "mes": "marzo", "costo_final_con_iva": "300", "fecha_factura": "2024-03-10", "ingreso_id": 7, "factura": "F-100", "estado_documento": null}),
                json!({"id": 2, "orden_numero": 100, "proyecto": 1, "proveedor": 1, "orden_compra": 500, "item": "materiales ", "mes": 3, "costo_final_con_iva": "200", "fecha_factura": "2024-03-12", "ingreso_id": null, "factura": "F-101", "estado_documento": null}),
                json!({"id": 3, "orden_numero": 101, "proyecto": 1, "proveedor": 2, "orden_compra": null, "item": 2, "mes": "April", "costo_final_con_iva": "1000", "fecha_factura": "2024-04-02", "ingreso_id": null, "factura": "F-200", "estado_documento": null}),
                json!({"id": 4, "orden_numero": 102, "proyecto": 2, "proveedor": 2, "orden_compra": null, "item": 1, "mes": null, "costo_final_con_iva": "450", "fecha_factura": "2024-02-01", "ingreso_id": null, "factura": null, "estado_documento": null}),
                json!({"id": 5, "orden_numero": 103, "proyecto": 4, "proveedor": 1, "orden_compra": null, "item": "Fletes", "mes": null, "costo_final_con_iva": "90", "fecha_factura": "2024-05-20", "ingreso_id": null, "factura": null, "estado_documento": null}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::DIRECT_EXPENSES,
            vec![
                json!({"id": 1, "proyecto_id": 1, "item_id": 1, "mes": "marzo", "monto": "50", "fecha": "2024-03-20", "descripcion": "Compra menor"}),
                json!({"id": 2, "proyecto_id": 1, "item_id": 3, "mes": null, "monto": "25", "fecha": "2024-06-03", "descripcion": null}),
            ],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::RECEIPTS,
            vec![json!({"id": 7, "orden_compra": 500, "art_corr": 1, "cantidad": "10", "factura": null, "fac_pendiente": true})],
        )
        .await
        .unwrap();

    store
        .seed(
            tables::PURCHASE_ORDERS,
            vec![
                json!({"id": 1, "orden_compra": 500, "art_corr": 1, "proveedor": 1, "proyecto": 1, "descripcion": "Cemento", "total": "300", "fecha": "2024-03-01"}),
                json!({"id": 2, "orden_compra": 500, "art_corr": 2, "proveedor": 1, "proyecto": 1, "descripcion": "Fierro", "total": "200", "fecha": "2024-03-01"}),
            ],
        )
        .await
        .unwrap();
}
