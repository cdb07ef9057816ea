//! Table names of the shared datastore.

/// Projects.
pub const PROJECTS: &str = "proyectos";
/// Budget item types.
pub const ITEMS: &str = "item";
/// Suppliers.
pub const SUPPLIERS: &str = "proveedores";
/// Workers.
pub const WORKERS: &str = "trabajadores";
/// Budgeted amounts.
pub const BUDGET_LINES: &str = "presupuesto";
/// Payment order lines.
pub const PAYMENT_ORDERS: &str = "orden_de_pago";
/// Direct expenses.
pub const DIRECT_EXPENSES: &str = "gastos_directos";
/// Payment dates, one per order.
pub const PAYMENT_DATES: &str = "fechas_de_pagos_op";
/// Partial payments.
pub const ABONOS: &str = "abonos_op";
/// Goods receipts.
pub const RECEIPTS: &str = "ingresos";
/// Purchase order lines.
pub const PURCHASE_ORDERS: &str = "orden_de_compra";

/// Tables whose query results may be cached.
pub const REFERENCE_TABLES: [&str; 4] = [PROJECTS, ITEMS, SUPPLIERS, WORKERS];

/// Whether `table` holds reference data.
#[must_use]
pub fn is_reference(table: &str) -> bool {
    REFERENCE_TABLES.contains(&table)
}
