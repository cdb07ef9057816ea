//! Initial schema: reference tables, budget and spend tables, payment
//! signals and purchasing.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: REFERENCE DATA
        // ============================================================
        db.execute_unprepared(REFERENCE_SQL).await?;

        // ============================================================
        // PART 2: BUDGET AND SPEND
        // ============================================================
        db.execute_unprepared(BUDGET_SQL).await?;
        db.execute_unprepared(PAYMENT_ORDERS_SQL).await?;

        // ============================================================
        // PART 3: PAYMENT SIGNALS
        // ============================================================
        db.execute_unprepared(PAYMENT_SIGNALS_SQL).await?;

        // ============================================================
        // PART 4: PURCHASING
        // ============================================================
        db.execute_unprepared(PURCHASING_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const REFERENCE_SQL: &str = r"
CREATE TABLE proyectos (
    id BIGSERIAL PRIMARY KEY,
    proyecto TEXT NOT NULL,
    venta NUMERIC(18, 2),
    produccion NUMERIC(18, 2),
    activo BOOLEAN NOT NULL DEFAULT TRUE,
    observacion TEXT
);

CREATE TABLE item (
    id BIGSERIAL PRIMARY KEY,
    tipo TEXT NOT NULL
);

CREATE TABLE proveedores (
    id BIGSERIAL PRIMARY KEY,
    nombre TEXT NOT NULL,
    rut VARCHAR(20)
);

CREATE TABLE trabajadores (
    id BIGSERIAL PRIMARY KEY,
    nombre TEXT NOT NULL,
    rut VARCHAR(20),
    activo BOOLEAN NOT NULL DEFAULT TRUE
);
";

const BUDGET_SQL: &str = r"
-- item holds either an item id or a free-text type name
CREATE TABLE presupuesto (
    id BIGSERIAL PRIMARY KEY,
    proyecto_id BIGINT NOT NULL REFERENCES proyectos(id),
    item TEXT NOT NULL,
    monto NUMERIC(18, 2) NOT NULL DEFAULT 0,
    mes_numero SMALLINT,
    mes_nombre TEXT,
    anio INTEGER,
    fecha DATE,
    CONSTRAINT chk_presupuesto_monto CHECK (monto >= 0),
    CONSTRAINT uq_presupuesto_linea UNIQUE (proyecto_id, item, fecha)
);

CREATE INDEX idx_presupuesto_proyecto ON presupuesto(proyecto_id);

CREATE TABLE gastos_directos (
    id BIGSERIAL PRIMARY KEY,
    proyecto_id BIGINT NOT NULL REFERENCES proyectos(id),
    item_id BIGINT NOT NULL REFERENCES item(id),
    mes TEXT,
    monto NUMERIC(18, 2) NOT NULL,
    fecha DATE,
    descripcion TEXT,
    CONSTRAINT chk_gastos_monto CHECK (monto > 0)
);

CREATE INDEX idx_gastos_directos_proyecto ON gastos_directos(proyecto_id);
";

const PAYMENT_ORDERS_SQL: &str = r"
-- one row per line; an order is the group sharing orden_numero
CREATE TABLE orden_de_pago (
    id BIGSERIAL PRIMARY KEY,
    orden_numero BIGINT NOT NULL,
    proyecto BIGINT REFERENCES proyectos(id),
    proveedor BIGINT REFERENCES proveedores(id),
    orden_compra BIGINT,
    item TEXT,
    mes TEXT,
    costo_final_con_iva NUMERIC(18, 2) NOT NULL DEFAULT 0,
    fecha_factura DATE,
    ingreso_id BIGINT,
    factura TEXT,
    estado_documento TEXT
);

CREATE INDEX idx_orden_de_pago_numero ON orden_de_pago(orden_numero);
CREATE INDEX idx_orden_de_pago_proyecto ON orden_de_pago(proyecto);
CREATE INDEX idx_orden_de_pago_proveedor ON orden_de_pago(proveedor);
";

const PAYMENT_SIGNALS_SQL: &str = r"
CREATE TABLE fechas_de_pagos_op (
    orden_numero BIGINT PRIMARY KEY,
    fecha_pago DATE NOT NULL,
    origen TEXT,
    CONSTRAINT chk_fecha_origen CHECK (origen IS NULL OR origen IN ('manual', 'abono'))
);

CREATE TABLE abonos_op (
    id BIGSERIAL PRIMARY KEY,
    orden_numero BIGINT NOT NULL,
    monto_abono NUMERIC(18, 2) NOT NULL,
    fecha_abono DATE NOT NULL,
    observacion TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_abono_monto CHECK (monto_abono > 0)
);

CREATE INDEX idx_abonos_op_orden ON abonos_op(orden_numero);
";

const PURCHASING_SQL: &str = r"
CREATE TABLE orden_de_compra (
    id BIGSERIAL PRIMARY KEY,
    orden_compra BIGINT NOT NULL,
    art_corr BIGINT NOT NULL,
    proveedor BIGINT REFERENCES proveedores(id),
    proyecto BIGINT REFERENCES proyectos(id),
    descripcion TEXT,
    total NUMERIC(18, 2) NOT NULL DEFAULT 0,
    fecha DATE,
    CONSTRAINT uq_orden_de_compra_linea UNIQUE (orden_compra, art_corr)
);

CREATE TABLE ingresos (
    id BIGSERIAL PRIMARY KEY,
    orden_compra BIGINT NOT NULL,
    art_corr BIGINT NOT NULL,
    cantidad NUMERIC(18, 4),
    factura TEXT,
    fac_pendiente BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX idx_ingresos_linea ON ingresos(orden_compra, art_corr);
CREATE INDEX idx_ingresos_pendiente ON ingresos(fac_pendiente) WHERE fac_pendiente;
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS ingresos CASCADE;
DROP TABLE IF EXISTS orden_de_compra CASCADE;
DROP TABLE IF EXISTS abonos_op CASCADE;
DROP TABLE IF EXISTS fechas_de_pagos_op CASCADE;
DROP TABLE IF EXISTS orden_de_pago CASCADE;
DROP TABLE IF EXISTS gastos_directos CASCADE;
DROP TABLE IF EXISTS presupuesto CASCADE;
DROP TABLE IF EXISTS trabajadores CASCADE;
DROP TABLE IF EXISTS proveedores CASCADE;
DROP TABLE IF EXISTS item CASCADE;
DROP TABLE IF EXISTS proyectos CASCADE;
";
