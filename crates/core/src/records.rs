//! Typed rows of the shared datastore.
//!
//! Field names follow the stored column names through `serde(rename)`. The
//! tables carry legacy rows with loosely typed values (numbers stored as text,
//! timestamps where dates are expected, missing flags), so the deserializers in
//! [`de`] accept those shapes instead of failing the whole fetch.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalize::MonthSignals;

/// Item reference as stored: numeric id or free-text type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    /// Id into the `item` table.
    Id(i64),
    /// Type name, possibly plural or lowercase.
    Name(String),
}

/// Month as stored in `mes` columns: a number or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonthField {
    /// Month number.
    Number(i64),
    /// Month name, or a number stored as text.
    Name(String),
}

impl MonthField {
    /// Month signals for this field, with the year taken from `date`.
    #[must_use]
    pub fn signals(field: Option<&Self>, date: Option<NaiveDate>) -> MonthSignals<'_> {
        use chrono::Datelike;

        let year = date.map(|d| d.year());
        match field {
            Some(Self::Number(number)) => MonthSignals {
                number: Some(*number),
                name: None,
                year,
                date,
            },
            Some(Self::Name(name)) => MonthSignals {
                number: None,
                name: Some(name.as_str()),
                year,
                date,
            },
            None => MonthSignals {
                date,
                ..MonthSignals::default()
            },
        }
    }
}

/// Origin of a payment date row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrigin {
    /// Set directly by a user (paid in full).
    Manual,
    /// Created when abonos reached the order total.
    Abono,
}

impl DateOrigin {
    /// Stored value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Abono => "abono",
        }
    }
}

/// A project (`proyectos`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project id.
    pub id: i64,
    /// Project name.
    #[serde(rename = "proyecto", default)]
    pub name: String,
    /// Contracted sale amount.
    #[serde(rename = "venta", default, deserialize_with = "de::opt_amount")]
    pub sale_amount: Option<Decimal>,
    /// Production amount.
    #[serde(rename = "produccion", default, deserialize_with = "de::opt_amount")]
    pub production_amount: Option<Decimal>,
    /// Whether the project is active.
    #[serde(rename = "activo", default, deserialize_with = "de::flag")]
    pub active: bool,
    /// Closure note; `finalizado` marks a closed project.
    #[serde(rename = "observacion", default)]
    pub closure_note: Option<String>,
}

impl Project {
    /// Active and not marked `finalizado`.
    #[must_use]
    pub fn is_budgetable(&self) -> bool {
        self.active
            && !self
                .closure_note
                .as_deref()
                .is_some_and(|note| note.trim().eq_ignore_ascii_case("finalizado"))
    }
}

/// A budget item type (`item`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItem {
    /// Item id.
    pub id: i64,
    /// Type name.
    #[serde(default)]
    pub tipo: String,
}

/// A supplier (`proveedores`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    /// Supplier id.
    pub id: i64,
    /// Supplier name.
    #[serde(rename = "nombre", default)]
    pub name: String,
    /// Tax id.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub rut: Option<String>,
}

/// A worker (`trabajadores`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Worker id.
    pub id: i64,
    /// Worker name.
    #[serde(rename = "nombre", default)]
    pub name: String,
    /// Tax id.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub rut: Option<String>,
    /// Whether the worker is active.
    #[serde(rename = "activo", default, deserialize_with = "de::flag")]
    pub active: bool,
}

/// A budgeted amount (`presupuesto`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    /// Row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Project id.
    #[serde(rename = "proyecto_id")]
    pub project_id: i64,
    /// Item id or type name.
    pub item: ItemRef,
    /// Budgeted amount.
    #[serde(rename = "monto", default, deserialize_with = "de::amount")]
    pub amount: Decimal,
    /// Month number.
    #[serde(rename = "mes_numero", default, deserialize_with = "de::opt_int")]
    pub month_number: Option<i64>,
    /// Month name.
    #[serde(rename = "mes_nombre", default, deserialize_with = "de::opt_text")]
    pub month_name: Option<String>,
    /// Year.
    #[serde(rename = "anio", default, deserialize_with = "de::opt_int")]
    pub year: Option<i64>,
    /// Date (first day of the budgeted month).
    #[serde(rename = "fecha", default, deserialize_with = "de::date")]
    pub date: Option<NaiveDate>,
}

impl BudgetLine {
    /// Month signals of this line.
    #[must_use]
    pub fn month_signals(&self) -> MonthSignals<'_> {
        use chrono::Datelike;

        let year = self
            .year
            .and_then(|y| i32::try_from(y).ok())
            .or_else(|| self.date.map(|d| d.year()));
        MonthSignals {
            number: self.month_number,
            name: self.month_name.as_deref(),
            year,
            date: self.date,
        }
    }
}

/// One line of a payment order (`orden_de_pago`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrderLine {
    /// Row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Payment order number (group key).
    pub orden_numero: i64,
    /// Project id.
    #[serde(rename = "proyecto", default, deserialize_with = "de::opt_int")]
    pub project_id: Option<i64>,
    /// Supplier id.
    #[serde(rename = "proveedor", default, deserialize_with = "de::opt_int")]
    pub supplier_id: Option<i64>,
    /// Purchase order number.
    #[serde(rename = "orden_compra", default, deserialize_with = "de::opt_int")]
    pub purchase_order: Option<i64>,
    /// Item id or type name.
    #[serde(default)]
    pub item: Option<ItemRef>,
    /// Month number or name.
    #[serde(rename = "mes", default)]
    pub month: Option<MonthField>,
    /// Line amount including tax.
    #[serde(rename = "costo_final_con_iva", default, deserialize_with = "de::amount")]
    pub amount: Decimal,
    /// Invoice date.
    #[serde(rename = "fecha_factura", default, deserialize_with = "de::date")]
    pub invoice_date: Option<NaiveDate>,
    /// Goods receipt line this payment covers.
    #[serde(rename = "ingreso_id", default, deserialize_with = "de::opt_int")]
    pub receipt_id: Option<i64>,
    /// Invoice or document number.
    #[serde(rename = "factura", default, deserialize_with = "de::opt_text")]
    pub document: Option<String>,
    /// Document status (`pendiente` / `completado`).
    #[serde(rename = "estado_documento", default, deserialize_with = "de::opt_text")]
    pub document_status: Option<String>,
}

impl PaymentOrderLine {
    /// Month signals of this line; the year comes from the invoice date.
    #[must_use]
    pub fn month_signals(&self) -> MonthSignals<'_> {
        MonthField::signals(self.month.as_ref(), self.invoice_date)
    }
}

/// A manually entered expense (`gastos_directos`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectExpense {
    /// Row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Project id.
    #[serde(rename = "proyecto_id")]
    pub project_id: i64,
    /// Item id.
    #[serde(rename = "item_id")]
    pub item: ItemRef,
    /// Month name or number.
    #[serde(rename = "mes", default)]
    pub month: Option<MonthField>,
    /// Amount.
    #[serde(rename = "monto", default, deserialize_with = "de::amount")]
    pub amount: Decimal,
    /// Expense date.
    #[serde(rename = "fecha", default, deserialize_with = "de::date")]
    pub date: Option<NaiveDate>,
    /// Description.
    #[serde(rename = "descripcion", default, deserialize_with = "de::opt_text")]
    pub description: Option<String>,
}

impl DirectExpense {
    /// Month signals of this expense; the year comes from its date.
    #[must_use]
    pub fn month_signals(&self) -> MonthSignals<'_> {
        MonthField::signals(self.month.as_ref(), self.date)
    }
}

/// Payment date of an order (`fechas_de_pagos_op`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDate {
    /// Payment order number.
    pub orden_numero: i64,
    /// Payment date.
    #[serde(rename = "fecha_pago", default, deserialize_with = "de::date")]
    pub paid_on: Option<NaiveDate>,
    /// How the date was set; `None` for legacy rows.
    #[serde(rename = "origen", default, deserialize_with = "de::origin")]
    pub origin: Option<DateOrigin>,
}

/// A partial payment (`abonos_op`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialPayment {
    /// Abono id.
    pub id: i64,
    /// Payment order number.
    pub orden_numero: i64,
    /// Amount paid.
    #[serde(rename = "monto_abono", default, deserialize_with = "de::amount")]
    pub amount: Decimal,
    /// Payment date.
    #[serde(rename = "fecha_abono", default, deserialize_with = "de::date")]
    pub paid_on: Option<NaiveDate>,
    /// Free-text note.
    #[serde(rename = "observacion", default, deserialize_with = "de::opt_text")]
    pub note: Option<String>,
}

/// A goods receipt line (`ingresos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    /// Row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Purchase order number.
    #[serde(rename = "orden_compra")]
    pub purchase_order: i64,
    /// Purchase order line number.
    #[serde(rename = "art_corr")]
    pub line_number: i64,
    /// Quantity received.
    #[serde(rename = "cantidad", default, deserialize_with = "de::opt_amount")]
    pub quantity: Option<Decimal>,
    /// Invoice number, when known.
    #[serde(rename = "factura", default, deserialize_with = "de::opt_text")]
    pub document: Option<String>,
    /// Still waiting for its invoice.
    #[serde(rename = "fac_pendiente", default, deserialize_with = "de::flag")]
    pub invoice_pending: bool,
}

/// A purchase order line (`orden_de_compra`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    /// Row id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Purchase order number.
    #[serde(rename = "orden_compra")]
    pub purchase_order: i64,
    /// Line number inside the purchase order.
    #[serde(rename = "art_corr")]
    pub line_number: i64,
    /// Supplier id.
    #[serde(rename = "proveedor", default, deserialize_with = "de::opt_int")]
    pub supplier_id: Option<i64>,
    /// Project id.
    #[serde(rename = "proyecto", default, deserialize_with = "de::opt_int")]
    pub project_id: Option<i64>,
    /// Description.
    #[serde(rename = "descripcion", default, deserialize_with = "de::opt_text")]
    pub description: Option<String>,
    /// Line total.
    #[serde(rename = "total", default, deserialize_with = "de::amount")]
    pub amount: Decimal,
    /// Order date.
    #[serde(rename = "fecha", default, deserialize_with = "de::date")]
    pub date: Option<NaiveDate>,
}

/// Lenient deserializers for legacy column values.
pub mod de {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};

    use super::DateOrigin;
    use crate::normalize::parse_date;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Bool(bool),
        Text(String),
    }

    /// Amount; null reads as zero.
    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Optional amount.
    pub fn opt_amount<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        Option::<Decimal>::deserialize(deserializer)
    }

    /// Date or timestamp text; unparseable values read as `None`.
    pub fn date<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?
            .as_deref()
            .and_then(parse_date))
    }

    /// Boolean; null reads as false.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Bool(value)) => value,
            Some(Loose::Int(value)) => value != 0,
            Some(Loose::Text(value)) => matches!(
                value.trim().to_lowercase().as_str(),
                "true" | "t" | "1" | "si" | "sí" | "yes"
            ),
            None => false,
        })
    }

    /// Integer, possibly stored as text; anything else reads as `None`.
    pub fn opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Int(value)) => Some(value),
            Some(Loose::Text(value)) => value.trim().parse().ok(),
            Some(Loose::Bool(_)) | None => None,
        })
    }

    /// Text, possibly stored as a number; blank reads as `None`.
    pub fn opt_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Text(value)) => {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Some(Loose::Int(value)) => Some(value.to_string()),
            Some(Loose::Bool(_)) | None => None,
        })
    }

    /// Date origin; unknown values read as `None`.
    pub fn origin<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateOrigin>, D::Error> {
        Ok(
            match Option::<String>::deserialize(deserializer)?
                .as_deref()
                .map(str::trim)
            {
                Some("manual") => Some(DateOrigin::Manual),
                Some("abono") => Some(DateOrigin::Abono),
                _ => None,
            },
        )
    }
}
