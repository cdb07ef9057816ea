//! Key normalization.
//!
//! Spend rows reference budget items either by id or by free-text type name,
//! and months as numbers, Spanish or English names, or invoice dates. Every
//! aggregation path resolves those through this module so that rows from all
//! sources land on the same `(item, month)` keys.

pub mod item;
pub mod month;


pub use item::{ItemCatalog, ItemCode, canonical_item, normalize_item};
pub use month::{
    MonthKey, MonthParseError, MonthSignals, month_from_name, normalize_month, parse_date,
    spanish_month_name,
};
