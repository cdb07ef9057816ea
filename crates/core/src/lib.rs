//! Core business logic for Obrafin.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain records, normalization rules, and calculations live here.
//!
//! # Modules
//!
//! - `records` - Typed rows of the shared datastore
//! - `normalize` - Canonical item codes and month keys
//! - `budget` - Budget vs actual aggregation and drill-down
//! - `payment` - Payment order state resolution and abono rules
//! - `dashboard` - Fleet-wide debt and receipt KPIs

pub mod budget;
pub mod dashboard;
pub mod normalize;
pub mod payment;
pub mod records;
