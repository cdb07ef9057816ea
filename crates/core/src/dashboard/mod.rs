//! Dashboard KPIs.
//!
//! Fleet-wide figures over the entire order set:
//! - order counts per payment state and outstanding debt
//! - debt by supplier and by project
//! - purchase orders still waiting for goods, with aging
//! - month-end debt evolution

pub mod service;
pub mod types;


pub use service::DashboardService;
pub use types::*;
