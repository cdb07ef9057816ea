//! Payment state resolution.
//!
//! A payment order is PENDING, ABONO or PAID depending on two independent
//! signals: an explicit payment date and the running sum of its partial
//! payments (abonos). The state is derived here and nowhere else.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use error::PaymentError;
pub use service::PaymentService;
pub use types::{
    AbonoDecision, AbonoInput, DateAction, PaymentSnapshot, PaymentState, PaymentStatus,
};
