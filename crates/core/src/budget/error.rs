//! Budget error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Budget-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    /// No project ids were requested.
    #[error("At least one project must be selected")]
    EmptySelection,

    /// Requested projects that do not exist.
    #[error("Project not found: {}", join_ids(.0))]
    ProjectNotFound(Vec<i64>),

    /// `from` is after `to`.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidDateRange {
        /// Range start.
        from: NaiveDate,
        /// Range end.
        to: NaiveDate,
    },

    /// No month could be resolved from the given fields.
    #[error("Month cannot be resolved")]
    InvalidMonth,

    /// Item reference does not resolve to a budget item.
    #[error("Unknown budget item: {0}")]
    UnknownItem(String),

    /// Amount cannot be negative.
    #[error("Amount cannot be negative")]
    NegativeAmount,

    /// Amount must be greater than zero.
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
