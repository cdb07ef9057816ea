//! Budget-vs-actual matrix.
//!
//! Budget lines, payment order lines and direct expenses are merged into one
//! `project x item x month` accumulator. Payment order lines and direct
//! expenses both count as actual spend and are indistinguishable once
//! aggregated; the drill-down recovers the individual rows of a cell.

pub mod aggregator;
pub mod error;
pub mod service;
pub mod types;


pub use aggregator::SpendAggregator;
pub use error::BudgetError;
pub use service::{BudgetService, DetailInput, MatrixInput};
pub use types::{
    ActualSummary, Amounts, BudgetLineInput, BudgetLineWrite, BudgetMatrix, BudgetSummary,
    CellDetail, DetailLine, DirectExpenseInput, DirectExpenseWrite, MonthRange, ProjectHeader,
    ProjectSummaries, SkipCounts, SkipReport, SpendSource,
};
