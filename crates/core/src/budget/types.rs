//! Budget matrix data types.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::BudgetError;
use crate::normalize::{ItemCode, MonthKey};
use crate::records::ItemRef;

/// Budgeted and actual spend of one matrix cell or total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amounts {
    /// Budgeted spend ("presupuesto").
    pub budget: Decimal,
    /// Actual spend ("real").
    pub actual: Decimal,
}

impl AddAssign for Amounts {
    fn add_assign(&mut self, rhs: Self) {
        self.budget += rhs.budget;
        self.actual += rhs.actual;
    }
}

/// Where a spend figure comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendSource {
    /// `presupuesto` rows.
    Budget,
    /// `orden_de_pago` lines.
    PaymentOrder,
    /// `gastos_directos` rows.
    DirectExpense,
}

/// Rows left out of the matrix, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Item reference did not resolve.
    pub unknown_item: u64,
    /// No month signal resolved.
    pub unresolved_month: u64,
    /// Month outside the requested range.
    pub out_of_range: u64,
    /// Row belongs to no selected project.
    pub other_project: u64,
}

impl SkipCounts {
    /// Total skipped rows.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.unknown_item + self.unresolved_month + self.out_of_range + self.other_project
    }
}

/// Skipped rows per source table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReport {
    /// Budget lines.
    pub budget_lines: SkipCounts,
    /// Payment order lines.
    pub payment_lines: SkipCounts,
    /// Direct expenses.
    pub direct_expenses: SkipCounts,
}

impl SkipReport {
    /// Counts of one source.
    pub fn counts_mut(&mut self, source: SpendSource) -> &mut SkipCounts {
        match source {
            SpendSource::Budget => &mut self.budget_lines,
            SpendSource::PaymentOrder => &mut self.payment_lines,
            SpendSource::DirectExpense => &mut self.direct_expenses,
        }
    }

    /// Total skipped rows over all sources.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.budget_lines.total() + self.payment_lines.total() + self.direct_expenses.total()
    }
}

/// Inclusive month range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthRange {
    from: Option<MonthKey>,
    to: Option<MonthKey>,
}

impl MonthRange {
    /// Builds the range at month granularity.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::InvalidDateRange` if `from` is after `to`.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, BudgetError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(BudgetError::InvalidDateRange { from, to });
            }
        }
        Ok(Self {
            from: from.map(MonthKey::from_date),
            to: to.map(MonthKey::from_date),
        })
    }

    /// Range without bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    /// Whether `month` falls inside the range.
    #[must_use]
    pub fn contains(&self, month: MonthKey) -> bool {
        self.from.is_none_or(|from| month >= from) && self.to.is_none_or(|to| month <= to)
    }
}

/// Budget summary of a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    /// Contracted sale amount.
    pub sale_amount: Decimal,
    /// Sum of budgeted spend.
    pub total_budgeted_spend: Decimal,
    /// Sale amount minus budgeted spend.
    pub difference: Decimal,
}

/// Actual summary of a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualSummary {
    /// Production amount.
    pub production_amount: Decimal,
    /// Sum of actual spend.
    pub total_actual_spend: Decimal,
    /// Production amount minus actual spend.
    pub difference: Decimal,
}

/// Both summary blocks of a single-project matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummaries {
    /// Project id.
    pub project_id: i64,
    /// Sales vs budgeted spend.
    pub budget: BudgetSummary,
    /// Production vs actual spend.
    pub actual: ActualSummary,
}

/// Project header of a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHeader {
    /// Project id.
    pub id: i64,
    /// Project name.
    pub name: String,
}

/// Project x item x month budget-vs-actual matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetMatrix {
    /// Selected projects, in request order.
    pub projects: Vec<ProjectHeader>,
    /// Every month with at least one cell, ascending.
    pub months: Vec<MonthKey>,
    /// `project -> item -> month -> amounts`.
    pub cells: BTreeMap<i64, BTreeMap<ItemCode, BTreeMap<MonthKey, Amounts>>>,
    /// `project -> item -> amounts` over all months.
    pub row_totals: BTreeMap<i64, BTreeMap<ItemCode, Amounts>>,
    /// `month -> amounts` over every selected project and item.
    pub column_totals: BTreeMap<MonthKey, Amounts>,
    /// `project -> month -> amounts` over all items.
    pub project_month_totals: BTreeMap<i64, BTreeMap<MonthKey, Amounts>>,
    /// `project -> amounts` over the whole project.
    pub project_totals: BTreeMap<i64, Amounts>,
    /// Sum of every cell.
    pub grand_total: Amounts,
    /// Present when exactly one project is selected.
    pub summaries: Option<ProjectSummaries>,
    /// Rows left out, by source and reason.
    pub skipped: SkipReport,
}

impl BudgetMatrix {
    /// Amounts of one cell, zero when empty.
    #[must_use]
    pub fn cell(&self, project_id: i64, item: &ItemCode, month: MonthKey) -> Amounts {
        self.cells
            .get(&project_id)
            .and_then(|items| items.get(item))
            .and_then(|months| months.get(&month))
            .copied()
            .unwrap_or_default()
    }
}

/// One literal row behind a matrix cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLine {
    /// Source table.
    pub source: SpendSource,
    /// Row id.
    pub id: Option<i64>,
    /// Payment order number, for payment order lines.
    pub orden_numero: Option<i64>,
    /// Supplier id, for payment order lines.
    pub supplier_id: Option<i64>,
    /// Invoice number or description.
    pub reference: Option<String>,
    /// Invoice or expense date.
    pub date: Option<NaiveDate>,
    /// Amount.
    pub amount: Decimal,
    /// Whether the linked goods receipt still waits for its invoice.
    pub invoice_pending: Option<bool>,
}

/// Drill-down of one matrix cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDetail {
    /// Project id.
    pub project_id: i64,
    /// Item code.
    pub item: ItemCode,
    /// Month.
    pub month: MonthKey,
    /// Contributing rows.
    pub lines: Vec<DetailLine>,
    /// Sum of the line amounts; equals the cell's actual spend.
    pub total: Decimal,
}

/// A budget line to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLineInput {
    /// Project id.
    pub project_id: i64,
    /// Item id or type name.
    pub item: ItemRef,
    /// Budgeted amount.
    pub amount: Decimal,
    /// Any date inside the budgeted month.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Month number.
    #[serde(default)]
    pub month_number: Option<i64>,
    /// Month name.
    #[serde(default)]
    pub month_name: Option<String>,
    /// Year.
    #[serde(default)]
    pub year: Option<i32>,
}

/// A validated budget line, keyed by `(project_id, item, month)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetLineWrite {
    /// Project id.
    pub project_id: i64,
    /// Stored item value (id as text, or trimmed type name).
    pub item: String,
    /// Budgeted amount.
    pub amount: Decimal,
    /// Budgeted month.
    pub month: MonthKey,
}

impl BudgetLineWrite {
    /// First day of the budgeted month, the stored `fecha`.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.month.first_day()
    }
}

/// A direct expense to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectExpenseInput {
    /// Project id.
    pub project_id: i64,
    /// Item id.
    pub item_id: i64,
    /// Amount.
    pub amount: Decimal,
    /// Expense date.
    pub date: NaiveDate,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated direct expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectExpenseWrite {
    /// Project id.
    pub project_id: i64,
    /// Item id.
    pub item_id: i64,
    /// Spanish month name of the expense date.
    pub month_name: &'static str,
    /// Amount.
    pub amount: Decimal,
    /// Expense date.
    pub date: NaiveDate,
    /// Trimmed description.
    pub description: Option<String>,
}
