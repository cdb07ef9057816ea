//! Spend aggregation into the budget matrix.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use super::types::{Amounts, BudgetMatrix, MonthRange, SkipReport, SpendSource};
use crate::normalize::{
    ItemCatalog, ItemCode, MonthKey, MonthSignals, normalize_item, normalize_month,
};
use crate::records::{BudgetLine, DirectExpense, ItemRef, PaymentOrderLine};

/// Accumulates budget lines, payment order lines and direct expenses into
/// `(project, item, month)` cells.
///
/// Every row goes through [`normalize_item`] and [`normalize_month`]. Rows
/// that do not resolve, fall outside the range, or belong to a project that
/// is not selected are counted in [`SkipReport`] and otherwise ignored.
/// Totals are derived from the cells in [`finish`](Self::finish), so they
/// are exact sums.
#[derive(Debug)]
pub struct SpendAggregator<'a> {
    catalog: &'a ItemCatalog,
    projects: BTreeSet<i64>,
    range: MonthRange,
    cells: BTreeMap<(i64, ItemCode, MonthKey), Amounts>,
    skipped: SkipReport,
}

impl<'a> SpendAggregator<'a> {
    /// Creates an aggregator for the selected projects.
    pub fn new(
        catalog: &'a ItemCatalog,
        projects: impl IntoIterator<Item = i64>,
        range: MonthRange,
    ) -> Self {
        Self {
            catalog,
            projects: projects.into_iter().collect(),
            range,
            cells: BTreeMap::new(),
            skipped: SkipReport::default(),
        }
    }

    /// Adds a budgeted amount.
    pub fn add_budget_line(&mut self, line: &BudgetLine) {
        self.accumulate(
            SpendSource::Budget,
            Some(line.project_id),
            Some(&line.item),
            &line.month_signals(),
            line.amount,
        );
    }

    /// Adds a payment order line as actual spend.
    pub fn add_payment_line(&mut self, line: &PaymentOrderLine) {
        self.accumulate(
            SpendSource::PaymentOrder,
            line.project_id,
            line.item.as_ref(),
            &line.month_signals(),
            line.amount,
        );
    }

    /// Adds a direct expense as actual spend.
    pub fn add_direct_expense(&mut self, expense: &DirectExpense) {
        self.accumulate(
            SpendSource::DirectExpense,
            Some(expense.project_id),
            Some(&expense.item),
            &expense.month_signals(),
            expense.amount,
        );
    }

    /// Rows skipped so far.
    #[must_use]
    pub const fn skipped(&self) -> &SkipReport {
        &self.skipped
    }

    /// Resolves the cell a row belongs to, or `None` after counting the skip.
    pub fn resolve(
        &mut self,
        source: SpendSource,
        project_id: Option<i64>,
        item: Option<&ItemRef>,
        signals: &MonthSignals<'_>,
    ) -> Option<(i64, ItemCode, MonthKey)> {
        let counts = self.skipped.counts_mut(source);

        let Some(project_id) = project_id.filter(|id| self.projects.contains(id)) else {
            counts.other_project += 1;
            return None;
        };
        let Some(item) = item.and_then(|item| normalize_item(item, self.catalog)) else {
            counts.unknown_item += 1;
            return None;
        };
        let Some(month) = normalize_month(signals) else {
            counts.unresolved_month += 1;
            return None;
        };
        if !self.range.contains(month) {
            counts.out_of_range += 1;
            return None;
        }
        Some((project_id, item, month))
    }

    fn accumulate(
        &mut self,
        source: SpendSource,
        project_id: Option<i64>,
        item: Option<&ItemRef>,
        signals: &MonthSignals<'_>,
        amount: Decimal,
    ) {
        let Some(key) = self.resolve(source, project_id, item, signals) else {
            return;
        };
        let cell = self.cells.entry(key).or_default();
        match source {
            SpendSource::Budget => cell.budget += amount,
            SpendSource::PaymentOrder | SpendSource::DirectExpense => cell.actual += amount,
        }
    }

    /// Builds the matrix and its totals. Summaries are left empty.
    #[must_use]
    pub fn finish(self) -> BudgetMatrix {
        let mut matrix = BudgetMatrix {
            skipped: self.skipped,
            ..BudgetMatrix::default()
        };
        let mut months = BTreeSet::new();

        for ((project_id, item, month), amounts) in self.cells {
            months.insert(month);
            *matrix
                .row_totals
                .entry(project_id)
                .or_default()
                .entry(item.clone())
                .or_default() += amounts;
            *matrix.column_totals.entry(month).or_default() += amounts;
            *matrix
                .project_month_totals
                .entry(project_id)
                .or_default()
                .entry(month)
                .or_default() += amounts;
            *matrix.project_totals.entry(project_id).or_default() += amounts;
            matrix.grand_total += amounts;
            matrix
                .cells
                .entry(project_id)
                .or_default()
                .entry(item)
                .or_default()
                .insert(month, amounts);
        }

        matrix.months = months.into_iter().collect();
        matrix
    }
}
