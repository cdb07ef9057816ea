//! Budget service for matrix building, drill-down and write validation.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;

use super::aggregator::SpendAggregator;
use super::error::BudgetError;
use super::types::{
    ActualSummary, Amounts, BudgetLineInput, BudgetLineWrite, BudgetMatrix, BudgetSummary,
    CellDetail, DetailLine, DirectExpenseInput, DirectExpenseWrite, MonthRange, ProjectHeader,
    ProjectSummaries, SpendSource,
};
use crate::normalize::{
    ItemCatalog, ItemCode, MonthKey, MonthSignals, normalize_item, normalize_month,
    spanish_month_name,
};
use crate::records::{
    BudgetLine, DirectExpense, GoodsReceiptLine, ItemRef, PaymentOrderLine, Project,
};

/// Source rows of a matrix request, already restricted to the selected
/// projects by the caller.
#[derive(Debug, Clone, Copy)]
pub struct MatrixInput<'a> {
    /// Selected projects (after [`BudgetService::filter_projects`]).
    pub projects: &'a [&'a Project],
    /// Item lookup.
    pub catalog: &'a ItemCatalog,
    /// Month range.
    pub range: MonthRange,
    /// Budget lines.
    pub budget_lines: &'a [BudgetLine],
    /// Payment order lines.
    pub payment_lines: &'a [PaymentOrderLine],
    /// Direct expenses.
    pub direct_expenses: &'a [DirectExpense],
}

/// Rows behind one matrix cell.
#[derive(Debug, Clone, Copy)]
pub struct DetailInput<'a> {
    /// Item lookup.
    pub catalog: &'a ItemCatalog,
    /// Payment order lines of the project.
    pub payment_lines: &'a [PaymentOrderLine],
    /// Direct expenses of the project.
    pub direct_expenses: &'a [DirectExpense],
    /// Goods receipts referenced by the payment order lines.
    pub receipts: &'a [GoodsReceiptLine],
}

struct CellMatcher<'a> {
    catalog: &'a ItemCatalog,
    project_id: i64,
    item: &'a ItemCode,
    month: MonthKey,
}

impl CellMatcher<'_> {
    fn matches(
        &self,
        project_id: Option<i64>,
        item: Option<&ItemRef>,
        signals: &MonthSignals<'_>,
    ) -> bool {
        project_id == Some(self.project_id)
            && item.and_then(|i| normalize_item(i, self.catalog)).as_ref() == Some(self.item)
            && normalize_month(signals) == Some(self.month)
    }
}

/// Budget service for business logic.
pub struct BudgetService;

impl BudgetService {
    /// Resolves requested project ids against the project table.
    ///
    /// Duplicates are dropped (first occurrence wins), inactive and
    /// finalized projects are left out.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::EmptySelection` if no id was requested.
    /// Returns `BudgetError::ProjectNotFound` listing every unknown id.
    pub fn filter_projects<'a>(
        requested: &[i64],
        projects: &'a [Project],
    ) -> Result<Vec<&'a Project>, BudgetError> {
        if requested.is_empty() {
            return Err(BudgetError::EmptySelection);
        }

        let by_id: HashMap<i64, &Project> = projects.iter().map(|p| (p.id, p)).collect();
        let mut seen = BTreeSet::new();
        let mut missing = Vec::new();
        let mut selected = Vec::new();

        for id in requested {
            if !seen.insert(*id) {
                continue;
            }
            match by_id.get(id) {
                Some(project) if project.is_budgetable() => selected.push(*project),
                Some(_) => {}
                None => missing.push(*id),
            }
        }

        if missing.is_empty() {
            Ok(selected)
        } else {
            Err(BudgetError::ProjectNotFound(missing))
        }
    }

    /// Aggregates the matrix, with summaries when exactly one project is
    /// selected.
    #[must_use]
    pub fn build_matrix(input: &MatrixInput<'_>) -> BudgetMatrix {
        let mut aggregator =
            SpendAggregator::new(input.catalog, input.projects.iter().map(|p| p.id), input.range);

        for line in input.budget_lines {
            aggregator.add_budget_line(line);
        }
        for line in input.payment_lines {
            aggregator.add_payment_line(line);
        }
        for expense in input.direct_expenses {
            aggregator.add_direct_expense(expense);
        }

        let mut matrix = aggregator.finish();
        matrix.projects = input
            .projects
            .iter()
            .map(|p| ProjectHeader {
                id: p.id,
                name: p.name.clone(),
            })
            .collect();

        if let [project] = input.projects {
            let totals = matrix
                .project_totals
                .get(&project.id)
                .copied()
                .unwrap_or_default();
            matrix.summaries = Some(Self::summaries(project, totals));
        }
        matrix
    }

    /// Sales vs budgeted spend and production vs actual spend of a project.
    /// Missing sale or production amounts count as zero.
    #[must_use]
    pub fn summaries(project: &Project, totals: Amounts) -> ProjectSummaries {
        let sale_amount = project.sale_amount.unwrap_or_default();
        let production_amount = project.production_amount.unwrap_or_default();

        ProjectSummaries {
            project_id: project.id,
            budget: BudgetSummary {
                sale_amount,
                total_budgeted_spend: totals.budget,
                difference: sale_amount - totals.budget,
            },
            actual: ActualSummary {
                production_amount,
                total_actual_spend: totals.actual,
                difference: production_amount - totals.actual,
            },
        }
    }

    /// Lists the payment order lines and direct expenses behind one cell.
    ///
    /// Rows are matched through the same normalization as the matrix, so the
    /// detail total equals the cell's actual spend.
    #[must_use]
    pub fn drill_down(
        project_id: i64,
        item: &ItemCode,
        month: MonthKey,
        input: &DetailInput<'_>,
    ) -> CellDetail {
        let pending: HashMap<i64, bool> = input
            .receipts
            .iter()
            .filter_map(|r| r.id.map(|id| (id, r.invoice_pending)))
            .collect();
        let cell = CellMatcher {
            catalog: input.catalog,
            project_id,
            item,
            month,
        };

        let mut lines: Vec<DetailLine> = input
            .payment_lines
            .iter()
            .filter(|l| cell.matches(l.project_id, l.item.as_ref(), &l.month_signals()))
            .map(|l| DetailLine {
                source: SpendSource::PaymentOrder,
                id: l.id,
                orden_numero: Some(l.orden_numero),
                supplier_id: l.supplier_id,
                reference: l.document.clone(),
                date: l.invoice_date,
                amount: l.amount,
                invoice_pending: Some(
                    l.receipt_id
                        .and_then(|id| pending.get(&id).copied())
                        .unwrap_or(false),
                ),
            })
            .collect();

        lines.extend(
            input
                .direct_expenses
                .iter()
                .filter(|e| cell.matches(Some(e.project_id), Some(&e.item), &e.month_signals()))
                .map(|e| DetailLine {
                    source: SpendSource::DirectExpense,
                    id: e.id,
                    orden_numero: None,
                    supplier_id: None,
                    reference: e.description.clone(),
                    date: e.date,
                    amount: e.amount,
                    invoice_pending: None,
                }),
        );

        let total = lines.iter().map(|l| l.amount).sum();
        CellDetail {
            project_id,
            item: item.clone(),
            month,
            lines,
            total,
        }
    }

    /// Validates a budget line and resolves its month.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NegativeAmount` if the amount is negative.
    /// Returns `BudgetError::UnknownItem` if the item does not resolve.
    /// Returns `BudgetError::InvalidMonth` if no month resolves.
    pub fn validate_budget_line(
        input: &BudgetLineInput,
        catalog: &ItemCatalog,
    ) -> Result<BudgetLineWrite, BudgetError> {
        if input.amount < Decimal::ZERO {
            return Err(BudgetError::NegativeAmount);
        }

        let stored_item = match &input.item {
            ItemRef::Id(id) => id.to_string(),
            ItemRef::Name(name) => name.trim().to_string(),
        };
        if normalize_item(&input.item, catalog).is_none() {
            return Err(BudgetError::UnknownItem(stored_item));
        }

        let signals = MonthSignals {
            number: input.month_number,
            name: input.month_name.as_deref(),
            year: input.year,
            date: input.date,
        };
        let month = normalize_month(&signals).ok_or(BudgetError::InvalidMonth)?;

        Ok(BudgetLineWrite {
            project_id: input.project_id,
            item: stored_item,
            amount: input.amount,
            month,
        })
    }

    /// Validates a direct expense.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NonPositiveAmount` if the amount is not positive.
    /// Returns `BudgetError::UnknownItem` if the item id is not in the catalog.
    pub fn validate_direct_expense(
        input: &DirectExpenseInput,
        catalog: &ItemCatalog,
    ) -> Result<DirectExpenseWrite, BudgetError> {
        if input.amount <= Decimal::ZERO {
            return Err(BudgetError::NonPositiveAmount);
        }
        if catalog.type_name(input.item_id).is_none() {
            return Err(BudgetError::UnknownItem(input.item_id.to_string()));
        }

        let month = MonthKey::from_date(input.date);
        let month_name = spanish_month_name(month.month()).ok_or(BudgetError::InvalidMonth)?;

        Ok(DirectExpenseWrite {
            project_id: input.project_id,
            item_id: input.item_id,
            month_name,
            amount: input.amount,
            date: input.date,
            description: input
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        })
    }
}
