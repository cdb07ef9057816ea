//! Budget repository: matrix, drill-down and budget writes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use obrafin_core::budget::{
    BudgetError, BudgetLineInput, BudgetMatrix, BudgetService, CellDetail, DetailInput,
    DirectExpenseInput, MatrixInput, MonthRange,
};
use obrafin_core::normalize::{MonthKey, canonical_item, spanish_month_name};
use obrafin_core::records::{
    BudgetLine, DirectExpense, GoodsReceiptLine, PaymentOrderLine, Project,
};

use super::{ReferenceRepository, StoreHandle};
use crate::store::{FieldValue, SelectQuery, StoreError, decode_rows, record};
use crate::tables;

/// Error types for budget operations.
#[derive(Debug, thiserror::Error)]
pub enum BudgetRepoError {
    /// Rejected by the budget rules.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// Datastore error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Budget repository.
#[derive(Debug, Clone)]
pub struct BudgetRepository {
    handle: StoreHandle,
    reference: ReferenceRepository,
}

impl BudgetRepository {
    /// Creates a new budget repository.
    #[must_use]
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            reference: ReferenceRepository::new(handle.clone()),
            handle,
        }
    }

    /// Builds the budget-vs-actual matrix for the requested projects.
    ///
    /// Inactive and finalized projects are dropped from the selection;
    /// `from` and `to` bound the months, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError` variants for an empty selection, unknown
    /// projects or an inverted range, and `StoreError` if any page fails.
    pub async fn get_budget_matrix(
        &self,
        project_ids: &[i64],
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<BudgetMatrix, BudgetRepoError> {
        let range = MonthRange::new(from, to)?;

        self.handle
            .within(async {
                let projects = self.reference.projects().await?;
                let selected = BudgetService::filter_projects(project_ids, &projects)?;
                let ids: Vec<i64> = selected.iter().map(|p| p.id).collect();
                let catalog = self.reference.catalog().await?;

                let (budget_lines, payment_lines, direct_expenses) = if ids.is_empty() {
                    (Vec::new(), Vec::new(), Vec::new())
                } else {
                    let budget_query = SelectQuery::table(tables::BUDGET_LINES)
                        .in_("proyecto_id", ids.iter().copied())
                        .order("id", false);
                    let payment_query = SelectQuery::table(tables::PAYMENT_ORDERS)
                        .in_("proyecto", ids.iter().copied())
                        .order("id", false);
                    let expense_query = SelectQuery::table(tables::DIRECT_EXPENSES)
                        .in_("proyecto_id", ids.iter().copied())
                        .order("id", false);
                    tokio::try_join!(
                        self.handle.fetch_all::<BudgetLine>(&budget_query),
                        self.handle.fetch_all::<PaymentOrderLine>(&payment_query),
                        self.handle.fetch_all::<DirectExpense>(&expense_query),
                    )?
                };

                let matrix = BudgetService::build_matrix(&MatrixInput {
                    projects: &selected,
                    catalog: &catalog,
                    range,
                    budget_lines: &budget_lines,
                    payment_lines: &payment_lines,
                    direct_expenses: &direct_expenses,
                });

                if matrix.skipped.total() > 0 {
                    tracing::debug!(
                        projects = ?ids,
                        budget_lines = matrix.skipped.budget_lines.total(),
                        payment_lines = matrix.skipped.payment_lines.total(),
                        direct_expenses = matrix.skipped.direct_expenses.total(),
                        "Skipped rows while building budget matrix"
                    );
                }
                Ok::<_, BudgetRepoError>(matrix)
            })
            .await
    }

    /// Lists the spend rows behind one matrix cell.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::ProjectNotFound` for an unknown project and
    /// `BudgetError::UnknownItem` for a blank item code.
    pub async fn matrix_detail(
        &self,
        project_id: i64,
        item: &str,
        month: MonthKey,
    ) -> Result<CellDetail, BudgetRepoError> {
        let code =
            canonical_item(item).ok_or_else(|| BudgetError::UnknownItem(item.to_string()))?;

        self.handle
            .within(async {
                let projects = self.reference.projects().await?;
                ensure_projects_exist([project_id], &projects)?;
                let catalog = self.reference.catalog().await?;

                let payment_query = SelectQuery::table(tables::PAYMENT_ORDERS)
                    .eq("proyecto", project_id)
                    .order("id", false);
                let expense_query = SelectQuery::table(tables::DIRECT_EXPENSES)
                    .eq("proyecto_id", project_id)
                    .order("id", false);
                let (payment_lines, direct_expenses) = tokio::try_join!(
                    self.handle.fetch_all::<PaymentOrderLine>(&payment_query),
                    self.handle.fetch_all::<DirectExpense>(&expense_query),
                )?;

                let receipt_ids: BTreeSet<i64> =
                    payment_lines.iter().filter_map(|l| l.receipt_id).collect();
                let receipts: Vec<GoodsReceiptLine> = if receipt_ids.is_empty() {
                    Vec::new()
                } else {
                    self.handle
                        .fetch_all(
                            &SelectQuery::table(tables::RECEIPTS)
                                .in_("id", receipt_ids)
                                .order("id", false),
                        )
                        .await?
                };

                Ok::<_, BudgetRepoError>(BudgetService::drill_down(
                    project_id,
                    &code,
                    month,
                    &DetailInput {
                        catalog: &catalog,
                        payment_lines: &payment_lines,
                        direct_expenses: &direct_expenses,
                        receipts: &receipts,
                    },
                ))
            })
            .await
    }

    /// Writes budget lines, replacing any line with the same project, item
    /// and month. Returns the number of lines written.
    ///
    /// When the batch repeats a key, the last line wins.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; nothing is written in that case.
    pub async fn upsert_budget_lines(
        &self,
        lines: &[BudgetLineInput],
    ) -> Result<u64, BudgetRepoError> {
        if lines.is_empty() {
            return Ok(0);
        }

        self.handle
            .within(async {
                let projects = self.reference.projects().await?;
                ensure_projects_exist(lines.iter().map(|l| l.project_id), &projects)?;
                let catalog = self.reference.catalog().await?;

                let mut by_key = BTreeMap::new();
                for line in lines {
                    let write = BudgetService::validate_budget_line(line, &catalog)?;
                    by_key.insert((write.project_id, write.item.clone(), write.month), write);
                }

                let records = by_key
                    .into_values()
                    .map(|w| {
                        record([
                            ("proyecto_id", w.project_id.into()),
                            ("item", w.item.clone().into()),
                            ("monto", w.amount.into()),
                            ("mes_numero", w.month.month().into()),
                            ("mes_nombre", spanish_month_name(w.month.month()).into()),
                            ("anio", w.month.year().into()),
                            ("fecha", w.date().into()),
                        ])
                    })
                    .collect();

                let written = self
                    .handle
                    .store()
                    .upsert(tables::BUDGET_LINES, records, &["proyecto_id", "item", "fecha"])
                    .await?;
                tracing::info!(lines = written, "Budget lines upserted");
                Ok::<_, BudgetRepoError>(written)
            })
            .await
    }

    /// Records a direct expense against a project and item.
    ///
    /// # Errors
    ///
    /// Returns `BudgetError::NonPositiveAmount`, `BudgetError::ProjectNotFound`
    /// or `BudgetError::UnknownItem` on invalid input.
    pub async fn record_direct_expense(
        &self,
        input: &DirectExpenseInput,
    ) -> Result<DirectExpense, BudgetRepoError> {
        self.handle
            .within(async {
                let projects = self.reference.projects().await?;
                ensure_projects_exist([input.project_id], &projects)?;
                let catalog = self.reference.catalog().await?;
                let write = BudgetService::validate_direct_expense(input, &catalog)?;

                let rows = self
                    .handle
                    .store()
                    .insert(
                        tables::DIRECT_EXPENSES,
                        vec![record([
                            ("proyecto_id", write.project_id.into()),
                            ("item_id", write.item_id.into()),
                            ("mes", write.month_name.into()),
                            ("monto", write.amount.into()),
                            ("fecha", write.date.into()),
                            ("descripcion", FieldValue::from(write.description.clone())),
                        ])],
                    )
                    .await?;

                let expense = decode_rows::<DirectExpense>(tables::DIRECT_EXPENSES, rows)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        StoreError::InvalidQuery("insert returned no row".to_string())
                    })?;
                tracing::info!(
                    project_id = write.project_id,
                    item_id = write.item_id,
                    amount = %write.amount,
                    year = write.date.year(),
                    month = write.month_name,
                    "Direct expense recorded"
                );
                Ok::<_, BudgetRepoError>(expense)
            })
            .await
    }
}

/// Fails with every id missing from `projects`.
fn ensure_projects_exist(
    ids: impl IntoIterator<Item = i64>,
    projects: &[Project],
) -> Result<(), BudgetError> {
    let known: BTreeSet<i64> = projects.iter().map(|p| p.id).collect();
    let missing: BTreeSet<i64> = ids.into_iter().filter(|id| !known.contains(id)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BudgetError::ProjectNotFound(missing.into_iter().collect()))
    }
}
