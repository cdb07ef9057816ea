//! Budget matrix and budget write routes.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post, put},
};
use obrafin_core::budget::{BudgetLineInput, BudgetMatrix, CellDetail, DirectExpenseInput};
use obrafin_core::records::DirectExpense;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiResult, params};

/// Creates the budget routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/budget/matrix", get(get_matrix))
        .route("/budget/matrix/detail", get(get_matrix_detail))
        .route("/budget/lines", put(upsert_budget_lines))
        .route("/direct-expenses", post(create_direct_expense))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters of the matrix.
#[derive(Debug, Deserialize)]
pub struct MatrixQuery {
    /// Comma separated project ids.
    #[serde(default)]
    pub project_ids: String,
    /// First day of the range, `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Last day of the range, `YYYY-MM-DD`.
    pub to: Option<String>,
}

/// Query parameters of a cell drill-down.
#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    /// Project id.
    #[serde(default)]
    pub project_id: String,
    /// Item type name or code.
    #[serde(default)]
    pub item: String,
    /// Month as `Mon-YY`.
    #[serde(default)]
    pub month: String,
}

/// Request body for the bulk budget upsert.
#[derive(Debug, Deserialize)]
pub struct UpsertBudgetLinesRequest {
    /// Lines to write.
    pub lines: Vec<BudgetLineInput>,
}

/// Response of the bulk budget upsert.
#[derive(Debug, Serialize)]
pub struct UpsertBudgetLinesResponse {
    /// Lines written.
    pub written: u64,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_matrix(
    State(state): State<AppState>,
    query: Result<Query<MatrixQuery>, QueryRejection>,
) -> ApiResult<Json<BudgetMatrix>> {
    let Query(query) = query?;
    let project_ids = params::project_ids(&query.project_ids)?;
    let from = params::opt_date("from", query.from.as_deref())?;
    let to = params::opt_date("to", query.to.as_deref())?;

    let matrix = state.budgets.get_budget_matrix(&project_ids, from, to).await?;
    Ok(Json(matrix))
}

async fn get_matrix_detail(
    State(state): State<AppState>,
    query: Result<Query<DetailQuery>, QueryRejection>,
) -> ApiResult<Json<CellDetail>> {
    let Query(query) = query?;
    let project_id = params::id("project_id", &query.project_id)?;
    let month = params::month(&query.month)?;
    let detail = state
        .budgets
        .matrix_detail(project_id, &query.item, month)
        .await?;
    Ok(Json(detail))
}

async fn upsert_budget_lines(
    State(state): State<AppState>,
    request: Result<Json<UpsertBudgetLinesRequest>, JsonRejection>,
) -> ApiResult<Json<UpsertBudgetLinesResponse>> {
    let Json(request) = request?;
    let written = state.budgets.upsert_budget_lines(&request.lines).await?;
    Ok(Json(UpsertBudgetLinesResponse { written }))
}

async fn create_direct_expense(
    State(state): State<AppState>,
    input: Result<Json<DirectExpenseInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DirectExpense>)> {
    let Json(input) = input?;
    let expense = state.budgets.record_direct_expense(&input).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}
