//! Dashboard routes.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use chrono::Local;
use obrafin_core::dashboard::DashboardKpis;
use serde::Deserialize;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    params,
};

/// Longest debt evolution series a request may ask for.
const MAX_EVOLUTION_MONTHS: u32 = 60;

/// Creates the dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard/kpis", get(get_dashboard_kpis))
}

/// Query parameters for the KPIs.
#[derive(Debug, Deserialize)]
pub struct KpisQuery {
    /// Reference date, `YYYY-MM-DD`; today when absent.
    pub as_of: Option<String>,
    /// Debt evolution points.
    pub months: Option<String>,
}

async fn get_dashboard_kpis(
    State(state): State<AppState>,
    query: Result<Query<KpisQuery>, QueryRejection>,
) -> ApiResult<Json<DashboardKpis>> {
    let Query(query) = query?;
    let as_of = params::opt_date("as_of", query.as_of.as_deref())?
        .unwrap_or_else(|| Local::now().date_naive());
    let months = params::opt_months(query.months.as_deref())?.unwrap_or(state.evolution_months);
    if !(1..=MAX_EVOLUTION_MONTHS).contains(&months) {
        return Err(ApiError::validation(format!(
            "months must be between 1 and {MAX_EVOLUTION_MONTHS}"
        )));
    }

    let kpis = state.dashboard.get_dashboard_kpis(as_of, months).await?;
    Ok(Json(kpis))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{app, send};

    #[tokio::test]
    async fn test_kpis() {
        let (app, _) = app().await;

        let (status, body) = send(
            &app,
            "GET",
            "/api/v1/dashboard/kpis?as_of=2024-06-30&months=3",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order_counts"]["pending"], 2);
        assert_eq!(body["outstanding_total"], "1250");
        assert_eq!(body["by_supplier"][0]["name"], "Ferreteria Sur");
        let months: Vec<&str> = body["debt_evolution"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["month"].as_str().unwrap())
            .collect();
        assert_eq!(months, vec!["Apr-24", "May-24", "Jun-24"]);
        assert_eq!(body["unreceived_orders"], json!([]));
    }

    #[tokio::test]
    async fn test_kpis_defaults_and_errors() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/v1/dashboard/kpis", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["debt_evolution"].as_array().unwrap().len(), 6);

        let (status, _) = send(&app, "GET", "/api/v1/dashboard/kpis?months=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/api/v1/dashboard/kpis?months=seis", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid months: seis");

        let (status, body) =
            send(&app, "GET", "/api/v1/dashboard/kpis?as_of=30-06-2024", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}
