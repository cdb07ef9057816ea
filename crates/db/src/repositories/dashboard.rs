//! Dashboard repository for fleet-wide KPIs.

use chrono::NaiveDate;
use obrafin_core::dashboard::{DashboardInput, DashboardKpis, DashboardService};
use obrafin_core::records::{
    GoodsReceiptLine, PartialPayment, PaymentDate, PaymentOrderLine, PurchaseOrderLine,
};

use super::{ReferenceRepository, StoreHandle};
use crate::store::{SelectQuery, StoreError};
use crate::tables;

/// Dashboard repository for metrics queries.
#[derive(Debug, Clone)]
pub struct DashboardRepository {
    handle: StoreHandle,
    reference: ReferenceRepository,
}

impl DashboardRepository {
    /// Creates a new dashboard repository.
    #[must_use]
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            reference: ReferenceRepository::new(handle.clone()),
            handle,
        }
    }

    /// Computes every KPI at `as_of` over the whole order set, with `months`
    /// points of debt evolution.
    ///
    /// # Errors
    ///
    /// Returns an error if any table cannot be read completely.
    pub async fn get_dashboard_kpis(
        &self,
        as_of: NaiveDate,
        months: u32,
    ) -> Result<DashboardKpis, StoreError> {
        self.handle
            .within(async {
                let payment_query = SelectQuery::table(tables::PAYMENT_ORDERS).order("id", false);
                let abono_query = SelectQuery::table(tables::ABONOS).order("id", false);
                let date_query =
                    SelectQuery::table(tables::PAYMENT_DATES).order("orden_numero", false);
                let purchase_query = SelectQuery::table(tables::PURCHASE_ORDERS)
                    .order("orden_compra", false)
                    .order("art_corr", false);
                let receipt_query = SelectQuery::table(tables::RECEIPTS).order("id", false);

                let (payment_lines, abonos, payment_dates, purchase_orders, receipts) =
                    tokio::try_join!(
                        self.handle.fetch_all::<PaymentOrderLine>(&payment_query),
                        self.handle.fetch_all::<PartialPayment>(&abono_query),
                        self.handle.fetch_all::<PaymentDate>(&date_query),
                        self.handle.fetch_all::<PurchaseOrderLine>(&purchase_query),
                        self.handle.fetch_all::<GoodsReceiptLine>(&receipt_query),
                    )?;
                let (suppliers, projects) =
                    tokio::try_join!(self.reference.suppliers(), self.reference.projects())?;

                let kpis = DashboardService::compute(
                    &DashboardInput {
                        payment_lines: &payment_lines,
                        abonos: &abonos,
                        payment_dates: &payment_dates,
                        purchase_orders: &purchase_orders,
                        receipts: &receipts,
                        suppliers: &suppliers,
                        projects: &projects,
                    },
                    as_of,
                    months,
                );

                tracing::debug!(
                    %as_of,
                    lines = payment_lines.len(),
                    outstanding = %kpis.outstanding_total,
                    "Dashboard KPIs computed"
                );
                Ok::<_, StoreError>(kpis)
            })
            .await
    }
}
