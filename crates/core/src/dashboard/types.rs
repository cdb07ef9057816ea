//! Dashboard data types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalize::MonthKey;
use crate::records::{
    GoodsReceiptLine, PartialPayment, PaymentDate, PaymentOrderLine, Project, PurchaseOrderLine,
    Supplier,
};

/// Unfiltered rows the KPIs are computed from.
#[derive(Debug, Clone, Copy)]
pub struct DashboardInput<'a> {
    /// Every payment order line.
    pub payment_lines: &'a [PaymentOrderLine],
    /// Every abono.
    pub abonos: &'a [PartialPayment],
    /// Every payment date row.
    pub payment_dates: &'a [PaymentDate],
    /// Every purchase order line.
    pub purchase_orders: &'a [PurchaseOrderLine],
    /// Every goods receipt line.
    pub receipts: &'a [GoodsReceiptLine],
    /// Supplier names.
    pub suppliers: &'a [Supplier],
    /// Project names.
    pub projects: &'a [Project],
}

/// Number of payment orders per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Nothing paid.
    pub pending: u64,
    /// Partially paid.
    pub abono: u64,
    /// Paid in full.
    pub paid: u64,
}

/// Outstanding debt with one supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDebt {
    /// Supplier id, `None` for orders without supplier.
    pub supplier_id: Option<i64>,
    /// Supplier name.
    pub name: String,
    /// Outstanding amount.
    pub amount: Decimal,
    /// Unpaid orders.
    pub orders: u64,
}

/// Outstanding debt of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDebt {
    /// Project id, `None` for orders without project.
    pub project_id: Option<i64>,
    /// Project name.
    pub name: String,
    /// Outstanding amount.
    pub amount: Decimal,
    /// Unpaid orders.
    pub orders: u64,
}

/// A purchase order with lines still waiting for their goods receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreceivedOrder {
    /// Purchase order number.
    pub orden_compra: i64,
    /// Supplier id.
    pub supplier_id: Option<i64>,
    /// Supplier name.
    pub supplier_name: Option<String>,
    /// Project id.
    pub project_id: Option<i64>,
    /// Unreceived lines.
    pub lines: u64,
    /// Sum of the unreceived lines only.
    pub amount: Decimal,
    /// Earliest line date.
    pub oldest_date: Option<NaiveDate>,
    /// Days since `oldest_date`.
    pub days_open: Option<i64>,
}

/// Unreceived amounts by age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBuckets {
    /// Open 0 to 30 days.
    pub days_0_30: Decimal,
    /// Open 31 to 60 days.
    pub days_31_60: Decimal,
    /// Open 61 to 90 days.
    pub days_61_90: Decimal,
    /// Open more than 90 days.
    pub over_90: Decimal,
    /// Without a date.
    pub undated: Decimal,
}

impl AgingBuckets {
    /// Adds `amount` to the bucket for `days_open`.
    pub fn add(&mut self, days_open: Option<i64>, amount: Decimal) {
        let bucket = match days_open {
            None => &mut self.undated,
            Some(..=30) => &mut self.days_0_30,
            Some(31..=60) => &mut self.days_31_60,
            Some(61..=90) => &mut self.days_61_90,
            Some(_) => &mut self.over_90,
        };
        *bucket += amount;
    }

    /// Sum of all buckets.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.days_0_30 + self.days_31_60 + self.days_61_90 + self.over_90 + self.undated
    }
}

/// Outstanding debt at one month-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtPoint {
    /// Month.
    pub month: MonthKey,
    /// Date the balance was computed at.
    pub cutoff: NaiveDate,
    /// Outstanding amount at the cutoff.
    pub amount: Decimal,
}

/// Fleet-wide payment and purchasing figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardKpis {
    /// Reference date.
    pub as_of: NaiveDate,
    /// Payment orders per state.
    pub order_counts: StateCounts,
    /// Sum of balances of unpaid orders.
    pub outstanding_total: Decimal,
    /// Debt by supplier, largest first.
    pub by_supplier: Vec<SupplierDebt>,
    /// Debt by project, largest first.
    pub by_project: Vec<ProjectDebt>,
    /// Purchase orders with unreceived lines, oldest first.
    pub unreceived_orders: Vec<UnreceivedOrder>,
    /// Sum of unreceived line amounts.
    pub unreceived_total: Decimal,
    /// Unreceived amounts by age.
    pub aging: AgingBuckets,
    /// Goods receipts still missing their invoice.
    pub invoices_pending: u64,
    /// Outstanding debt at each of the trailing month-ends.
    pub debt_evolution: Vec<DebtPoint>,
}
