//! KPI computation over the whole order set.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::types::{
    AgingBuckets, DashboardInput, DashboardKpis, DebtPoint, ProjectDebt, StateCounts,
    SupplierDebt, UnreceivedOrder,
};
use crate::normalize::MonthKey;
use crate::payment::{PaymentSnapshot, PaymentState};
use crate::records::{PartialPayment, PaymentDate, PaymentOrderLine, PurchaseOrderLine};

const NO_SUPPLIER: &str = "Sin proveedor";
const NO_PROJECT: &str = "Sin proyecto";

/// Rows of one payment order.
#[derive(Debug, Default)]
struct OrderRows<'a> {
    lines: Vec<&'a PaymentOrderLine>,
    abonos: Vec<&'a PartialPayment>,
    date: Option<&'a PaymentDate>,
}

impl OrderRows<'_> {
    /// Date the order became a debt: its earliest invoice date.
    fn dated(&self) -> Option<NaiveDate> {
        self.lines.iter().filter_map(|l| l.invoice_date).min()
    }

    fn supplier_id(&self) -> Option<i64> {
        self.lines.iter().find_map(|l| l.supplier_id)
    }

    fn project_id(&self) -> Option<i64> {
        self.lines.iter().find_map(|l| l.project_id)
    }

    /// Signals as known at `cutoff`. With `strict`, undated abonos and
    /// dates are left out too.
    fn snapshot_at(&self, orden_numero: i64, cutoff: NaiveDate, strict: bool) -> PaymentSnapshot {
        let known = |date: Option<NaiveDate>| date.map_or(!strict, |d| d <= cutoff);
        PaymentSnapshot::from_rows(
            orden_numero,
            self.lines.iter().copied(),
            self.abonos.iter().copied().filter(|a| known(a.paid_on)),
            self.date.filter(|d| known(d.paid_on)),
        )
    }
}

/// Groups every row by `orden_numero`; abonos and dates of orders without
/// lines are dropped.
fn group_orders<'a>(input: &DashboardInput<'a>) -> BTreeMap<i64, OrderRows<'a>> {
    let mut orders: BTreeMap<i64, OrderRows<'a>> = BTreeMap::new();
    for line in input.payment_lines {
        orders.entry(line.orden_numero).or_default().lines.push(line);
    }
    for abono in input.abonos {
        if let Some(order) = orders.get_mut(&abono.orden_numero) {
            order.abonos.push(abono);
        }
    }
    for date in input.payment_dates {
        if let Some(order) = orders.get_mut(&date.orden_numero) {
            order.date = Some(date);
        }
    }
    orders
}

/// Dashboard service for business logic.
pub struct DashboardService;

impl DashboardService {
    /// Computes every KPI at `as_of`, with `months` points of debt evolution.
    ///
    /// Headline figures take undated abonos and dates into account but
    /// ignore those dated after `as_of`. Orders invoiced after `as_of` are
    /// left out entirely; orders without any invoice date stay in.
    #[must_use]
    pub fn compute(input: &DashboardInput<'_>, as_of: NaiveDate, months: u32) -> DashboardKpis {
        let orders = group_orders(input);
        let supplier_names: HashMap<i64, &str> = input
            .suppliers
            .iter()
            .map(|s| (s.id, s.name.as_str()))
            .collect();
        let project_names: HashMap<i64, &str> = input
            .projects
            .iter()
            .map(|p| (p.id, p.name.as_str()))
            .collect();

        let mut counts = StateCounts::default();
        let mut outstanding_total = Decimal::ZERO;
        let mut by_supplier: HashMap<Option<i64>, (Decimal, u64)> = HashMap::new();
        let mut by_project: HashMap<Option<i64>, (Decimal, u64)> = HashMap::new();

        for (orden_numero, rows) in &orders {
            if rows.dated().is_some_and(|d| d > as_of) {
                continue;
            }
            let snapshot = rows.snapshot_at(*orden_numero, as_of, false);
            match snapshot.state() {
                PaymentState::Pending => counts.pending += 1,
                PaymentState::Abono => counts.abono += 1,
                PaymentState::Paid => {
                    counts.paid += 1;
                    continue;
                }
            }

            let balance = snapshot.balance();
            outstanding_total += balance;
            for (key, totals) in [
                (rows.supplier_id(), &mut by_supplier),
                (rows.project_id(), &mut by_project),
            ] {
                let entry = totals.entry(key).or_default();
                entry.0 += balance;
                entry.1 += 1;
            }
        }

        let mut by_supplier: Vec<SupplierDebt> = by_supplier
            .into_iter()
            .map(|(supplier_id, (amount, orders))| SupplierDebt {
                supplier_id,
                name: display_name(supplier_id, &supplier_names, NO_SUPPLIER, "Proveedor"),
                amount,
                orders,
            })
            .collect();
        by_supplier.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.supplier_id.cmp(&b.supplier_id)));

        let mut by_project: Vec<ProjectDebt> = by_project
            .into_iter()
            .map(|(project_id, (amount, orders))| ProjectDebt {
                project_id,
                name: display_name(project_id, &project_names, NO_PROJECT, "Proyecto"),
                amount,
                orders,
            })
            .collect();
        by_project.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.project_id.cmp(&b.project_id)));

        let unreceived_orders = Self::unreceived_orders(input, as_of, &supplier_names);
        let mut aging = AgingBuckets::default();
        for order in &unreceived_orders {
            aging.add(order.days_open, order.amount);
        }

        DashboardKpis {
            as_of,
            order_counts: counts,
            outstanding_total,
            by_supplier,
            by_project,
            unreceived_total: aging.total(),
            unreceived_orders,
            aging,
            invoices_pending: u64::try_from(
                input.receipts.iter().filter(|r| r.invoice_pending).count(),
            )
            .unwrap_or(u64::MAX),
            debt_evolution: Self::debt_evolution(&orders, as_of, months),
        }
    }

    /// Purchase orders whose lines `(orden_compra, art_corr)` have no goods
    /// receipt. Only the unreceived lines count towards the amount; lines
    /// dated after `as_of` are left out.
    fn unreceived_orders(
        input: &DashboardInput<'_>,
        as_of: NaiveDate,
        supplier_names: &HashMap<i64, &str>,
    ) -> Vec<UnreceivedOrder> {
        let received: HashSet<(i64, i64)> = input
            .receipts
            .iter()
            .map(|r| (r.purchase_order, r.line_number))
            .collect();

        let mut pending: BTreeMap<i64, Vec<&PurchaseOrderLine>> = BTreeMap::new();
        for line in input.purchase_orders {
            if received.contains(&(line.purchase_order, line.line_number))
                || line.date.is_some_and(|d| d > as_of)
            {
                continue;
            }
            pending.entry(line.purchase_order).or_default().push(line);
        }

        let mut orders: Vec<UnreceivedOrder> = pending
            .into_iter()
            .map(|(orden_compra, lines)| {
                let supplier_id = lines.iter().find_map(|l| l.supplier_id);
                let oldest_date = lines.iter().filter_map(|l| l.date).min();
                UnreceivedOrder {
                    orden_compra,
                    supplier_id,
                    supplier_name: supplier_id
                        .and_then(|id| supplier_names.get(&id))
                        .map(|name| (*name).to_string()),
                    project_id: lines.iter().find_map(|l| l.project_id),
                    lines: u64::try_from(lines.len()).unwrap_or(u64::MAX),
                    amount: lines.iter().map(|l| l.amount).sum(),
                    oldest_date,
                    days_open: oldest_date.map(|d| (as_of - d).num_days()),
                }
            })
            .collect();

        orders.sort_by(|a, b| {
            b.days_open
                .cmp(&a.days_open)
                .then(a.orden_compra.cmp(&b.orden_compra))
        });
        orders
    }

    /// Outstanding debt at each of the `months` month-ends up to `as_of`.
    ///
    /// Each point only sees orders invoiced, and abonos and payment dates
    /// dated, on or before its cutoff. The current month is cut at `as_of`.
    fn debt_evolution(
        orders: &BTreeMap<i64, OrderRows<'_>>,
        as_of: NaiveDate,
        months: u32,
    ) -> Vec<DebtPoint> {
        let last = MonthKey::from_date(as_of);
        let mut keys = Vec::new();
        let mut month = last;
        for _ in 0..months {
            keys.push(month);
            month = month.previous();
        }
        keys.reverse();

        keys.into_iter()
            .map(|month| {
                let cutoff = month.last_day().min(as_of);
                let amount = orders
                    .iter()
                    .filter(|(_, rows)| rows.dated().is_some_and(|d| d <= cutoff))
                    .map(|(orden_numero, rows)| {
                        rows.snapshot_at(*orden_numero, cutoff, true).balance()
                    })
                    .sum();
                DebtPoint {
                    month,
                    cutoff,
                    amount,
                }
            })
            .collect()
    }
}

fn display_name(
    id: Option<i64>,
    names: &HashMap<i64, &str>,
    missing: &str,
    prefix: &str,
) -> String {
    match id {
        None => missing.to_string(),
        Some(id) => names
            .get(&id)
            .map_or_else(|| format!("{prefix} {id}"), |name| (*name).to_string()),
    }
}
