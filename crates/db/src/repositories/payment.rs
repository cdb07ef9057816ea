//! Payment repository: reads both completion signals of an order and applies
//! the payment rules under a per-order lock.
//!
//! Every mutation takes the order's lock first and re-reads lines, abonos
//! and the payment date inside it, so two concurrent abonos on the same
//! order can never both pass the over-payment check.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use obrafin_core::payment::{
    AbonoInput, DateAction, PaymentError, PaymentService, PaymentSnapshot, PaymentStatus,
};
use obrafin_core::records::{DateOrigin, PartialPayment, PaymentDate, PaymentOrderLine};
use serde::{Deserialize, Serialize};
use sea_orm::DbErr;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::StoreHandle;
use crate::store::{FieldValue, Filter, SelectQuery, StoreError, decode_rows, record};
use crate::tables;

/// Error types for payment operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentRepoError {
    /// Rejected by the payment rules.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Datastore error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A recorded abono and the order's state after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbonoReceipt {
    /// The stored abono.
    pub abono: PartialPayment,
    /// Order state after the abono.
    pub status: PaymentStatus,
}

/// An order whose payment date was not cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusedClear {
    /// Payment order number.
    pub orden_numero: i64,
    /// Why the date was kept.
    pub reason: String,
}

/// Outcome of a batch clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchClearReport {
    /// Orders left without a payment date.
    pub cleared: Vec<i64>,
    /// Orders fully covered by abonos.
    pub refused: Vec<RefusedClear>,
    /// Orders without lines.
    pub missing: Vec<i64>,
}

/// Payment repository.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    handle: StoreHandle,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    max_days_ahead: i64,
}

/// Held lock on one order. The map entry goes away with the last holder.
struct OrderLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    orden_numero: i64,
}

impl Drop for OrderLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.orden_numero, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl PaymentRepository {
    /// Creates a new payment repository accepting payment dates up to
    /// `max_days_ahead` days in the future.
    #[must_use]
    pub fn new(handle: StoreHandle, max_days_ahead: i64) -> Self {
        Self {
            handle,
            locks: Arc::new(DashMap::new()),
            max_days_ahead,
        }
    }

    async fn lock(&self, orden_numero: i64) -> OrderLock {
        let lock = self.locks.entry(orden_numero).or_default().clone();
        OrderLock {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            orden_numero,
        }
    }

    /// Runs a multi-write mutation on its own task, so a caller that goes
    /// away cannot stop it between two writes.
    async fn detached<T, F>(work: F) -> Result<T, PaymentRepoError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, PaymentRepoError>> + Send + 'static,
    {
        tokio::spawn(work).await.map_err(|err| {
            PaymentRepoError::from(StoreError::from(DbErr::Custom(format!(
                "payment task failed: {err}"
            ))))
        })?
    }

    /// Reads lines, abonos and payment date of one order.
    async fn snapshot(
        &self,
        orden_numero: i64,
    ) -> Result<(PaymentSnapshot, Vec<PartialPayment>), StoreError> {
        let line_query = SelectQuery::table(tables::PAYMENT_ORDERS)
            .eq("orden_numero", orden_numero)
            .order("id", false);
        let abono_query = SelectQuery::table(tables::ABONOS)
            .eq("orden_numero", orden_numero)
            .order("fecha_abono", false)
            .order("id", false);
        let date_query = SelectQuery::table(tables::PAYMENT_DATES)
            .eq("orden_numero", orden_numero)
            .order("orden_numero", false);

        let (lines, abonos, dates) = tokio::try_join!(
            self.handle.fetch_all::<PaymentOrderLine>(&line_query),
            self.handle.fetch_all::<PartialPayment>(&abono_query),
            self.handle.fetch_all::<PaymentDate>(&date_query),
        )?;

        let snapshot = PaymentSnapshot::from_rows(orden_numero, &lines, &abonos, dates.first());
        Ok((snapshot, abonos))
    }

    async fn upsert_date(
        &self,
        orden_numero: i64,
        date: NaiveDate,
        origin: Option<DateOrigin>,
    ) -> Result<(), StoreError> {
        self.handle
            .store()
            .upsert(
                tables::PAYMENT_DATES,
                vec![record([
                    ("orden_numero", orden_numero.into()),
                    ("fecha_pago", date.into()),
                    ("origen", origin.map(DateOrigin::as_str).into()),
                ])],
                &["orden_numero"],
            )
            .await?;
        Ok(())
    }

    async fn delete_date(&self, orden_numero: i64) -> Result<u64, StoreError> {
        self.handle
            .store()
            .delete(
                tables::PAYMENT_DATES,
                &[Filter::eq("orden_numero", orden_numero)],
            )
            .await
    }

    async fn insert_abono(
        &self,
        orden_numero: i64,
        input: &AbonoInput,
    ) -> Result<PartialPayment, StoreError> {
        let note = input
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let rows = self
            .handle
            .store()
            .insert(
                tables::ABONOS,
                vec![record([
                    ("orden_numero", orden_numero.into()),
                    ("monto_abono", input.amount.into()),
                    ("fecha_abono", input.date.into()),
                    ("observacion", FieldValue::from(note)),
                ])],
            )
            .await?;
        decode_rows::<PartialPayment>(tables::ABONOS, rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidQuery("insert returned no row".into()))
    }

    async fn delete_abono(&self, abono_id: i64) -> Result<u64, StoreError> {
        self.handle
            .store()
            .delete(tables::ABONOS, &[Filter::eq("id", abono_id)])
            .await
    }

    /// Current payment state of an order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order has no lines.
    pub async fn get_payment_state(
        &self,
        orden_numero: i64,
    ) -> Result<PaymentStatus, PaymentRepoError> {
        self.handle
            .within(async {
                let (snapshot, _) = self.snapshot(orden_numero).await?;
                if !snapshot.exists() {
                    return Err(PaymentRepoError::from(PaymentError::OrderNotFound(orden_numero)));
                }
                Ok(snapshot.status())
            })
            .await
    }

    /// Abonos of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order has no lines.
    pub async fn list_abonos(
        &self,
        orden_numero: i64,
    ) -> Result<Vec<PartialPayment>, PaymentRepoError> {
        self.handle
            .within(async {
                let (snapshot, abonos) = self.snapshot(orden_numero).await?;
                if !snapshot.exists() {
                    return Err(PaymentRepoError::from(PaymentError::OrderNotFound(orden_numero)));
                }
                Ok(abonos)
            })
            .await
    }

    /// Records an abono. When it brings the order to exactly its total, the
    /// abono date becomes the order's payment date, unless a date was
    /// already set manually.
    ///
    /// If the payment date cannot be written the abono is withdrawn again,
    /// so a failed call leaves the order as it was.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount`, `PaymentError::OrderNotFound`
    /// or `PaymentError::OverPayment`; nothing is written in those cases.
    pub async fn record_partial_payment(
        &self,
        orden_numero: i64,
        input: &AbonoInput,
    ) -> Result<AbonoReceipt, PaymentRepoError> {
        let repo = self.clone();
        let input = input.clone();
        Self::detached(async move { repo.record_locked(orden_numero, &input).await }).await
    }

    async fn record_locked(
        &self,
        orden_numero: i64,
        input: &AbonoInput,
    ) -> Result<AbonoReceipt, PaymentRepoError> {
        let _lock = self.lock(orden_numero).await;
        let (mut snapshot, _) = self.handle.within(self.snapshot(orden_numero)).await?;
        let decision = PaymentService::validate_partial_payment(&snapshot, input.amount)?;

        let abono = self
            .handle
            .within(self.insert_abono(orden_numero, input))
            .await?;
        snapshot.total_abonado = decision.new_total;

        if decision.completes_order && !snapshot.has_manual_date() {
            let write = self.upsert_date(orden_numero, input.date, Some(DateOrigin::Abono));
            if let Err(err) = self.handle.within(write).await {
                self.withdraw_abono(&abono, &err).await;
                return Err(err.into());
            }
            snapshot.payment_date = Some(input.date);
            snapshot.date_origin = Some(DateOrigin::Abono);
        }

        tracing::info!(
            orden_numero,
            abono_id = abono.id,
            amount = %input.amount,
            total_abonado = %decision.new_total,
            completes_order = decision.completes_order,
            "Abono recorded"
        );
        Ok(AbonoReceipt {
            abono,
            status: snapshot.status(),
        })
    }

    async fn withdraw_abono(&self, abono: &PartialPayment, cause: &StoreError) {
        match self.handle.within(self.delete_abono(abono.id)).await {
            Ok(_) => tracing::warn!(
                orden_numero = abono.orden_numero,
                abono_id = abono.id,
                %cause,
                "Abono withdrawn after the payment date write failed"
            ),
            Err(err) => tracing::error!(
                orden_numero = abono.orden_numero,
                abono_id = abono.id,
                %cause,
                %err,
                "Abono stored without its payment date"
            ),
        }
    }

    /// Deletes an abono and drops a payment date the remaining abonos no
    /// longer justify.
    ///
    /// The date goes first; if the abono then cannot be deleted the date is
    /// written back.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::AbonoNotFound` for an unknown id.
    pub async fn delete_partial_payment(
        &self,
        abono_id: i64,
    ) -> Result<PaymentStatus, PaymentRepoError> {
        let by_id = SelectQuery::table(tables::ABONOS)
            .eq("id", abono_id)
            .order("id", false);
        let orden_numero = self
            .handle
            .within(self.handle.fetch_all::<PartialPayment>(&by_id))
            .await?
            .first()
            .map(|a| a.orden_numero)
            .ok_or(PaymentError::AbonoNotFound(abono_id))?;

        let repo = self.clone();
        Self::detached(async move { repo.delete_locked(orden_numero, abono_id).await }).await
    }

    async fn delete_locked(
        &self,
        orden_numero: i64,
        abono_id: i64,
    ) -> Result<PaymentStatus, PaymentRepoError> {
        let _lock = self.lock(orden_numero).await;
        let (mut snapshot, abonos) = self.handle.within(self.snapshot(orden_numero)).await?;
        let abono = abonos
            .iter()
            .find(|a| a.id == abono_id)
            .ok_or(PaymentError::AbonoNotFound(abono_id))?;

        let (previous_date, previous_origin) = (snapshot.payment_date, snapshot.date_origin);
        snapshot.total_abonado -= abono.amount;
        let drop_date = PaymentService::after_abono_removed(&snapshot) == DateAction::Delete;

        if drop_date {
            self.handle.within(self.delete_date(orden_numero)).await?;
        }
        let removed = self.handle.within(self.delete_abono(abono_id)).await;
        if !matches!(removed, Ok(n) if n > 0) {
            if let (true, Some(date)) = (drop_date, previous_date) {
                self.restore_date(orden_numero, date, previous_origin).await;
            }
            return Err(match removed {
                Err(err) => err.into(),
                Ok(_) => PaymentError::AbonoNotFound(abono_id).into(),
            });
        }

        if drop_date {
            snapshot.payment_date = None;
            snapshot.date_origin = None;
        }
        tracing::info!(
            orden_numero,
            abono_id,
            total_abonado = %snapshot.total_abonado,
            "Abono deleted"
        );
        Ok(snapshot.status())
    }

    async fn restore_date(&self, orden_numero: i64, date: NaiveDate, origin: Option<DateOrigin>) {
        match self
            .handle
            .within(self.upsert_date(orden_numero, date, origin))
            .await
        {
            Ok(()) => tracing::warn!(orden_numero, %date, "Payment date restored"),
            Err(err) => tracing::error!(
                orden_numero,
                %date,
                %err,
                "Payment date lost while deleting an abono"
            ),
        }
    }

    /// Sets the payment date directly, marking the order paid in full.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::FutureDate` if `date` is too far after `today`,
    /// `PaymentError::OrderNotFound` if the order has no lines.
    pub async fn set_payment_date(
        &self,
        orden_numero: i64,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<PaymentStatus, PaymentRepoError> {
        self.handle
            .within(async {
                let _guard = self.lock(orden_numero).await;
                let (mut snapshot, _) = self.snapshot(orden_numero).await?;
                PaymentService::validate_payment_date(&snapshot, date, today, self.max_days_ahead)?;

                self.upsert_date(orden_numero, date, Some(DateOrigin::Manual))
                    .await?;
                snapshot.payment_date = Some(date);
                snapshot.date_origin = Some(DateOrigin::Manual);

                tracing::info!(orden_numero, %date, "Payment date set");
                Ok::<_, PaymentRepoError>(snapshot.status())
            })
            .await
    }

    /// Removes the payment date of an order. Returns whether a date was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::ClearRefused` if the abonos cover the total,
    /// `PaymentError::OrderNotFound` if the order has no lines.
    pub async fn clear_payment_date(&self, orden_numero: i64) -> Result<bool, PaymentRepoError> {
        self.handle
            .within(self.clear_locked(orden_numero))
            .await
    }

    async fn clear_locked(&self, orden_numero: i64) -> Result<bool, PaymentRepoError> {
        let _guard = self.lock(orden_numero).await;
        let (snapshot, _) = self.snapshot(orden_numero).await?;
        if !PaymentService::validate_clear(&snapshot)? {
            return Ok(false);
        }
        let removed = self.delete_date(orden_numero).await?;
        tracing::info!(orden_numero, "Payment date cleared");
        Ok(removed > 0)
    }

    /// Clears the payment date of several orders, each under its own lock.
    ///
    /// Refused and unknown orders are reported, not raised.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` as soon as any datastore call fails.
    pub async fn clear_payment_dates(
        &self,
        orders: &[i64],
    ) -> Result<BatchClearReport, PaymentRepoError> {
        self.handle
            .within(async {
                let mut report = BatchClearReport::default();
                let unique: BTreeSet<i64> = orders.iter().copied().collect();

                for orden_numero in unique {
                    match self.clear_locked(orden_numero).await {
                        Ok(_) => report.cleared.push(orden_numero),
                        Err(PaymentRepoError::Payment(PaymentError::OrderNotFound(_))) => {
                            report.missing.push(orden_numero);
                        }
                        Err(PaymentRepoError::Payment(err)) => {
                            tracing::info!(orden_numero, %err, "Payment date kept");
                            report.refused.push(RefusedClear {
                                orden_numero,
                                reason: err.to_string(),
                            });
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(report)
            })
            .await
    }
}
