//! In-process datastore.
//!
//! Tables are vectors of JSON rows guarded by an async lock. Used by the
//! repository tests and for local runs without Postgres. It can cap the rows
//! returned per select, like a hosted API with a server-side row limit, and
//! fail selects or writes on demand.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{
    Datastore, FieldValue, Filter, Record, Row, SelectQuery, StoreError, require_filters,
};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    fn push(&mut self, mut row: Row) -> Row {
        match row.get("id").and_then(Value::as_i64) {
            Some(id) => self.next_id = self.next_id.max(id),
            None => {
                self.next_id += 1;
                row.insert("id".into(), Value::from(self.next_id));
            }
        }
        self.rows.push(row.clone());
        row
    }
}

/// Datastore keeping every table in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    max_rows: Option<usize>,
    selects: AtomicUsize,
    failures: DashMap<String, usize>,
    write_failures: DashMap<String, usize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns at most `max_rows` rows per select, whatever the range asks.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Lets `successes` more selects on `table` through, then fails every
    /// following one.
    pub fn fail_selects_after(&self, table: &str, successes: usize) {
        self.failures.insert(table.to_string(), successes);
    }

    /// Lets `successes` more writes on `table` through, then fails every
    /// following insert, update, delete or upsert on it.
    pub fn fail_writes_after(&self, table: &str, successes: usize) {
        self.write_failures.insert(table.to_string(), successes);
    }

    /// Stops failing writes on `table`.
    pub fn heal_writes(&self, table: &str) {
        self.write_failures.remove(table);
    }

    /// Number of selects served so far.
    pub fn select_count(&self) -> usize {
        self.selects.load(AtomicOrdering::Relaxed)
    }

    /// Loads raw rows into `table`; rows without `id` get one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuery` if a value is not a JSON object.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let target = tables.entry(table.to_string()).or_default();
        for row in rows {
            let Value::Object(row) = row else {
                return Err(StoreError::InvalidQuery(format!(
                    "seed rows for {table} must be objects"
                )));
            };
            target.push(row);
        }
        Ok(())
    }

    /// Snapshot of every row in `table`.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn check_failure(&self, table: &str) -> Result<(), StoreError> {
        consume(&self.failures, table, "select")
    }

    fn check_write(&self, table: &str) -> Result<(), StoreError> {
        consume(&self.write_failures, table, "write")
    }
}

fn consume(budget: &DashMap<String, usize>, table: &str, call: &str) -> Result<(), StoreError> {
    if let Some(mut remaining) = budget.get_mut(table) {
        if *remaining == 0 {
            return Err(DbErr::Custom(format!("{call} on {table} failed")).into());
        }
        *remaining -= 1;
    }
    Ok(())
}

fn to_row(record: &Record) -> Row {
    record
        .iter()
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect()
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| Decimal::from_str(&n.to_string()).ok())
            .or_else(|| Decimal::from_scientific(&n.to_string()).ok()),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| s.get(..10))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Orders a stored value against a filter operand; `None` when they cannot
/// be compared.
fn compare(stored: &Value, operand: &FieldValue) -> Option<Ordering> {
    match operand {
        FieldValue::Null => stored.is_null().then_some(Ordering::Equal),
        FieldValue::Bool(b) => stored.as_bool().map(|s| s.cmp(b)),
        FieldValue::Int(i) => as_decimal(stored).map(|s| s.cmp(&Decimal::from(*i))),
        FieldValue::Decimal(d) => as_decimal(stored).map(|s| s.cmp(d)),
        FieldValue::Text(t) => as_text(stored).map(|s| s.as_str().cmp(t.as_str())),
        FieldValue::Date(d) => as_date(stored).map(|s| s.cmp(d)),
    }
}

/// Case-insensitive `LIKE` with `%` and `_` wildcards.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // matched[j]: pattern[..i] matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for j in 0..=text.len() {
                    any |= matched[j];
                    next[j] = any;
                }
            }
            _ => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && (*p == '_' || *p == text[j - 1]);
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let stored = row.get(filter.column()).unwrap_or(&Value::Null);
        match filter {
            Filter::Eq(_, value) => compare(stored, value) == Some(Ordering::Equal),
            Filter::In(_, values) => values
                .iter()
                .any(|v| compare(stored, v) == Some(Ordering::Equal)),
            Filter::Gte(_, value) => compare(stored, value).is_some_and(Ordering::is_ge),
            Filter::Lte(_, value) => compare(stored, value).is_some_and(Ordering::is_le),
            Filter::ILike(_, pattern) => as_text(stored).is_some_and(|s| ilike(&s, pattern)),
        }
    })
}

/// Sort order of two stored values; nulls last, as Postgres does ascending.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => match (as_decimal(a), as_decimal(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => as_text(a).cmp(&as_text(b)),
        },
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        self.check_failure(query.table_name())?;
        self.selects.fetch_add(1, AtomicOrdering::Relaxed);

        let tables = self.tables.read().await;
        let Some(table) = tables.get(query.table_name()) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Row> = table
            .rows
            .iter()
            .filter(|row| matches(row, query.filters()))
            .collect();
        rows.sort_by(|a, b| {
            query.ordering().iter().fold(Ordering::Equal, |acc, key| {
                acc.then_with(|| {
                    let ord = order_values(
                        a.get(&key.column).unwrap_or(&Value::Null),
                        b.get(&key.column).unwrap_or(&Value::Null),
                    );
                    if key.desc { ord.reverse() } else { ord }
                })
            })
        });

        let (offset, limit) = query.bounds().unwrap_or((0, u64::MAX));
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit)
            .unwrap_or(usize::MAX)
            .min(self.max_rows.unwrap_or(usize::MAX));

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, query.selected_columns()))
            .collect())
    }

    async fn count(&self, query: &SelectQuery) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables.get(query.table_name()).map_or(0, |table| {
            table
                .rows
                .iter()
                .filter(|row| matches(row, query.filters()))
                .count()
        });
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Row>, StoreError> {
        self.check_write(table)?;
        let mut tables = self.tables.write().await;
        let target = tables.entry(table.to_string()).or_default();
        Ok(records.iter().map(|r| target.push(to_row(r))).collect())
    }

    async fn update(
        &self,
        table: &str,
        patch: Record,
        filters: &[Filter],
    ) -> Result<u64, StoreError> {
        require_filters(table, filters)?;
        self.check_write(table)?;
        let mut tables = self.tables.write().await;
        let Some(target) = tables.get_mut(table) else {
            return Ok(0);
        };

        let mut touched = 0;
        for row in target.rows.iter_mut().filter(|row| matches(row, filters)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.to_json());
            }
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        require_filters(table, filters)?;
        self.check_write(table)?;
        let mut tables = self.tables.write().await;
        let Some(target) = tables.get_mut(table) else {
            return Ok(0);
        };

        let before = target.rows.len();
        target.rows.retain(|row| !matches(row, filters));
        Ok(u64::try_from(before - target.rows.len()).unwrap_or(u64::MAX))
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        conflict: &[&str],
    ) -> Result<u64, StoreError> {
        self.check_write(table)?;
        let mut tables = self.tables.write().await;
        let target = tables.entry(table.to_string()).or_default();

        let mut written = 0;
        for record in &records {
            let key: Vec<Filter> = conflict
                .iter()
                .map(|c| Filter::eq(c, record.get(*c).cloned().unwrap_or(FieldValue::Null)))
                .collect();
            let row = to_row(record);
            match target.rows.iter_mut().find(|existing| matches(existing, &key)) {
                Some(existing) => existing.extend(row),
                None => {
                    target.push(row);
                }
            }
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::store::record;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                "orden_de_pago",
                vec![
                    json!({"id": 1, "orden_numero": 10, "costo_final_con_iva": "100.00", "factura": "F-001"}),
                    json!({"id": 2, "orden_numero": 10, "costo_final_con_iva": 50, "factura": null}),
                    json!({"id": 3, "orden_numero": 11, "costo_final_con_iva": "75.5", "factura": "f-002"}),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_ilike_wildcards() {
        assert!(ilike("Materiales", "mat%"));
        assert!(ilike("F-001", "f-0_1"));
        assert!(ilike("abc", "%"));
        assert!(!ilike("abc", "a_"));
        assert!(!ilike("", "_"));
    }

    #[tokio::test]
    async fn test_filters_compare_numbers_and_text() {
        let store = store().await;

        let rows = store
            .select(&SelectQuery::table("orden_de_pago").gte("costo_final_con_iva", dec!(75.5)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = store
            .select(&SelectQuery::table("orden_de_pago").ilike("factura", "F-%"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = store
            .select(&SelectQuery::table("orden_de_pago").eq("factura", FieldValue::Null))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_order_range_and_row_cap() {
        let store = store().await.with_max_rows(1);
        let query = SelectQuery::table("orden_de_pago")
            .order("costo_final_con_iva", true)
            .range(0, 10);

        let rows = store.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(store.count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_on_conflict() {
        let store = MemoryStore::new();
        let first = record([("orden_numero", 5_i64.into()), ("origen", "abono".into())]);
        let second = record([("orden_numero", 5_i64.into()), ("origen", "manual".into())]);

        store.upsert("fechas_de_pagos_op", vec![first], &["orden_numero"]).await.unwrap();
        store.upsert("fechas_de_pagos_op", vec![second], &["orden_numero"]).await.unwrap();

        let rows = store.rows("fechas_de_pagos_op").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["origen"], json!("manual"));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = store().await;
        store.fail_selects_after("orden_de_pago", 1);
        let query = SelectQuery::table("orden_de_pago");

        assert!(store.select(&query).await.is_ok());
        assert!(matches!(
            store.select(&query).await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = store().await;
        store.fail_writes_after("abonos_op", 1);
        let abono = || vec![record([("orden_numero", 5_i64.into())])];

        assert!(store.insert("abonos_op", abono()).await.is_ok());
        assert!(matches!(
            store.insert("abonos_op", abono()).await,
            Err(StoreError::Database(_))
        ));
        assert!(
            store
                .delete("abonos_op", &[Filter::eq("orden_numero", 5_i64)])
                .await
                .is_err()
        );
        assert_eq!(store.rows("abonos_op").await.len(), 1);

        store.heal_writes("abonos_op");
        assert!(store.insert("abonos_op", abono()).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_after_seeded_rows() {
        let store = store().await;
        let rows = store
            .insert("orden_de_pago", vec![record([("orden_numero", 12_i64.into())])])
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(4));
    }
}
