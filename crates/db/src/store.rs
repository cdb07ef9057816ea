//! Datastore contract.
//!
//! Every table access goes through [`Datastore`]: reads return untyped JSON
//! rows that are decoded into `obrafin_core::records` types right here at the
//! boundary, writes take typed [`FieldValue`] records.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A row as read from the store.
pub type Row = Map<String, Value>;

/// A row to write, `column -> value`.
pub type Record = BTreeMap<String, FieldValue>;

/// Typed value of a written column or a filter operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// SQL `NULL`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Exact decimal.
    Decimal(Decimal),
    /// Text.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
}

impl FieldValue {
    /// The value as it appears in a read row.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Text(t) => Value::String(t.clone()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(t) => write!(f, "'{t}'"),
            Self::Date(d) => write!(f, "{d}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Builds a [`Record`] from `(column, value)` pairs.
#[must_use]
pub fn record<const N: usize>(fields: [(&str, FieldValue); N]) -> Record {
    fields
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

/// A row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq(String, FieldValue),
    /// `column IN (values)`
    In(String, Vec<FieldValue>),
    /// `column >= value`
    Gte(String, FieldValue),
    /// `column <= value`
    Lte(String, FieldValue),
    /// `column ILIKE pattern` (`%` and `_` wildcards)
    ILike(String, String),
}

impl Filter {
    /// `column = value`
    pub fn eq(column: &str, value: impl Into<FieldValue>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    /// Filtered column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(c, _)
            | Self::In(c, _)
            | Self::Gte(c, _)
            | Self::Lte(c, _)
            | Self::ILike(c, _) => c,
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column.
    pub column: String,
    /// Descending.
    pub desc: bool,
}

/// A select over one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    table: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    order: Vec<OrderBy>,
    range: Option<(u64, u64)>,
}

impl SelectQuery {
    /// Selects every column of `table`.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    /// Restricts the selected columns.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Adds `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    /// Adds `column IN (values)`.
    #[must_use]
    pub fn in_<V: Into<FieldValue>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Adds `column >= value`.
    #[must_use]
    pub fn gte(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    /// Adds `column <= value`.
    #[must_use]
    pub fn lte(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Lte(column.to_string(), value.into()));
        self
    }

    /// Adds `column ILIKE pattern`.
    #[must_use]
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.filters
            .push(Filter::ILike(column.to_string(), pattern.to_string()));
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn order(mut self, column: &str, desc: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            desc,
        });
        self
    }

    /// Limits the result to `limit` rows starting at `offset`.
    #[must_use]
    pub fn range(mut self, offset: u64, limit: u64) -> Self {
        self.range = Some((offset, limit));
        self
    }

    /// The same query without its range.
    #[must_use]
    pub fn unbounded(&self) -> Self {
        Self {
            range: None,
            ..self.clone()
        }
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Selected columns; empty means all.
    #[must_use]
    pub fn selected_columns(&self) -> &[String] {
        &self.columns
    }

    /// Filters, all of which must hold.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Sort keys.
    #[must_use]
    pub fn ordering(&self) -> &[OrderBy] {
        &self.order
    }

    /// `(offset, limit)`, if set.
    #[must_use]
    pub const fn bounds(&self) -> Option<(u64, u64)> {
        self.range
    }

    /// Whether the query has a deterministic row order.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !self.order.is_empty()
    }

    /// Stable key identifying this query's result.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{:?}|{:?}|{:?}|{:?}",
            self.table, self.columns, self.filters, self.order, self.range
        )
    }
}

/// Errors of datastore calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// The call group did not finish in time.
    #[error("Datastore call timed out after {0:?}")]
    Timeout(Duration),

    /// Fewer rows were read than the store reported.
    #[error("Incomplete read of {table}: expected {expected} rows, fetched {fetched}")]
    Incomplete {
        /// Table.
        table: String,
        /// Reported row count.
        expected: u64,
        /// Rows actually fetched.
        fetched: u64,
    },

    /// A row did not match its record type.
    #[error("Cannot decode {table} row: {source}")]
    Decode {
        /// Table.
        table: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The query cannot be run.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Table access.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Rows matching `query`.
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;

    /// Number of rows matching `query`, ignoring its range.
    async fn count(&self, query: &SelectQuery) -> Result<u64, StoreError>;

    /// Inserts `records` and returns the stored rows.
    async fn insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Row>, StoreError>;

    /// Sets `patch` on every row matching `filters`; returns the rows touched.
    async fn update(&self, table: &str, patch: Record, filters: &[Filter])
    -> Result<u64, StoreError>;

    /// Deletes every row matching `filters`; returns the rows removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Inserts `records`, updating rows that collide on `conflict` columns.
    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        conflict: &[&str],
    ) -> Result<u64, StoreError>;
}

/// Decodes rows of `table` into records.
///
/// # Errors
///
/// Returns `StoreError::Decode` on the first row that does not fit `T`.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|source| StoreError::Decode {
                table: table.to_string(),
                source,
            })
        })
        .collect()
}

/// Rejects writes that would touch a whole table.
pub(crate) fn require_filters(table: &str, filters: &[Filter]) -> Result<(), StoreError> {
    if filters.is_empty() {
        return Err(StoreError::InvalidQuery(format!(
            "refusing unfiltered write on {table}"
        )));
    }
    Ok(())
}

/// Runs a group of datastore calls under `limit`.
///
/// # Errors
///
/// Returns the group's own error, or `StoreError::Timeout` converted into
/// `E` when the group does not finish in time.
pub async fn within<T, E, F>(limit: Duration, calls: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    tokio::time::timeout(limit, calls)
        .await
        .map_err(|_| E::from(StoreError::Timeout(limit)))?
}
