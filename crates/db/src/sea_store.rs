//! Postgres datastore on `SeaORM`.
//!
//! Statements are built with sea-query against dynamic table and column
//! names; rows come back as JSON objects.

use async_trait::async_trait;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{
    Alias, Asterisk, Condition, Expr, Keyword, OnConflict, Order, Query, SimpleExpr, Value,
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, JsonValue, StatementBuilder,
};

use crate::store::{
    Datastore, FieldValue, Filter, Record, Row, SelectQuery, StoreError, require_filters,
};

/// Datastore backed by a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct SeaStore {
    db: DatabaseConnection,
}

impl SeaStore {
    /// Creates a new store over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn query_rows<S: StatementBuilder>(
        &self,
        statement: &S,
    ) -> Result<Vec<Row>, StoreError> {
        let backend = self.db.get_database_backend();
        let values = JsonValue::find_by_statement(backend.build(statement))
            .all(&self.db)
            .await?;
        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                JsonValue::Object(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    async fn execute<S: StatementBuilder>(
        &self,
        statement: &S,
    ) -> Result<u64, StoreError> {
        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(statement)).await?;
        Ok(result.rows_affected())
    }
}

fn value_expr(value: &FieldValue) -> SimpleExpr {
    match value {
        FieldValue::Null => SimpleExpr::Keyword(Keyword::Null),
        FieldValue::Bool(b) => SimpleExpr::Value(Value::from(*b)),
        FieldValue::Int(i) => SimpleExpr::Value(Value::from(*i)),
        FieldValue::Decimal(d) => SimpleExpr::Value(Value::from(*d)),
        FieldValue::Text(t) => SimpleExpr::Value(Value::from(t.clone())),
        FieldValue::Date(d) => SimpleExpr::Value(Value::from(*d)),
    }
}

fn condition(filters: &[Filter]) -> Condition {
    filters.iter().fold(Condition::all(), |cond, filter| {
        let column = Expr::col(Alias::new(filter.column()));
        let expr = match filter {
            Filter::Eq(_, FieldValue::Null) => column.is_null(),
            Filter::Eq(_, value) => column.eq(value_expr(value)),
            Filter::In(_, values) => column.is_in(values.iter().map(value_expr)),
            Filter::Gte(_, value) => column.gte(value_expr(value)),
            Filter::Lte(_, value) => column.lte(value_expr(value)),
            Filter::ILike(_, pattern) => column.ilike(pattern.as_str()),
        };
        cond.add(expr)
    })
}

/// Column names of a batch; every record must have the same columns.
fn batch_columns(table: &str, records: &[Record]) -> Result<Vec<String>, StoreError> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    if records
        .iter()
        .any(|r| r.len() != columns.len() || !columns.iter().all(|c| r.contains_key(c)))
    {
        return Err(StoreError::InvalidQuery(format!(
            "records for {table} do not share the same columns"
        )));
    }
    Ok(columns)
}

fn insert_statement(
    table: &str,
    records: &[Record],
) -> Result<sea_orm::sea_query::InsertStatement, StoreError> {
    let columns = batch_columns(table, records)?;
    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(table))
        .columns(columns.iter().map(Alias::new));
    for record in records {
        insert
            .values(record.values().map(value_expr))
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))?;
    }
    Ok(insert)
}

#[async_trait]
impl Datastore for SeaStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let mut select = Query::select();
        select
            .from(Alias::new(query.table_name()))
            .cond_where(condition(query.filters()));

        if query.selected_columns().is_empty() {
            select.column(Asterisk);
        } else {
            select.columns(query.selected_columns().iter().map(Alias::new));
        }
        for order in query.ordering() {
            let direction = if order.desc { Order::Desc } else { Order::Asc };
            select.order_by(Alias::new(&order.column), direction);
        }
        if let Some((offset, limit)) = query.bounds() {
            select.offset(offset).limit(limit);
        }

        self.query_rows(&select).await
    }

    async fn count(&self, query: &SelectQuery) -> Result<u64, StoreError> {
        let mut select = Query::select();
        select
            .expr_as(Expr::cust("COUNT(*)"), Alias::new("total"))
            .from(Alias::new(query.table_name()))
            .cond_where(condition(query.filters()));

        let rows = self.query_rows(&select).await?;
        rows.first()
            .and_then(|row| row.get("total"))
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "count of {} returned no total",
                    query.table_name()
                ))
            })
    }

    async fn insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Row>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let mut insert = insert_statement(table, &records)?;
        insert.returning_all();
        self.query_rows(&insert).await
    }

    async fn update(
        &self,
        table: &str,
        patch: Record,
        filters: &[Filter],
    ) -> Result<u64, StoreError> {
        require_filters(table, filters)?;
        if patch.is_empty() {
            return Ok(0);
        }
        let mut update = Query::update();
        update
            .table(Alias::new(table))
            .values(
                patch
                    .iter()
                    .map(|(column, value)| (Alias::new(column), value_expr(value))),
            )
            .cond_where(condition(filters));
        self.execute(&update).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        require_filters(table, filters)?;
        let mut delete = Query::delete();
        delete
            .from_table(Alias::new(table))
            .cond_where(condition(filters));
        self.execute(&delete).await
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        conflict: &[&str],
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let columns = batch_columns(table, &records)?;
        let updates: Vec<Alias> = columns
            .iter()
            .filter(|c| !conflict.contains(&c.as_str()))
            .map(Alias::new)
            .collect();

        let mut on_conflict = OnConflict::columns(conflict.iter().map(|c| Alias::new(*c)));
        if updates.is_empty() {
            on_conflict.do_nothing();
        } else {
            on_conflict.update_columns(updates);
        }

        let mut insert = insert_statement(table, &records)?;
        insert.on_conflict(on_conflict);
        self.execute(&insert).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::sea_query::PostgresQueryBuilder;

    use crate::store::record;

    #[test]
    fn test_condition_renders_all_filters() {
        let mut select = Query::select();
        select
            .column(Asterisk)
            .from(Alias::new("orden_de_pago"))
            .cond_where(condition(&[
                Filter::eq("orden_numero", 7_i64),
                Filter::In("proyecto".into(), vec![FieldValue::Int(1), FieldValue::Int(2)]),
                Filter::ILike("factura".into(), "F-%".into()),
                Filter::Eq("ingreso_id".into(), FieldValue::Null),
            ]));
        let sql = select.to_string(PostgresQueryBuilder);

        assert!(sql.contains(r#""orden_numero" = 7"#), "{sql}");
        assert!(sql.contains(r#""proyecto" IN (1, 2)"#), "{sql}");
        assert!(sql.contains(r#""factura" ILIKE 'F-%'"#), "{sql}");
        assert!(sql.contains(r#""ingreso_id" IS NULL"#), "{sql}");
    }

    #[test]
    fn test_insert_writes_typed_values() {
        let rows = vec![record([
            ("monto_abono", FieldValue::Decimal(dec!(250.50))),
            ("observacion", FieldValue::Null),
            ("orden_numero", FieldValue::Int(9)),
        ])];
        let sql = insert_statement("abonos_op", &rows)
            .unwrap()
            .to_string(PostgresQueryBuilder);

        assert!(sql.contains("250.50"), "{sql}");
        assert!(sql.contains("NULL"), "{sql}");
    }

    #[test]
    fn test_mixed_batches_are_rejected() {
        let rows = vec![
            record([("a", FieldValue::Int(1))]),
            record([("b", FieldValue::Int(1))]),
        ];
        assert!(matches!(
            insert_statement("t", &rows),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a running Postgres (DATABASE_URL)"]
    async fn test_round_trip_against_postgres() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let store = SeaStore::new(crate::connect(&url).await.expect("connect"));

        let rows = store
            .select(&SelectQuery::table("item").order("id", false).range(0, 5))
            .await
            .expect("select");
        let total = store.count(&SelectQuery::table("item")).await.expect("count");
        assert!(u64::try_from(rows.len()).unwrap() <= total);
    }
}
