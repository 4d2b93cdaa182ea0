//! Generic CRUD execution against PostgreSQL.
//!
//! Each operation is one or more sequential round-trips on the shared pool;
//! nothing is cached between requests. Rows come back as JSON objects with
//! the descriptor's nested JSON columns coalesced to arrays.

use crate::descriptor::ResourceDescriptor;
use crate::error::ApiError;
use crate::sql::{builder, BindValue, ColumnValue, QueryBuf};
use serde_json::Value;
use sqlx::PgPool;

pub struct CrudGateway;

impl CrudGateway {
    /// List rows with optional substring search and validated sort tokens.
    pub async fn list(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        search: Option<&str>,
        sort_column: &str,
        sort_direction: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let q = builder::select_list(desc, search, sort_column, sort_direction);
        let mut rows = Self::query_many(pool, &q).await?;
        for row in &mut rows {
            normalize_json_columns(row, desc.json_columns);
        }
        Ok(rows)
    }

    /// Fetch one row by the resource key. Returns None when absent.
    pub async fn get_by_key(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &Value,
    ) -> Result<Option<Value>, ApiError> {
        let sql = builder::select_by_key(desc);
        tracing::debug!(sql = %sql, key = ?key, "query");
        let row = bind_all(sqlx::query(&sql), std::slice::from_ref(key))
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| {
            let mut v = row_to_json(&r);
            normalize_json_columns(&mut v, desc.json_columns);
            v
        }))
    }

    /// Child rows for one parent key, oldest first.
    pub async fn list_children(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        fk_column: &str,
        parent_key: &Value,
    ) -> Result<Vec<Value>, ApiError> {
        let sql = builder::select_children(desc, fk_column);
        tracing::debug!(sql = %sql, parent = ?parent_key, "query");
        let rows = bind_all(sqlx::query(&sql), std::slice::from_ref(parent_key))
            .fetch_all(pool)
            .await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// True when any row matches one of the column/value pairs (OR).
    pub async fn exists_any(
        pool: &PgPool,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> Result<bool, ApiError> {
        let sql = builder::exists_where_any(table, columns);
        tracing::debug!(sql = %sql, values = ?values, "query");
        let row = bind_all(sqlx::query(&sql), values).fetch_optional(pool).await?;
        Ok(row.is_some())
    }

    /// Insert one row and return it as the descriptor's visible columns.
    pub async fn insert(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        values: &[ColumnValue],
    ) -> Result<Value, ApiError> {
        let q = builder::insert(desc, values);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(pool)
            .await?
            .ok_or(ApiError::Db(sqlx::Error::RowNotFound))?;
        let mut v = row_to_json(&row);
        normalize_json_columns(&mut v, desc.json_columns);
        Ok(v)
    }

    /// Partial update by key. Returns rows affected so callers can report
    /// the no-op case distinctly from failure.
    pub async fn update_by_key(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &Value,
        sets: &[ColumnValue],
    ) -> Result<u64, ApiError> {
        let q = builder::update_by_key(desc, sets, key.clone());
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(sqlx::query(&q.sql), &q.params).execute(pool).await?;
        Ok(done.rows_affected())
    }

    /// Delete one row by the resource key. When the descriptor declares a
    /// cascade, dependent rows go first; both statements run in one
    /// transaction so a child-delete failure never leaves an orphaned
    /// parent delete behind.
    pub async fn delete_by_key(
        pool: &PgPool,
        desc: &ResourceDescriptor,
        key: &Value,
    ) -> Result<u64, ApiError> {
        match desc.cascade {
            Some(child) => {
                let mut tx = pool.begin().await?;
                let child_sql = builder::delete_where(child.table, child.fk_column);
                tracing::debug!(sql = %child_sql, key = ?key, "query (tx)");
                bind_all(sqlx::query(&child_sql), std::slice::from_ref(key))
                    .execute(&mut *tx)
                    .await?;
                let sql = builder::delete_where(desc.table, desc.key.column());
                tracing::debug!(sql = %sql, key = ?key, "query (tx)");
                let done = bind_all(sqlx::query(&sql), std::slice::from_ref(key))
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(done.rows_affected())
            }
            None => {
                let sql = builder::delete_where(desc.table, desc.key.column());
                tracing::debug!(sql = %sql, key = ?key, "query");
                let done = bind_all(sqlx::query(&sql), std::slice::from_ref(key))
                    .execute(pool)
                    .await?;
                Ok(done.rows_affected())
            }
        }
    }

    /// Single-column scalar fetch (student password hash lookup).
    pub async fn fetch_text_column(
        pool: &PgPool,
        table: &str,
        column: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<Option<String>, ApiError> {
        let sql = format!(
            "SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = $1 LIMIT 1",
            column, table, key_column
        );
        tracing::debug!(sql = %sql, key = ?key, "query");
        let row = sqlx::query_scalar::<_, String>(&sql)
            .bind(BindValue::from_json(key))
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Single-column integer fetch (student id lookup by student_id).
    pub async fn fetch_int_column(
        pool: &PgPool,
        table: &str,
        column: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<Option<i64>, ApiError> {
        let sql = format!(
            "SELECT \"{}\"::bigint FROM \"{}\" WHERE \"{}\" = $1 LIMIT 1",
            column, table, key_column
        );
        tracing::debug!(sql = %sql, key = ?key, "query");
        let row = sqlx::query_scalar::<_, i64>(&sql)
            .bind(BindValue::from_json(key))
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Direct single-column update (password rehash).
    pub async fn set_text_column(
        pool: &PgPool,
        table: &str,
        column: &str,
        value: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<u64, ApiError> {
        let sql = format!(
            "UPDATE \"{}\" SET \"{}\" = $1 WHERE \"{}\" = $2",
            table, column, key_column
        );
        tracing::debug!(sql = %sql, key = ?key, "query");
        let done = sqlx::query(&sql)
            .bind(value)
            .bind(BindValue::from_json(key))
            .execute(pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for p in params {
        query = query.bind(BindValue::from_json(p));
    }
    query
}

/// Nested JSON fields must always come back as arrays, never null or a
/// serialized string.
fn normalize_json_columns(row: &mut Value, json_columns: &[&str]) {
    let Some(obj) = row.as_object_mut() else { return };
    for col in json_columns {
        let entry = obj.entry(col.to_string()).or_insert(Value::Null);
        match entry {
            Value::Array(_) => {}
            Value::String(s) => {
                *entry = serde_json::from_str(s).unwrap_or_else(|_| Value::Array(Vec::new()));
            }
            _ => *entry = Value::Array(Vec::new()),
        }
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_columns_coalesce_to_arrays() {
        let mut row = json!({"week_id": "week_1", "links": null});
        normalize_json_columns(&mut row, &["links"]);
        assert_eq!(row["links"], json!([]));

        let mut row = json!({"week_id": "week_1"});
        normalize_json_columns(&mut row, &["links"]);
        assert_eq!(row["links"], json!([]));

        let mut row = json!({"week_id": "week_1", "links": ["a", "b"]});
        normalize_json_columns(&mut row, &["links"]);
        assert_eq!(row["links"], json!(["a", "b"]));
    }

    #[test]
    fn serialized_strings_are_decoded() {
        let mut row = json!({"files": "[\"a.pdf\"]"});
        normalize_json_columns(&mut row, &["files"]);
        assert_eq!(row["files"], json!(["a.pdf"]));

        let mut row = json!({"files": "not json"});
        normalize_json_columns(&mut row, &["files"]);
        assert_eq!(row["files"], json!([]));
    }
}
