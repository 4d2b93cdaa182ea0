//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resource
//! descriptor.
//!
//! Every value is bound through a numbered placeholder. The only
//! interpolated tokens are identifiers taken from descriptors and the
//! sort column/direction, which callers must resolve through the
//! allow-list first.

use crate::descriptor::ResourceDescriptor;
use serde_json::Value;

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf { sql: String::new(), params: Vec::new() }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// One column assignment for INSERT/UPDATE, with an optional SQL cast for
/// types that cannot bind from their text form (dates, jsonb).
#[derive(Debug)]
pub struct ColumnValue {
    pub column: String,
    pub value: Value,
    pub cast: Option<&'static str>,
}

impl ColumnValue {
    pub fn new(column: impl Into<String>, value: Value, cast: Option<&'static str>) -> Self {
        ColumnValue { column: column.into(), value, cast }
    }
}

/// Quote identifier for PostgreSQL (safe: only from descriptors).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn column_list(columns: &[&str]) -> String {
    columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
}

fn placeholder(n: usize, cast: Option<&str>) -> String {
    match cast {
        Some(t) => format!("${}::{}", n, t),
        None => format!("${}", n),
    }
}

/// List query: optional case-insensitive substring search OR-combined over
/// the descriptor's search columns (single bound parameter, reused), ordered
/// by a pre-validated sort column and direction.
pub fn select_list(
    desc: &ResourceDescriptor,
    search: Option<&str>,
    sort_column: &str,
    sort_direction: &str,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = column_list(desc.columns);
    let mut sql = format!("SELECT {} FROM {}", cols, quoted(desc.table));
    if let Some(term) = search {
        let n = q.push_param(Value::String(format!("%{}%", term)));
        let clauses: Vec<String> = desc
            .search_columns
            .iter()
            .map(|c| format!("{} ILIKE ${}", quoted(c), n))
            .collect();
        sql.push_str(&format!(" WHERE ({})", clauses.join(" OR ")));
    }
    sql.push_str(&format!(" ORDER BY {} {}", quoted(sort_column), sort_direction));
    q.sql = sql;
    q
}

/// Exact lookup on the resource key. Caller binds the key as sole param.
pub fn select_by_key(desc: &ResourceDescriptor) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1 LIMIT 1",
        column_list(desc.columns),
        quoted(desc.table),
        quoted(desc.key.column())
    )
}

/// Child rows for one parent, oldest first. Caller binds the parent key.
pub fn select_children(desc: &ResourceDescriptor, fk_column: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1 ORDER BY {} ASC",
        column_list(desc.columns),
        quoted(desc.table),
        quoted(fk_column),
        quoted("created_at")
    )
}

/// Existence probe over one or more columns, OR-combined (duplicate checks,
/// parent lookups). One bound value per column, in order.
pub fn exists_where_any(table: &str, columns: &[&str]) -> String {
    let clauses: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quoted(c), i + 1))
        .collect();
    format!("SELECT 1 FROM {} WHERE {} LIMIT 1", quoted(table), clauses.join(" OR "))
}

/// INSERT with RETURNING of the descriptor's visible columns. Server-side
/// timestamps come from column defaults, never from the client.
pub fn insert(desc: &ResourceDescriptor, values: &[ColumnValue]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for cv in values {
        let n = q.push_param(cv.value.clone());
        cols.push(quoted(&cv.column));
        placeholders.push(placeholder(n, cv.cast));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(desc.table),
        cols.join(", "),
        placeholders.join(", "),
        column_list(desc.columns)
    );
    q
}

/// Partial UPDATE by key: SET only the provided columns, key bound last.
pub fn update_by_key(desc: &ResourceDescriptor, sets: &[ColumnValue], key: Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut set_parts = Vec::with_capacity(sets.len() + 1);
    for cv in sets {
        let n = q.push_param(cv.value.clone());
        set_parts.push(format!("{} = {}", quoted(&cv.column), placeholder(n, cv.cast)));
    }
    if desc.bump_updated_at {
        set_parts.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let key_n = q.push_param(key);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        quoted(desc.table),
        set_parts.join(", "),
        quoted(desc.key.column()),
        key_n
    );
    q
}

/// DELETE by an arbitrary column (resource key, or a cascade foreign key).
/// Caller binds the key as sole param.
pub fn delete_where(table: &str, column: &str) -> String {
    format!("DELETE FROM {} WHERE {} = $1", quoted(table), quoted(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Registry;
    use serde_json::json;

    #[test]
    fn list_without_search_has_no_where() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let q = select_list(weeks, None, "start_date", "ASC");
        assert!(q.sql.starts_with("SELECT \"week_id\", \"title\""));
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.ends_with("ORDER BY \"start_date\" ASC"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn list_search_reuses_one_parameter() {
        let reg = Registry::builtin();
        let students = reg.students.resource(None).unwrap();
        let q = select_list(students, Some("ann"), "name", "DESC");
        assert!(q.sql.contains("\"name\" ILIKE $1 OR \"student_id\" ILIKE $1 OR \"email\" ILIKE $1"));
        assert_eq!(q.params, vec![json!("%ann%")]);
        // password is never part of the select list
        assert!(!q.sql.contains("password"));
    }

    #[test]
    fn insert_returns_visible_columns_with_casts() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let values = vec![
            ColumnValue::new("week_id", json!("week_1"), None),
            ColumnValue::new("title", json!("Intro"), None),
            ColumnValue::new("start_date", json!("2024-01-08"), Some("date")),
            ColumnValue::new("description", json!("d"), None),
            ColumnValue::new("links", json!(["a", "b"]), Some("jsonb")),
        ];
        let q = insert(weeks, &values);
        assert!(q.sql.contains("VALUES ($1, $2, $3::date, $4, $5::jsonb)"));
        assert!(q.sql.contains("RETURNING \"week_id\""));
        assert_eq!(q.params.len(), 5);
    }

    #[test]
    fn update_binds_key_last_and_bumps_updated_at() {
        let reg = Registry::builtin();
        let assignments = reg.assignments.resource(Some("assignments")).unwrap();
        let sets = vec![ColumnValue::new("title", json!("New"), None)];
        let q = update_by_key(assignments, &sets, json!(7));
        assert_eq!(
            q.sql,
            "UPDATE \"assignments\" SET \"title\" = $1, \"updated_at\" = NOW() WHERE \"id\" = $2"
        );
        assert_eq!(q.params, vec![json!("New"), json!(7)]);
    }

    #[test]
    fn exists_probe_or_combines() {
        let sql = exists_where_any("students", &["student_id", "email"]);
        assert_eq!(
            sql,
            "SELECT 1 FROM \"students\" WHERE \"student_id\" = $1 OR \"email\" = $2 LIMIT 1"
        );
    }

    #[test]
    fn delete_targets_single_column() {
        assert_eq!(
            delete_where("replies", "topic_id"),
            "DELETE FROM \"replies\" WHERE \"topic_id\" = $1"
        );
    }
}
