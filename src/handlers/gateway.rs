//! Generic request dispatch: (HTTP method, resource, body) to exactly one
//! CRUD operation.
//!
//! The three query-routed families all flow through [`dispatch`]; the
//! path-routed students endpoint reuses the same operations from
//! `handlers::students` with its own id resolution and overrides.

use crate::descriptor::{
    DeleteStyle, EnvelopeShape, GatewayFamily, KeySpec, ListStyle, ParentRef, ResourceDescriptor,
};
use crate::error::ApiError;
use crate::handlers::fields;
use crate::response;
use crate::sanitize::sanitize_text;
use crate::service::CrudGateway;
use crate::state::AppState;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Decode the request body as a JSON object. Malformed or non-object input
/// is treated as an empty payload; the 400 then comes from field
/// validation rather than a deserialization crash.
pub fn parse_body(bytes: &[u8]) -> Map<String, Value> {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

pub async fn dispatch(
    state: &AppState,
    family: &GatewayFamily,
    method: Method,
    params: &HashMap<String, String>,
    body_bytes: &[u8],
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    let Some(desc) = family.resource(params.get("resource").map(String::as_str)) else {
        return response::error(
            family.shape,
            StatusCode::BAD_REQUEST,
            family.invalid_resource_message,
        );
    };
    let body = parse_body(body_bytes);

    let result = if method == Method::GET {
        if let Some(parent) = &desc.parent {
            list_children(state, desc, parent, params).await
        } else if let Some(raw) = id_param_value(desc, params) {
            get_one(state, desc, raw).await
        } else {
            list(state, desc, params).await
        }
    } else if method == Method::POST {
        create(state, desc, &body).await
    } else if method == Method::PUT && desc.updatable {
        match update_key(desc, &body, params) {
            Ok(key) => apply_update(state, desc, key, &body).await,
            Err(e) => Err(e),
        }
    } else if method == Method::DELETE {
        delete_by_param(state, desc, params).await
    } else {
        Err(ApiError::MethodNotAllowed)
    };

    finish(desc.shape, result)
}

fn finish(shape: EnvelopeShape, result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|e| response::render_error(shape, e))
}

/// List with optional search and allow-listed sort.
pub async fn list(
    state: &AppState,
    desc: &ResourceDescriptor,
    params: &HashMap<String, String>,
) -> Result<Response, ApiError> {
    let search = params
        .get("search")
        .map(|s| sanitize_text(s))
        .filter(|s| !s.is_empty());
    let (column, direction) = desc
        .sort
        .resolve(params.get("sort").map(String::as_str), params.get("order").map(String::as_str));
    let rows = CrudGateway::list(&state.pool, desc, search.as_deref(), column, direction).await?;
    Ok(match desc.list_style {
        ListStyle::Plain => response::plain(Value::Array(rows)),
        ListStyle::Data => response::ok(
            desc.shape,
            StatusCode::OK,
            desc.messages.fetched_many,
            Some(Value::Array(rows)),
        ),
        ListStyle::DataWithCount => response::ok_with_count(desc.shape, desc.messages.fetched_many, rows),
    })
}

/// Exact lookup by the resource key taken from the query string.
pub async fn get_one(
    state: &AppState,
    desc: &ResourceDescriptor,
    raw_key: &str,
) -> Result<Response, ApiError> {
    let key = key_from_str(desc, raw_key);
    let row = CrudGateway::get_by_key(&state.pool, desc, &key)
        .await?
        .ok_or_else(|| ApiError::NotFound(desc.messages.not_found.to_string()))?;
    Ok(response::ok(desc.shape, StatusCode::OK, desc.messages.fetched_one, Some(row)))
}

/// Child listing for comment/reply resources; the parent key parameter is
/// required, but its referent is not checked. An absent parent produces an
/// empty list.
pub async fn list_children(
    state: &AppState,
    desc: &ResourceDescriptor,
    parent: &ParentRef,
    params: &HashMap<String, String>,
) -> Result<Response, ApiError> {
    let raw = params
        .get(parent.fk_field)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation(parent.list_param_message.to_string()))?;
    let key = if parent.fk_is_int {
        Value::Number(raw.trim().parse::<i64>().unwrap_or(0).into())
    } else {
        Value::String(raw.to_string())
    };
    let rows = CrudGateway::list_children(&state.pool, desc, parent.fk_field, &key).await?;
    Ok(match desc.list_style {
        ListStyle::DataWithCount => response::ok_with_count(desc.shape, desc.messages.fetched_many, rows),
        _ => response::ok(
            desc.shape,
            StatusCode::OK,
            desc.messages.fetched_many,
            Some(Value::Array(rows)),
        ),
    })
}

/// Create: required fields, parent existence, uniqueness, insert, 201 with
/// the created record.
pub async fn create(
    state: &AppState,
    desc: &ResourceDescriptor,
    body: &Map<String, Value>,
) -> Result<Response, ApiError> {
    let values = fields::collect_create(desc, body)?;
    if let Some(parent) = &desc.parent {
        let fk = fields::collected(&values, parent.fk_field)
            .cloned()
            .unwrap_or(Value::Null);
        let found =
            CrudGateway::exists_any(&state.pool, parent.table, &[parent.key_column], &[fk]).await?;
        if !found {
            return Err(ApiError::NotFound(parent.missing_message.to_string()));
        }
    }
    if !desc.unique.is_empty() {
        let probe: Vec<Value> = desc
            .unique
            .iter()
            .map(|col| fields::collected(&values, col).cloned().unwrap_or(Value::Null))
            .collect();
        if CrudGateway::exists_any(&state.pool, desc.table, desc.unique, &probe).await? {
            return Err(ApiError::Conflict(desc.messages.conflict.to_string()));
        }
    }
    let row = CrudGateway::insert(&state.pool, desc, &values).await?;
    Ok(response::ok(desc.shape, StatusCode::CREATED, desc.messages.created, Some(row)))
}

/// Resolve the update target key: request body first, then the query
/// string. Students extend this chain with a student_id lookup.
pub fn update_key(
    desc: &ResourceDescriptor,
    body: &Map<String, Value>,
    params: &HashMap<String, String>,
) -> Result<Value, ApiError> {
    let field = match desc.key {
        KeySpec::Surrogate => "id",
        KeySpec::External(col) => col,
    };
    let from_body = match desc.key {
        KeySpec::Surrogate => body.get(field).and_then(int_from_value).map(|n| json!(n)),
        KeySpec::External(_) => body
            .get(field)
            .and_then(Value::as_str)
            .map(|s| sanitize_text(s))
            .filter(|s| !s.is_empty())
            .map(Value::String),
    };
    let from_query = || match desc.key {
        KeySpec::Surrogate => params
            .get(desc.id_param)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| json!(n)),
        KeySpec::External(_) => params
            .get(desc.id_param)
            .map(|s| sanitize_text(s))
            .filter(|s| !s.is_empty())
            .map(Value::String),
    };
    from_body
        .or_else(from_query)
        .ok_or_else(|| ApiError::Validation(desc.messages.update_id_required.to_string()))
}

/// Shared partial-update path: existence check, field collection, execute,
/// then the per-resource success/info/refetch contract.
pub async fn apply_update(
    state: &AppState,
    desc: &ResourceDescriptor,
    key: Value,
    body: &Map<String, Value>,
) -> Result<Response, ApiError> {
    let existing = CrudGateway::get_by_key(&state.pool, desc, &key).await?;
    if existing.is_none() {
        return Err(ApiError::NotFound(desc.messages.not_found.to_string()));
    }
    let sets = fields::collect_update(desc, body)?;
    if sets.is_empty() {
        return Err(ApiError::Validation(desc.messages.nothing_to_update.to_string()));
    }
    let rows = CrudGateway::update_by_key(&state.pool, desc, &key, &sets).await?;
    if desc.refetch_on_update {
        let row = CrudGateway::get_by_key(&state.pool, desc, &key)
            .await?
            .ok_or_else(|| ApiError::NotFound(desc.messages.not_found.to_string()))?;
        return Ok(response::ok(
            desc.shape,
            StatusCode::OK,
            Some(desc.messages.updated),
            Some(row),
        ));
    }
    if rows == 0 {
        // Matched but unchanged: success with an informational message,
        // never reported as failure.
        return Ok(response::info(desc.shape, desc.messages.unchanged));
    }
    Ok(response::ok(desc.shape, StatusCode::OK, Some(desc.messages.updated), None))
}

/// Key parameter for get/delete routing. An empty value counts as absent,
/// so `?week_id=` lists instead of attempting a doomed lookup.
pub fn id_param_value<'a>(
    desc: &ResourceDescriptor,
    params: &'a HashMap<String, String>,
) -> Option<&'a str> {
    params
        .get(desc.id_param)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
}

async fn delete_by_param(
    state: &AppState,
    desc: &ResourceDescriptor,
    params: &HashMap<String, String>,
) -> Result<Response, ApiError> {
    let raw = id_param_value(desc, params)
        .ok_or_else(|| ApiError::Validation(desc.messages.delete_id_required.to_string()))?;
    let key = key_from_str(desc, raw);
    delete_with_key(state, desc, key).await
}

/// Shared delete path: optional existence check, cascade, per-resource
/// status code.
pub async fn delete_with_key(
    state: &AppState,
    desc: &ResourceDescriptor,
    key: Value,
) -> Result<Response, ApiError> {
    if !desc.unchecked_delete {
        let found = CrudGateway::exists_any(&state.pool, desc.table, &[desc.key.column()], &[key.clone()])
            .await?;
        if !found {
            return Err(ApiError::NotFound(desc.messages.not_found.to_string()));
        }
    }
    let rows = CrudGateway::delete_by_key(&state.pool, desc, &key).await?;
    if rows == 0 && !desc.unchecked_delete {
        // Existence check raced with another delete.
        return Err(ApiError::Unexpected("delete affected no rows".to_string()));
    }
    Ok(match desc.delete_style {
        DeleteStyle::NoContent => response::no_content(),
        DeleteStyle::JsonMessage => {
            let data = match desc.shape {
                EnvelopeShape::SuccessFlag => Some(json!({ (desc.key.column()): key })),
                EnvelopeShape::StatusTag => None,
            };
            response::ok(desc.shape, StatusCode::OK, Some(desc.messages.deleted), data)
        }
    })
}

/// Parse a query-string key for the descriptor. Unparseable surrogate ids
/// become 0 and fall through to the not-found path.
pub fn key_from_str(desc: &ResourceDescriptor, raw: &str) -> Value {
    match desc.key {
        KeySpec::Surrogate => json!(raw.trim().parse::<i64>().unwrap_or(0)),
        KeySpec::External(_) => Value::String(raw.to_string()),
    }
}

/// Positive integer id from a JSON body value; numeric strings parse,
/// anything else is rejected via None.
pub fn int_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().filter(|n| *n > 0),
        Value::String(s) => s.trim().parse::<i64>().ok().filter(|n| *n > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Registry;

    #[test]
    fn malformed_body_becomes_empty_payload() {
        assert!(parse_body(b"{not json").is_empty());
        assert!(parse_body(b"").is_empty());
        assert!(parse_body(b"[1,2]").is_empty());
        let map = parse_body(br#"{"id": 3}"#);
        assert_eq!(map.get("id"), Some(&json!(3)));
    }

    #[test]
    fn surrogate_keys_parse_or_zero() {
        let reg = Registry::builtin();
        let assignments = reg.assignments.resource(Some("assignments")).unwrap();
        assert_eq!(key_from_str(assignments, "7"), json!(7));
        assert_eq!(key_from_str(assignments, "abc"), json!(0));
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        assert_eq!(key_from_str(weeks, "week_1"), json!("week_1"));
    }

    #[test]
    fn update_key_resolution_per_key_spec() {
        let reg = Registry::builtin();
        let no_params = HashMap::new();
        let topics = reg.discussion.resource(Some("topics")).unwrap();
        let body = parse_body(br#"{"topic_id": "t1", "subject": "s"}"#);
        assert_eq!(update_key(topics, &body, &no_params).unwrap(), json!("t1"));

        let body = parse_body(br#"{"subject": "s"}"#);
        let err = update_key(topics, &body, &no_params).unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m == "topic_id is required"));

        let assignments = reg.assignments.resource(Some("assignments")).unwrap();
        let body = parse_body(br#"{"id": "12"}"#);
        assert_eq!(update_key(assignments, &body, &no_params).unwrap(), json!(12));
        let body = parse_body(br#"{"id": 0}"#);
        assert!(update_key(assignments, &body, &no_params).is_err());
    }

    #[test]
    fn update_key_falls_back_to_query() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let mut params = HashMap::new();
        params.insert("week_id".to_string(), "week_3".to_string());
        let body = parse_body(b"{}");
        assert_eq!(update_key(weeks, &body, &params).unwrap(), json!("week_3"));

        // body wins over query when both are present
        let body = parse_body(br#"{"week_id": "week_9"}"#);
        assert_eq!(update_key(weeks, &body, &params).unwrap(), json!("week_9"));
    }

    #[test]
    fn empty_id_parameter_routes_to_list() {
        let reg = Registry::builtin();
        let weeks = reg.weekly.resource(Some("weeks")).unwrap();
        let mut params = HashMap::new();
        params.insert("week_id".to_string(), String::new());
        assert_eq!(id_param_value(weeks, &params), None);
        params.insert("week_id".to_string(), "week_1".to_string());
        assert_eq!(id_param_value(weeks, &params), Some("week_1"));

        let students = reg.students.resource(None).unwrap();
        let mut params = HashMap::new();
        params.insert("id".to_string(), String::new());
        assert_eq!(id_param_value(students, &params), None);
    }

    #[test]
    fn int_from_value_matches_intval_semantics() {
        assert_eq!(int_from_value(&json!(5)), Some(5));
        assert_eq!(int_from_value(&json!("5")), Some(5));
        assert_eq!(int_from_value(&json!("abc")), None);
        assert_eq!(int_from_value(&json!(0)), None);
        assert_eq!(int_from_value(&json!(-1)), None);
        assert_eq!(int_from_value(&json!(null)), None);
    }
}
