//! Path-routed students endpoint.
//!
//! Students share the generic CRUD operations but carry behavior the
//! query-routed families do not: a change-password action, a three-way
//! update id precedence, and an unconditional 204 delete.

use crate::descriptor::GatewayFamily;
use crate::error::ApiError;
use crate::handlers::gateway;
use crate::response;
use crate::service::{password, CrudGateway};
use crate::state::AppState;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

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
    let Some(desc) = family.resource(None) else {
        return response::render_error(
            family.shape,
            ApiError::Unexpected("students descriptor missing".to_string()),
        );
    };
    let body = gateway::parse_body(body_bytes);

    let result = if method == Method::GET {
        if let Some(raw) = gateway::id_param_value(desc, params) {
            gateway::get_one(state, desc, raw).await
        } else {
            gateway::list(state, desc, params).await
        }
    } else if method == Method::POST {
        if params.get("action").map(String::as_str) == Some("change_password") {
            change_password(state, desc.table, &body).await
        } else {
            gateway::create(state, desc, &body).await
        }
    } else if method == Method::PUT {
        match resolve_update_id(state, desc.table, params, &body).await {
            Ok(key) => gateway::apply_update(state, desc, key, &body).await,
            Err(e) => Err(e),
        }
    } else if method == Method::DELETE {
        match delete_id(params, &body) {
            Ok(key) => gateway::delete_with_key(state, desc, key).await,
            Err(e) => Err(e),
        }
    } else {
        Err(ApiError::MethodNotAllowed)
    };

    match result {
        Ok(resp) => resp,
        Err(e) => response::render_error(desc.shape, e),
    }
}

/// Update target precedence: body `id`, then query `id`, then a lookup by
/// body `student_id`. First present source wins.
async fn resolve_update_id(
    state: &AppState,
    table: &str,
    params: &HashMap<String, String>,
    body: &Map<String, Value>,
) -> Result<Value, ApiError> {
    if let Some(id) = body.get("id").and_then(gateway::int_from_value) {
        return Ok(json!(id));
    }
    if let Some(id) = params.get("id").and_then(|s| s.trim().parse::<i64>().ok()) {
        if id > 0 {
            return Ok(json!(id));
        }
    }
    if let Some(sid) = body.get("student_id").and_then(Value::as_str) {
        let sid = sid.trim();
        if !sid.is_empty() {
            let found = CrudGateway::fetch_int_column(
                &state.pool,
                table,
                "id",
                "student_id",
                &Value::String(sid.to_string()),
            )
            .await?;
            if let Some(id) = found {
                return Ok(json!(id));
            }
            return Err(ApiError::NotFound("Student not found".to_string()));
        }
    }
    Err(ApiError::Validation("id required".to_string()))
}

/// Delete target: query `id` first, then body `id`.
fn delete_id(params: &HashMap<String, String>, body: &Map<String, Value>) -> Result<Value, ApiError> {
    let from_query = params
        .get("id")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0);
    let key = from_query.or_else(|| body.get("id").and_then(gateway::int_from_value));
    key.map(|n| json!(n))
        .ok_or_else(|| ApiError::Validation("id required".to_string()))
}

/// Verify the current password and store a new Argon2 hash.
async fn change_password(
    state: &AppState,
    table: &str,
    body: &Map<String, Value>,
) -> Result<Response, ApiError> {
    let id = body
        .get("id")
        .and_then(gateway::int_from_value)
        .ok_or_else(|| ApiError::Validation("id required".to_string()))?;
    let current = body
        .get("current_password")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("current_password and new_password are required".to_string()))?;
    let new = body
        .get("new_password")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("current_password and new_password are required".to_string()))?;
    if new.chars().count() < password::MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "New password must be at least 8 characters".to_string(),
        ));
    }

    let key = json!(id);
    let stored = CrudGateway::fetch_text_column(&state.pool, table, "password", "id", &key)
        .await?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
    if !password::verify(current, &stored) {
        return Err(ApiError::Auth("Current password incorrect".to_string()));
    }

    let hashed = password::hash(new)?;
    CrudGateway::set_text_column(&state.pool, table, "password", &hashed, "id", &key).await?;
    Ok(response::ok(
        crate::descriptor::EnvelopeShape::SuccessFlag,
        StatusCode::OK,
        Some("Password changed successfully"),
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_id_prefers_query_over_body() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "4".to_string());
        let body = gateway::parse_body(br#"{"id": 9}"#);
        assert_eq!(delete_id(&params, &body).unwrap(), json!(4));

        let params = HashMap::new();
        assert_eq!(delete_id(&params, &body).unwrap(), json!(9));

        let empty = gateway::parse_body(b"{}");
        let err = delete_id(&params, &empty).unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m == "id required"));
    }

    #[tokio::test]
    async fn short_new_password_is_rejected_before_lookup() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let state = AppState::new(pool, crate::descriptor::Registry::builtin());
        let body = gateway::parse_body(
            br#"{"id": 1, "current_password": "oldpw1234", "new_password": "short"}"#,
        );
        let err = change_password(&state, "students", &body).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(m)
            if m == "New password must be at least 8 characters"));
    }

    #[test]
    fn delete_id_rejects_non_numeric_query() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "abc".to_string());
        let body = gateway::parse_body(br#"{"id": "7"}"#);
        // unparseable query id falls through to the body
        assert_eq!(delete_id(&params, &body).unwrap(), json!(7));
    }
}
