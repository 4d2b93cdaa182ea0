//! Response envelope construction for both wrapper shapes.
//!
//! Shape A (`success` boolean) and Shape B (`status` tag) are both part of
//! the compatibility contract; every body passes through here so the shape
//! choice stays in one place.

use crate::descriptor::EnvelopeShape;
use crate::error::ApiError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Success envelope with optional message and data.
pub fn ok(
    shape: EnvelopeShape,
    status: StatusCode,
    message: Option<&str>,
    data: Option<Value>,
) -> Response {
    let mut obj = success_envelope(shape);
    if let Some(m) = message {
        obj.insert("message".into(), Value::String(m.to_string()));
    }
    if let Some(d) = data {
        obj.insert("data".into(), d);
    }
    (status, Json(Value::Object(obj))).into_response()
}

/// List envelope carrying a `count` alongside `data` (assignment comments).
pub fn ok_with_count(shape: EnvelopeShape, message: Option<&str>, rows: Vec<Value>) -> Response {
    let mut obj = success_envelope(shape);
    if let Some(m) = message {
        obj.insert("message".into(), Value::String(m.to_string()));
    }
    obj.insert("count".into(), Value::Number(rows.len().into()));
    obj.insert("data".into(), Value::Array(rows));
    (StatusCode::OK, Json(Value::Object(obj))).into_response()
}

fn success_envelope(shape: EnvelopeShape) -> serde_json::Map<String, Value> {
    let mut obj = serde_json::Map::new();
    match shape {
        EnvelopeShape::SuccessFlag => obj.insert("success".into(), Value::Bool(true)),
        EnvelopeShape::StatusTag => obj.insert("status".into(), Value::String("success".into())),
    };
    obj
}

/// Update that matched a row but changed nothing: success for Shape A,
/// an explicit `"status": "info"` for Shape B.
pub fn info(shape: EnvelopeShape, message: &str) -> Response {
    let body = match shape {
        EnvelopeShape::SuccessFlag => json!({ "success": true, "message": message }),
        EnvelopeShape::StatusTag => json!({ "status": "info", "message": message }),
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn error(shape: EnvelopeShape, status: StatusCode, message: &str) -> Response {
    let body = match shape {
        EnvelopeShape::SuccessFlag => json!({ "success": false, "message": message }),
        EnvelopeShape::StatusTag => json!({ "status": "error", "message": message }),
    };
    (status, Json(body)).into_response()
}

/// Bare JSON payload with no envelope (assignments list).
pub fn plain(data: Value) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Map an [`ApiError`] into the family's envelope. Internal failures are
/// logged here; their detail never reaches the body.
pub fn render_error(shape: EnvelopeShape, err: ApiError) -> Response {
    match &err {
        ApiError::Db(e) => tracing::error!(error = %e, "database failure"),
        ApiError::Unexpected(e) => tracing::error!(error = %e, "unexpected failure"),
        _ => {}
    }
    error(shape, err.status(), err.public_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> (StatusCode, Value) {
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn success_flag_shape() {
        let resp = ok(
            EnvelopeShape::SuccessFlag,
            StatusCode::CREATED,
            Some("Week created"),
            Some(json!({"week_id": "week_1"})),
        );
        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Week created"));
        assert_eq!(body["data"]["week_id"], json!("week_1"));
    }

    #[tokio::test]
    async fn status_tag_shape_and_info() {
        let (status, body) = body_json(error(
            EnvelopeShape::StatusTag,
            StatusCode::NOT_FOUND,
            "Assignment not found",
        ))
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], json!("error"));

        let (status, body) =
            body_json(info(EnvelopeShape::StatusTag, "No changes were made to the assignment.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("info"));
    }

    #[tokio::test]
    async fn count_envelope() {
        let rows = vec![json!({"id": 1}), json!({"id": 2})];
        let (_, body) = body_json(ok_with_count(EnvelopeShape::StatusTag, None, rows)).await;
        assert_eq!(body["count"], json!(2));
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn db_error_is_generic() {
        let resp = render_error(
            EnvelopeShape::SuccessFlag,
            ApiError::Db(sqlx::Error::PoolTimedOut),
        );
        let (status, body) = body_json(resp).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!("Database error occurred"));
    }
}
