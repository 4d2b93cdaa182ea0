//! Router assembly: the four gateway endpoints plus health/version.

use crate::handlers::{gateway, students};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/students", any(students_api))
        .route("/assignments/api", any(assignments_api))
        .route("/discussion/api", any(discussion_api))
        .route("/weekly/api", any(weekly_api))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

async fn version() -> Response {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") })).into_response()
}

async fn students_api(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let registry = state.registry.clone();
    students::dispatch(&state, &registry.students, method, &params, &body).await
}

async fn assignments_api(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let registry = state.registry.clone();
    gateway::dispatch(&state, &registry.assignments, method, &params, &body).await
}

async fn discussion_api(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let registry = state.registry.clone();
    gateway::dispatch(&state, &registry.discussion, method, &params, &body).await
}

async fn weekly_api(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let registry = state.registry.clone();
    gateway::dispatch(&state, &registry.weekly, method, &params, &body).await
}
