use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::dispatch::{Dispatcher, Target};
use crate::response::ApiError;

pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,OPTIONS";

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "bookshelf-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handles everything under `/api/{owner}/`.
pub async fn api_handler(
    State(dispatcher): State<Dispatcher>,
    method: Method,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    // a segment that does not percent-decode to UTF-8 cannot be an owner
    let Path((owner, tail)) = path.map_err(|_| ApiError::invalid_owner())?;
    let target = Target::resolve(&owner, &tail)?;
    dispatcher.dispatch(&method, target, &body).await
}

/// Handles every path no route matched.
pub async fn fallback_handler() -> Response {
    ApiError::route_not_found().into_response()
}
