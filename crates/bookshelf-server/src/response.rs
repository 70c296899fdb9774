//! JSON envelopes returned by every endpoint.
//!
//! Success: `{"success": true, "result": ...}`.
//! Failure: `{"success": false, "error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use bookshelf_actors::{ActorError, ErrorKind};

pub const MSG_ROUTE_NOT_FOUND: &str = "Route not found";
pub const MSG_INVALID_OWNER: &str = "Invalid or missing email in path.";
pub const MSG_INVALID_BOOK: &str = "Body must include 'name' and 'author'.";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result,
        }
    }

    /// Wrap into a response with the given status.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        self.with_status(StatusCode::OK)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
}

/// An error that renders as the JSON failure envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn route_not_found() -> Self {
        Self::not_found(MSG_ROUTE_NOT_FOUND)
    }

    pub fn invalid_owner() -> Self {
        Self::bad_request(MSG_INVALID_OWNER)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ActorError> for ApiError {
    fn from(e: ActorError) -> Self {
        match e.kind() {
            ErrorKind::InvalidArgument => Self::bad_request(e.to_string()),
            ErrorKind::Internal => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = ErrorBody {
            success: false,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_store::StoreError;

    #[test]
    fn actor_errors_map_by_kind() {
        let bad: ApiError = ActorError::InvalidArgument("x".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let internal: ApiError = ActorError::Store(StoreError::Serialization("boom".into())).into();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message(), "store error: serialization error: boom");
    }

    #[test]
    fn canned_errors() {
        assert_eq!(ApiError::route_not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::route_not_found().message(), "Route not found");
        assert_eq!(ApiError::invalid_owner().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn error_renders_json_status() {
        let response = ApiError::not_found("nope").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn success_envelope_shape() {
        let value = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(value, serde_json::json!({"success": true, "result": [1, 2]}));
    }
}
