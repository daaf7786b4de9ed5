//! HTTP-facing error type (spec.md §6/§7).

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error surfaced to a caller of `POST /process-logs`.
#[derive(Debug)]
pub enum AppError {
    InvalidPayload(Vec<String>),
    Unauthorized,
    MethodNotAllowed,
    Misconfigured,
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidPayload(missing) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_payload", "missing": missing })),
            )
                .into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            Self::MethodNotAllowed => {
                let mut headers = HeaderMap::new();
                headers.insert("Allow", HeaderValue::from_static("POST"));
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    headers,
                    Json(json!({ "error": "method_not_allowed" })),
                )
                    .into_response()
            }
            Self::Misconfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "misconfigured" })),
            )
                .into_response(),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal_error" })),
            )
                .into_response(),
        }
    }
}
