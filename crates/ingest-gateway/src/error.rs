//! HTTP-facing error type (spec.md §6/§7).

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error surfaced to a caller of `POST /api/ci/logs`.
#[derive(Debug)]
pub enum AppError {
    InvalidJson,
    InvalidPayload(Vec<String>),
    Unauthorized,
    MethodNotAllowed,
    Misconfigured,
    UpstreamFailed {
        status: Option<u16>,
        body: Option<String>,
        message: Option<String>,
    },
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidJson => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON body" })),
            )
                .into_response(),
            Self::InvalidPayload(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_payload", "details": details })),
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
            Self::UpstreamFailed {
                status,
                body,
                message,
            } => {
                let mut payload = json!({ "error": "upstream_failed" });
                if let Some(obj) = payload.as_object_mut() {
                    if let Some(s) = status {
                        obj.insert("upstream_status".to_string(), json!(s));
                    }
                    if let Some(b) = body {
                        obj.insert("upstream_body".to_string(), json!(b));
                    }
                    if let Some(m) = message {
                        obj.insert("message".to_string(), json!(m));
                    }
                }
                (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal_error" })),
            )
                .into_response(),
        }
    }
}
