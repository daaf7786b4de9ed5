//! Router and request handling for the Ingest Gateway (spec.md §4.1).

use crate::auth::{extract_bearer, tokens_match};
use crate::config::Config;
use crate::error::AppError;
use crate::forward::{build_upstream_url, forward_bundle};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline_core::model::{BundleParseError, LogBundle};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every handler.
pub struct ServerState {
    pub config: Config,
    pub client: reqwest::Client,
}

impl ServerState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client config is static and known-valid");
        Self { config, client }
    }
}

/// Build the application router.
#[must_use]
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/ci/logs", post(ci_logs_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ci_logs_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<Value>, AppError> {
    let Some(expected_token) = state.config.agent_token.as_deref() else {
        tracing::error!("AGENT_TOKEN is not configured");
        return Err(AppError::Misconfigured);
    };

    let provided = extract_bearer(&headers).ok_or(AppError::Unauthorized)?;
    if !tokens_match(&provided, expected_token) {
        return Err(AppError::Unauthorized);
    }

    let bundle = LogBundle::parse(&body).map_err(|e| match e {
        BundleParseError::InvalidJson(msg) => {
            tracing::debug!(error = %msg, "rejected malformed JSON body");
            AppError::InvalidJson
        }
        BundleParseError::Fields(details) => AppError::InvalidPayload(details),
    })?;

    let Some(upstream_base) = state.config.developer_agent_url.as_deref() else {
        tracing::error!("DEVELOPER_AGENT_URL is not configured");
        return Err(AppError::Misconfigured);
    };
    let upstream_token = state.config.developer_agent_token.as_deref().unwrap_or("");
    let upstream_url = build_upstream_url(upstream_base);

    let upstream = forward_bundle(&state.client, &upstream_url, upstream_token, &bundle).await?;

    tracing::info!(run_id = %bundle.run_id, job_name = %bundle.job_name, "forwarded log bundle upstream");

    Ok(Json(json!({
        "status": "received",
        "upstream": upstream,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router_with(config: Config) -> Router {
        build_router(Arc::new(ServerState::new(config)))
    }

    fn base_config(token: Option<&str>, upstream: Option<&str>) -> Config {
        Config {
            agent_token: token.map(str::to_string),
            developer_agent_url: upstream.map(str::to_string),
            developer_agent_token: Some("upstream-token".to_string()),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[tokio::test]
    async fn health_endpoint_ok() {
        let app = router_with(base_config(Some("t"), Some("http://example.invalid")));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_missing_token_config_as_misconfigured() {
        let app = router_with(base_config(None, Some("http://example.invalid")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ci/logs")
                    .header("authorization", "Bearer anything")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn rejects_wrong_token_as_unauthorized() {
        let app = router_with(base_config(Some("secret"), Some("http://example.invalid")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ci/logs")
                    .header("authorization", "Bearer wrong")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_invalid_payload_with_field_details() {
        let app = router_with(base_config(Some("secret"), Some("http://example.invalid")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ci/logs")
                    .header("authorization", "Bearer secret")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_post_method_is_rejected() {
        let app = router_with(base_config(Some("secret"), Some("http://example.invalid")));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/ci/logs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
