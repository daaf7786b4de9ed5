//! Router and request handling for the Log Processor (spec.md §4.2).

use crate::auth::{extract_bearer, tokens_match};
use crate::config::Config;
use crate::dispatch::{Dispatcher, FsDispatcher};
use crate::error::AppError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use pipeline_core::artifact_store::{normalize_log, normalize_run_id, resolve_logs_root, RunStore};
use pipeline_core::classifier::classify;
use pipeline_core::instructions::derive_instructions;
use pipeline_core::model::{
    Analysis, BundleParseError, DispatchArtifactPaths, FixAgentDispatch, LogBundle, RunArtifacts,
    RunMetadata, SelfHealDispatch, Triggers,
};
use pipeline_core::plan::derive_plan;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct ServerState {
    pub config: Config,
}

/// Build the application router.
#[must_use]
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/process-logs", post(process_logs_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn process_logs_handler(
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
        BundleParseError::InvalidJson(_) => AppError::InvalidPayload(vec!["body: invalid JSON".to_string()]),
        BundleParseError::Fields(missing) => AppError::InvalidPayload(missing),
    })?;

    let run_id = normalize_run_id(&bundle.run_id);

    let logs_root = resolve_logs_root().map_err(|e| {
        tracing::error!(error = %e, "failed to resolve a writable logs root");
        AppError::Internal
    })?;
    let run_store = RunStore::new(&logs_root, &run_id).map_err(|e| {
        tracing::error!(error = %e, "failed to create run directory");
        AppError::Internal
    })?;

    let playwright_log = normalize_log(&bundle.playwright_log);
    let backend_log = normalize_log(&bundle.backend_log);

    let playwright_log_path = run_store.write_atomic("playwright.log", &playwright_log).map_err(|e| {
        tracing::error!(error = %e, "failed to persist playwright.log");
        AppError::Internal
    })?;
    let backend_log_path = run_store.write_atomic("backend.log", &backend_log).map_err(|e| {
        tracing::error!(error = %e, "failed to persist backend.log");
        AppError::Internal
    })?;

    let classification = classify(&playwright_log, &backend_log);
    let self_heal_plan = derive_plan(classification.error_type);
    let fix_agent_instructions = derive_instructions(&classification, &playwright_log, &backend_log);
    let run_metadata = RunMetadata::from_bundle(&bundle, &run_id);

    let analysis_path = run_store.path("analysis.json");
    let artifacts = RunArtifacts {
        run_dir: run_store.run_dir().to_path_buf(),
        playwright_log_path,
        backend_log_path,
        analysis_path: analysis_path.clone(),
        self_heal_path: None,
        fix_agent_path: None,
        triggers_path: None,
    };

    let processed_at = Utc::now().to_rfc3339();
    let analysis = Analysis {
        processed_at: processed_at.clone(),
        run: run_metadata.clone(),
        classification: classification.clone(),
        self_heal_plan: self_heal_plan.clone(),
        fix_agent_instructions: fix_agent_instructions.clone(),
        storage: artifacts,
    };
    let analysis_json = serde_json::to_string_pretty(&analysis).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize analysis.json");
        AppError::Internal
    })?;
    run_store.write_atomic("analysis.json", &analysis_json).map_err(|e| {
        tracing::error!(error = %e, "failed to persist analysis.json");
        AppError::Internal
    })?;

    let is_failed = bundle.status.eq_ignore_ascii_case("failed");
    let triggers = Triggers {
        timestamp: processed_at,
        self_heal_dispatched: is_failed,
        fix_agent_dispatched: is_failed,
    };

    if is_failed {
        let storage = DispatchArtifactPaths {
            playwright_log_path: analysis.storage.playwright_log_path.clone(),
            backend_log_path: analysis.storage.backend_log_path.clone(),
            analysis_path,
        };
        let self_heal = SelfHealDispatch {
            run: run_metadata.clone(),
            classification: classification.clone(),
            self_heal_plan: self_heal_plan.clone(),
            storage: storage.clone(),
        };
        let fix_agent = FixAgentDispatch {
            run: run_metadata,
            classification: classification.clone(),
            fix_agent_instructions: fix_agent_instructions.clone(),
            storage,
        };
        let dispatcher = FsDispatcher { run_store: &run_store };
        dispatcher.dispatch(&self_heal, &fix_agent, &triggers).map_err(|e| {
            tracing::error!(error = %e, "failed to persist dispatch payloads");
            AppError::Internal
        })?;
    }

    tracing::info!(run_id = %run_id, error_type = classification.error_type.token(), "processed log bundle");

    Ok(Json(json!({
        "status": "processed",
        "run_id": run_id,
        "classification": classification,
        "self_heal_plan": self_heal_plan,
        "fix_agent_instructions": fix_agent_instructions,
        "triggers": triggers,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router_with(token: Option<&str>) -> Router {
        let state = Arc::new(ServerState {
            config: Config {
                agent_token: token.map(str::to_string),
                bind_addr: "127.0.0.1:0".to_string(),
            },
        });
        build_router(state)
    }

    fn body_for(run_id: &str, status: &str) -> String {
        format!(
            r#"{{"playwright_log":"ok","backend_log":"ok","run_id":"{run_id}",
                "job_name":"e2e","timestamp":"2025-01-01T00:00:00Z","branch":"main",
                "commit":"abc","status":"{status}"}}"#
        )
    }

    #[tokio::test]
    async fn rejects_missing_auth() {
        let app = router_with(Some("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process-logs")
                    .header("content-type", "application/json")
                    .body(Body::from(body_for("run-a", "passed")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn processes_passed_run_without_dispatch_files() {
        let app = router_with(Some("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/process-logs")
                    .header("authorization", "Bearer secret")
                    .header("content-type", "application/json")
                    .body(Body::from(body_for("run-b", "passed")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn non_post_method_is_rejected() {
        let app = router_with(Some("secret"));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/process-logs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
