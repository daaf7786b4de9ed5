//! `prepare-input` stage: assembles a [`FixAgentInput`] from the run
//! context and a best-effort upstream classification (spec.md §4.3
//! "Input preparation").

use crate::model::FixAgentInput;
use pipeline_core::model::{Classification, FixAgentInstructions, LogBundle, RunMetadata};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

const MAX_EXTRACTED_SPEC_PATHS: usize = 3;

static SPEC_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tests/e2e/[\w./-]+\.spec\.(?:ts|js)").unwrap());

/// Extract up to [`MAX_EXTRACTED_SPEC_PATHS`] unique spec paths, in
/// first-seen order.
#[must_use]
pub fn extract_spec_paths(playwright_log: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in SPEC_PATH.find_iter(playwright_log) {
        let path = m.as_str().to_string();
        if seen.insert(path.clone()) {
            out.push(path);
            if out.len() >= MAX_EXTRACTED_SPEC_PATHS {
                break;
            }
        }
    }
    out
}

fn env_or_default(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Assemble the prepared input: read the raw logs off disk, extract spec
/// paths, and best-effort POST the bundle to the Ingest Gateway for a
/// classification. A missing token or unreachable gateway is recorded in
/// `upstream_notes` rather than failing the stage.
pub async fn prepare_input() -> FixAgentInput {
    let run_id = env_or_default("GITHUB_RUN_ID");
    let branch = env_or_default("GITHUB_REF_NAME");
    let commit = env_or_default("GITHUB_SHA");
    let status = env_or_default("E2E_STATUS");
    let job_name = env_or_default("FIX_AGENT_JOB_NAME");

    let playwright_log_path =
        std::env::var("PLAYWRIGHT_LOG_PATH").unwrap_or_else(|_| "playwright.log".to_string());
    let backend_log_path =
        std::env::var("BACKEND_LOG_PATH").unwrap_or_else(|_| "backend.log".to_string());

    let playwright_log = fs::read_to_string(&playwright_log_path).unwrap_or_default();
    let backend_log = fs::read_to_string(&backend_log_path).unwrap_or_default();

    let extracted_spec_paths = extract_spec_paths(&playwright_log);

    let timestamp = env_or_default_or_now("GITHUB_RUN_STARTED_AT");

    let bundle = LogBundle {
        playwright_log: playwright_log.clone(),
        backend_log: backend_log.clone(),
        run_id: run_id.clone(),
        job_name: job_name.clone(),
        timestamp: timestamp.clone(),
        branch: branch.clone(),
        commit: commit.clone(),
        status: status.clone(),
    };

    let mut upstream_notes = Vec::new();
    let (classification, fix_agent_instructions) =
        fetch_upstream_analysis(&bundle, &mut upstream_notes).await;

    FixAgentInput {
        run: RunMetadata {
            run_id,
            job_name,
            branch,
            commit,
            status,
            timestamp,
        },
        classification,
        fix_agent_instructions,
        extracted_spec_paths,
        playwright_log_bytes: playwright_log.len(),
        backend_log_bytes: backend_log.len(),
        upstream_notes,
    }
}

fn env_or_default_or_now(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| chrono::Utc::now().to_rfc3339())
}

async fn fetch_upstream_analysis(
    bundle: &LogBundle,
    notes: &mut Vec<String>,
) -> (Option<Classification>, Option<FixAgentInstructions>) {
    let Ok(token) = std::env::var("AGENT_TOKEN") else {
        notes.push("AGENT_TOKEN is not set; proceeding without an upstream classification".to_string());
        return (None, None);
    };
    let Ok(url) = std::env::var("CLOUD_AGENT_URL") else {
        notes.push("CLOUD_AGENT_URL is not set; proceeding without an upstream classification".to_string());
        return (None, None);
    };

    match post_bundle(&url, &token, bundle).await {
        Ok(result) => result,
        Err(e) => {
            notes.push(format!("upstream classification request failed: {e}"));
            (None, None)
        }
    }
}

async fn post_bundle(
    url: &str,
    token: &str,
    bundle: &LogBundle,
) -> anyhow::Result<(Option<Classification>, Option<FixAgentInstructions>)> {
    let client = reqwest::Client::new();
    let response = client.post(url).bearer_auth(token).json(bundle).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("ingest gateway responded with {}", response.status());
    }
    let body: serde_json::Value = response.json().await?;
    let upstream = body.get("upstream").cloned().unwrap_or(serde_json::Value::Null);

    let classification = upstream
        .get("classification")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());
    let fix_agent_instructions = upstream
        .get("fix_agent_instructions")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok());

    Ok((classification, fix_agent_instructions))
}
