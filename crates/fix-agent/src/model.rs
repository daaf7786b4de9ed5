//! Fix-Agent-local data types (spec.md §3 "FixAgentInput" / "PatchOutput" / "RiskAssessment").

use pipeline_core::model::{Classification, FixAgentInstructions, RunMetadata};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FILES: usize = 4;
pub const MIN_MAX_FILES: usize = 1;
pub const MAX_MAX_FILES: usize = 8;
pub const DEFAULT_MAX_LINES: usize = 180;
pub const MIN_MAX_LINES: usize = 20;
pub const MAX_MAX_LINES: usize = 500;

/// The prepared input handed from `prepare-input` to `apply-and-validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAgentInput {
    pub run: RunMetadata,
    pub classification: Option<Classification>,
    pub fix_agent_instructions: Option<FixAgentInstructions>,
    pub extracted_spec_paths: Vec<String>,
    pub playwright_log_bytes: usize,
    pub backend_log_bytes: usize,
    pub upstream_notes: Vec<String>,
}

/// `git diff --numstat` rolled up into totals.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_deleted: usize,
    pub lines_total: usize,
}

/// Outcome of the optional Playwright subset rerun.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub attempted: bool,
    pub command: Option<String>,
    pub exit_code: Option<i32>,
    pub ok: bool,
}

impl ValidationRecord {
    #[must_use]
    pub fn not_attempted() -> Self {
        Self {
            attempted: false,
            command: None,
            exit_code: None,
            ok: false,
        }
    }
}

/// Risk level bucket assigned to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// The scoring + eligibility record (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: i64,
    pub factors: Vec<String>,
    pub auto_merge_eligible: bool,
}

/// Per-run guardrail configuration, echoed into the metadata for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub max_files: usize,
    pub max_lines: usize,
    pub allowlist: Vec<String>,
}

impl GuardrailConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let max_files = clamp_env_usize("FIX_AGENT_MAX_FILES", DEFAULT_MAX_FILES, MIN_MAX_FILES, MAX_MAX_FILES);
        let max_lines = clamp_env_usize("FIX_AGENT_MAX_LINES", DEFAULT_MAX_LINES, MIN_MAX_LINES, MAX_MAX_LINES);
        Self {
            max_files,
            max_lines,
            allowlist: vec!["tests/".to_string(), "django/".to_string()],
        }
    }
}

fn clamp_env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .map_or(default, |v| v.clamp(min, max))
}

/// Suggested metadata for a downstream pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestions {
    pub branch_name: String,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

/// Files touched (or attempted) by the Patch Engine, with diff stats.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChangeSummary {
    pub attempted_files: Vec<String>,
    pub changed_files: Vec<String>,
    pub diff_stats: DiffStats,
}

/// The metadata half of the (patch, metadata) pair the driver always writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchMetadata {
    pub status: String,
    pub generated_at: String,
    pub run_id: String,
    pub error_type: Option<String>,
    pub guardrails: GuardrailConfig,
    pub suggestions: Suggestions,
    pub change_summary: ChangeSummary,
    pub validation: ValidationRecord,
    pub needs_manual_review: bool,
    pub errors: Vec<String>,
    pub risk_assessment: RiskAssessment,
}
