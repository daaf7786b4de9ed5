//! Core data types shared by the Log Processor and the Fix-Agent.
//!
//! Mirrors the record shapes in the pipeline's wire contract: a
//! [`LogBundle`] comes in, a [`Classification`] comes out of the rule
//! engine, and a [`SelfHealPlan`] / [`FixAgentInstructions`] pair is
//! derived from it for downstream consumers.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Maximum number of failing tests retained on a [`Classification`].
pub const MAX_FAILING_TESTS: usize = 5;
/// Maximum length, in bytes, of a log snippet embedded in instructions.
pub const MAX_SNIPPET_LEN: usize = 6000;
/// Maximum length, in bytes, of a suspected root-cause string.
pub const MAX_ROOT_CAUSE_LEN: usize = 2000;

/// The raw payload a CI run submits to the Ingest Gateway / Log Processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBundle {
    pub playwright_log: String,
    pub backend_log: String,
    #[serde(deserialize_with = "deserialize_run_id")]
    pub run_id: String,
    pub job_name: String,
    pub timestamp: String,
    pub branch: String,
    pub commit: String,
    pub status: String,
}

/// Deserialize `run_id` from either a JSON string or a JSON number.
fn deserialize_run_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RunId {
        Str(String),
        Num(serde_json::Number),
    }

    match RunId::deserialize(deserializer)? {
        RunId::Str(s) => Ok(s),
        RunId::Num(n) => Ok(n.to_string()),
    }
}

impl LogBundle {
    /// Parse and validate a `LogBundle` out of a raw JSON body.
    ///
    /// `playwright_log`/`backend_log` are type-checked only: an empty string
    /// is a legal value here, since the classifier treats "both empty after
    /// trimming" as the `missing_logs` outcome rather than a rejected
    /// request. The remaining metadata fields must be non-empty strings, and
    /// `run_id` accepts either a string or a number.
    ///
    /// # Errors
    /// Returns [`BundleParseError::InvalidJson`] if `bytes` is not valid
    /// JSON, or [`BundleParseError::Fields`] with one message per offending
    /// field otherwise.
    pub fn parse(bytes: &[u8]) -> Result<Self, BundleParseError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| BundleParseError::InvalidJson(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Err(BundleParseError::Fields(vec![
                "body must be a JSON object".to_string(),
            ]));
        };

        let mut errors = Vec::new();
        let playwright_log = require_string(obj, "playwright_log", false, &mut errors);
        let backend_log = require_string(obj, "backend_log", false, &mut errors);
        let job_name = require_string(obj, "job_name", true, &mut errors);
        let timestamp = require_string(obj, "timestamp", true, &mut errors);
        let branch = require_string(obj, "branch", true, &mut errors);
        let commit = require_string(obj, "commit", true, &mut errors);
        let status = require_string(obj, "status", true, &mut errors);
        let run_id = match obj.get("run_id") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                errors.push("run_id: must be a string or number".to_string());
                None
            }
            None => {
                errors.push("run_id: missing".to_string());
                None
            }
        };

        if !errors.is_empty() {
            return Err(BundleParseError::Fields(errors));
        }

        Ok(Self {
            playwright_log: playwright_log.unwrap_or_default(),
            backend_log: backend_log.unwrap_or_default(),
            run_id: run_id.unwrap_or_default(),
            job_name: job_name.unwrap_or_default(),
            timestamp: timestamp.unwrap_or_default(),
            branch: branch.unwrap_or_default(),
            commit: commit.unwrap_or_default(),
            status: status.unwrap_or_default(),
        })
    }
}

fn require_string(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    reject_empty: bool,
    errors: &mut Vec<String>,
) -> Option<String> {
    match obj.get(key) {
        Some(serde_json::Value::String(s)) if reject_empty && s.is_empty() => {
            errors.push(format!("{key}: must not be empty"));
            None
        }
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(format!("{key}: must be a string"));
            None
        }
        None => {
            errors.push(format!("{key}: missing"));
            None
        }
    }
}

/// Failure modes of [`LogBundle::parse`].
#[derive(Debug, Clone)]
pub enum BundleParseError {
    /// The body could not be parsed as JSON at all.
    InvalidJson(String),
    /// The body parsed as JSON but failed field-level validation.
    Fields(Vec<String>),
}

/// The failure class assigned by the rule-based classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    FrontendSelector,
    FrontendTiming,
    Backend500,
    BackendMigration,
    #[serde(rename = "auth/session")]
    AuthSession,
    #[serde(rename = "infra/network")]
    InfraNetwork,
    BackendException,
    Unknown,
    MissingLogs,
}

impl ErrorType {
    /// A filesystem/log-friendly token, used in scoring factors and labels.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::FrontendSelector => "frontend-selector",
            Self::FrontendTiming => "frontend-timing",
            Self::Backend500 => "backend-500",
            Self::BackendMigration => "backend-migration",
            Self::AuthSession => "auth/session",
            Self::InfraNetwork => "infra/network",
            Self::BackendException => "backend-exception",
            Self::Unknown => "unknown",
            Self::MissingLogs => "missing_logs",
        }
    }
}

/// Confidence level attached to a [`Classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// The rule engine's verdict on a single `(playwright_log, backend_log)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub error_type: ErrorType,
    pub confidence: Confidence,
    pub failing_tests: Vec<String>,
    pub signals: Vec<String>,
    pub summary: String,
}

/// Human-readable remediation bullets tied to an [`ErrorType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfHealPlan {
    pub what_to_inspect: Vec<String>,
    pub what_to_change: Vec<String>,
    pub tests_to_rerun: Vec<String>,
}

/// The two key excerpts handed to the Fix-Agent, one per source log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyLogSnippets {
    pub playwright: String,
    pub backend: String,
}

/// Structured hints that narrow the Fix-Agent's search space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAgentInstructions {
    pub suspected_paths: Vec<String>,
    pub failing_tests: Vec<String>,
    pub suspected_root_cause: String,
    pub suggested_fix_direction: String,
    pub key_log_snippets: KeyLogSnippets,
}

/// Run metadata carried alongside every persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub job_name: String,
    pub branch: String,
    pub commit: String,
    pub status: String,
    pub timestamp: String,
}

impl RunMetadata {
    #[must_use]
    pub fn from_bundle(bundle: &LogBundle, normalized_run_id: &str) -> Self {
        Self {
            run_id: normalized_run_id.to_string(),
            job_name: bundle.job_name.clone(),
            branch: bundle.branch.clone(),
            commit: bundle.commit.clone(),
            status: bundle.status.clone(),
            timestamp: bundle.timestamp.clone(),
        }
    }
}

/// The on-disk layout of a single run's artifact directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub run_dir: PathBuf,
    pub playwright_log_path: PathBuf,
    pub backend_log_path: PathBuf,
    pub analysis_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_heal_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_agent_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers_path: Option<PathBuf>,
}

/// The fully-assembled analysis record persisted as `analysis.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub processed_at: String,
    pub run: RunMetadata,
    pub classification: Classification,
    pub self_heal_plan: SelfHealPlan,
    pub fix_agent_instructions: FixAgentInstructions,
    pub storage: RunArtifacts,
}

/// Boolean dispatch flags persisted as `triggers.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triggers {
    pub timestamp: String,
    pub self_heal_dispatched: bool,
    pub fix_agent_dispatched: bool,
}

/// The three per-run artifact paths carried on every dispatch payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchArtifactPaths {
    pub playwright_log_path: PathBuf,
    pub backend_log_path: PathBuf,
    pub analysis_path: PathBuf,
}

impl From<&RunArtifacts> for DispatchArtifactPaths {
    fn from(artifacts: &RunArtifacts) -> Self {
        Self {
            playwright_log_path: artifacts.playwright_log_path.clone(),
            backend_log_path: artifacts.backend_log_path.clone(),
            analysis_path: artifacts.analysis_path.clone(),
        }
    }
}

/// The full record persisted as `self-heal.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfHealDispatch {
    pub run: RunMetadata,
    pub classification: Classification,
    pub self_heal_plan: SelfHealPlan,
    pub storage: DispatchArtifactPaths,
}

/// The full record persisted as `fix-agent.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAgentDispatch {
    pub run: RunMetadata,
    pub classification: Classification,
    pub fix_agent_instructions: FixAgentInstructions,
    pub storage: DispatchArtifactPaths,
}
