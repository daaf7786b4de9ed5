//! `create-pr` stage: decides whether a patch is eligible for automated
//! staging. Git hosting and its pull-request APIs are an external
//! collaborator (spec.md §1); this stage only decides and logs.

use crate::model::PatchMetadata;
use serde_json::json;
use std::fs;
use std::path::Path;

/// The stage/skip decision and its human-readable rationale.
pub struct Decision {
    pub should_stage: bool,
    pub reason: String,
}

/// Decide whether `metadata` describes a patch eligible for automated
/// staging: a non-empty patch, no manual-review flag, and an
/// auto-merge-eligible risk assessment.
#[must_use]
pub fn decide(metadata: &PatchMetadata, patch_text: &str) -> Decision {
    if patch_text.trim().is_empty() {
        return Decision {
            should_stage: false,
            reason: "patch is empty; nothing to stage".to_string(),
        };
    }
    if metadata.needs_manual_review {
        return Decision {
            should_stage: false,
            reason: "needs_manual_review is set".to_string(),
        };
    }
    if metadata.risk_assessment.auto_merge_eligible {
        Decision {
            should_stage: true,
            reason: "risk assessment is auto-merge eligible".to_string(),
        }
    } else {
        Decision {
            should_stage: false,
            reason: format!(
                "risk level {:?} is not auto-merge eligible",
                metadata.risk_assessment.level
            ),
        }
    }
}

/// Run the `create-pr` stage: read the metadata/patch, decide, and either
/// print the decision (`--dry-run`) or log it and stop. Opening the
/// actual pull request is out of scope.
///
/// # Errors
/// Returns an error if the metadata or patch file cannot be read, or the
/// metadata cannot be deserialized.
pub fn run_create_pr(metadata_path: &Path, patch_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let metadata: PatchMetadata = serde_json::from_str(&fs::read_to_string(metadata_path)?)?;
    let patch_text = fs::read_to_string(patch_path).unwrap_or_default();
    let decision = decide(&metadata, &patch_text);

    if dry_run {
        let report = json!({
            "should_stage": decision.should_stage,
            "reason": decision.reason,
            "branch_name": metadata.suggestions.branch_name,
            "pr_title": metadata.suggestions.pr_title,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if decision.should_stage {
        tracing::info!(
            branch = %metadata.suggestions.branch_name,
            title = %metadata.suggestions.pr_title,
            "staging branch for pull request creation"
        );
    } else {
        tracing::info!(reason = %decision.reason, "skipping automated PR staging");
    }

    Ok(())
}
