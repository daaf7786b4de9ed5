//! Fix-Agent Driver: orchestrates input, patch engine, optional
//! validation, and artifact writing. Never throws; any failure becomes
//! an error-metadata record with an empty patch (spec.md §4.3 "Contract").

use crate::git::Shell;
use crate::model::{
    ChangeSummary, DiffStats, FixAgentInput, GuardrailConfig, PatchMetadata, Suggestions,
    ValidationRecord,
};
use crate::{patch_engine, risk, validation};
use pipeline_core::artifact_store::normalize_run_id;
use pipeline_core::model::ErrorType;
use std::path::Path;

/// Run the driver end to end, never returning an `Err`: any failure is
/// translated into error metadata with an empty patch.
pub async fn run(input: &FixAgentInput, repo_dir: &Path, shell: &dyn Shell) -> (String, PatchMetadata) {
    match run_inner(input, repo_dir, shell).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "fix-agent driver failed unexpectedly");
            (String::new(), error_metadata(input, &e.to_string()))
        }
    }
}

async fn run_inner(
    input: &FixAgentInput,
    repo_dir: &Path,
    shell: &dyn Shell,
) -> anyhow::Result<(String, PatchMetadata)> {
    let guardrails = GuardrailConfig::from_env();
    let run_id = normalize_run_id(&input.run.run_id);
    let generated_at = chrono::Utc::now().to_rfc3339();

    let Some(classification) = input.classification.clone() else {
        return Ok(missing_analysis_result(input, guardrails, run_id, generated_at));
    };
    let Some(instructions) = input.fix_agent_instructions.clone() else {
        return Ok(missing_analysis_result(input, guardrails, run_id, generated_at));
    };

    let candidates = patch_engine::select_candidate_files(
        &input.extracted_spec_paths,
        &instructions.suspected_paths,
        guardrails.max_files,
    );

    let changed_files = patch_engine::apply(
        classification.error_type,
        repo_dir,
        &candidates,
        &instructions.key_log_snippets.playwright,
    )?;

    let numstat = shell.git_diff_numstat(repo_dir).await?;
    let diff_stats = parse_numstat(&numstat.stdout);

    if diff_stats.files_changed > guardrails.max_files || diff_stats.lines_total > guardrails.max_lines {
        if !changed_files.is_empty() {
            let _ = shell.git_checkout(repo_dir, &changed_files).await;
        }
        let risk_assessment = risk::critical("guardrail_triggered: diff exceeds max_files/max_lines caps");
        return Ok((
            String::new(),
            PatchMetadata {
                status: "ok".to_string(),
                generated_at,
                error_type: Some(classification.error_type.token().to_string()),
                guardrails,
                suggestions: default_suggestions(&run_id, Some(classification.error_type)),
                run_id,
                change_summary: ChangeSummary {
                    attempted_files: candidates,
                    changed_files: Vec::new(),
                    diff_stats: DiffStats::default(),
                },
                validation: ValidationRecord::not_attempted(),
                needs_manual_review: true,
                errors: vec!["guardrail_triggered: diff exceeds configured max_files/max_lines caps".to_string()],
                risk_assessment,
            },
        ));
    }

    let validation_record = validation::maybe_validate(
        shell,
        repo_dir,
        classification.error_type,
        &changed_files,
        &input.extracted_spec_paths,
    )
    .await;

    let mut errors = Vec::new();
    let needs_manual_review = validation_record.attempted && !validation_record.ok;
    if needs_manual_review {
        errors.push("validation_failed: playwright subset rerun exited non-zero".to_string());
    }

    let diff_output = shell.git_diff(repo_dir).await?;
    let risk_assessment = risk::assess(classification.error_type, &changed_files, &diff_stats, &validation_record);

    let metadata = PatchMetadata {
        status: "ok".to_string(),
        generated_at,
        error_type: Some(classification.error_type.token().to_string()),
        guardrails,
        suggestions: default_suggestions(&run_id, Some(classification.error_type)),
        run_id,
        change_summary: ChangeSummary {
            attempted_files: candidates,
            changed_files,
            diff_stats,
        },
        validation: validation_record,
        needs_manual_review,
        errors,
        risk_assessment,
    };

    Ok((diff_output.stdout, metadata))
}

fn missing_analysis_result(
    input: &FixAgentInput,
    guardrails: GuardrailConfig,
    run_id: String,
    generated_at: String,
) -> (String, PatchMetadata) {
    let risk_assessment = risk::critical("missing classification and/or fix-agent instructions");
    (
        String::new(),
        PatchMetadata {
            status: "ok".to_string(),
            generated_at,
            error_type: None,
            guardrails,
            suggestions: default_suggestions(&run_id, None),
            run_id,
            change_summary: ChangeSummary::default(),
            validation: ValidationRecord::not_attempted(),
            needs_manual_review: true,
            errors: vec!["no usable classification or fix-agent instructions; nothing to act on".to_string()],
            risk_assessment,
        },
    )
}

fn error_metadata(input: &FixAgentInput, message: &str) -> PatchMetadata {
    PatchMetadata {
        status: "error".to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        run_id: normalize_run_id(&input.run.run_id),
        error_type: input.classification.as_ref().map(|c| c.error_type.token().to_string()),
        guardrails: GuardrailConfig::from_env(),
        suggestions: default_suggestions(&normalize_run_id(&input.run.run_id), input.classification.as_ref().map(|c| c.error_type)),
        change_summary: ChangeSummary::default(),
        validation: ValidationRecord::not_attempted(),
        needs_manual_review: true,
        errors: vec![message.to_string()],
        risk_assessment: risk::critical("driver_error"),
    }
}

fn default_suggestions(run_id: &str, error_type: Option<ErrorType>) -> Suggestions {
    let token = error_type.map(ErrorType::token).unwrap_or("unknown");
    Suggestions {
        branch_name: format!("fix-agent/{token}-{run_id}"),
        commit_message: format!("fix-agent: address {token} failure in run {run_id}"),
        pr_title: format!("Fix-Agent: {token} remediation for run {run_id}"),
        pr_body: format!("Automated remediation for run `{run_id}` classified as `{token}`."),
    }
}

fn parse_numstat(output: &str) -> DiffStats {
    let mut files_changed = 0usize;
    let mut lines_added = 0usize;
    let mut lines_deleted = 0usize;
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        let added = parts.next().unwrap_or("0").parse::<usize>().unwrap_or(0);
        let deleted = parts.next().unwrap_or("0").parse::<usize>().unwrap_or(0);
        files_changed += 1;
        lines_added += added;
        lines_deleted += deleted;
    }
    DiffStats {
        files_changed,
        lines_added,
        lines_deleted,
        lines_total: lines_added + lines_deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::CommandOutput;
    use async_trait::async_trait;
    use pipeline_core::model::{
        Classification, Confidence, FixAgentInstructions, KeyLogSnippets, RunMetadata,
    };
    use std::path::PathBuf;

    struct ScriptedShell {
        numstat: String,
        diff: String,
    }

    #[async_trait]
    impl Shell for ScriptedShell {
        async fn git_diff(&self, _repo_dir: &Path) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput {
                code: 0,
                stdout: self.diff.clone(),
                stderr: String::new(),
            })
        }
        async fn git_diff_numstat(&self, _repo_dir: &Path) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput {
                code: 0,
                stdout: self.numstat.clone(),
                stderr: String::new(),
            })
        }
        async fn git_checkout(&self, _repo_dir: &Path, _paths: &[String]) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput { code: 0, stdout: String::new(), stderr: String::new() })
        }
        async fn playwright_test(&self, _repo_dir: &Path, _specs: &[String]) -> anyhow::Result<CommandOutput> {
            Ok(CommandOutput { code: 0, stdout: String::new(), stderr: String::new() })
        }
    }

    fn sample_input() -> FixAgentInput {
        FixAgentInput {
            run: RunMetadata {
                run_id: "run-1".to_string(),
                job_name: "e2e".to_string(),
                branch: "main".to_string(),
                commit: "abc".to_string(),
                status: "failed".to_string(),
                timestamp: "2025-01-01T00:00:00Z".to_string(),
            },
            classification: None,
            fix_agent_instructions: None,
            extracted_spec_paths: vec![],
            playwright_log_bytes: 0,
            backend_log_bytes: 0,
            upstream_notes: vec![],
        }
    }

    #[tokio::test]
    async fn missing_analysis_yields_critical_empty_patch() {
        let shell = ScriptedShell { numstat: String::new(), diff: String::new() };
        let (patch, metadata) = run(&sample_input(), &PathBuf::from("."), &shell).await;
        assert!(patch.is_empty());
        assert!(metadata.needs_manual_review);
        assert_eq!(metadata.risk_assessment.level, crate::model::RiskLevel::Critical);
    }

    #[tokio::test]
    async fn guardrail_triggers_on_oversized_diff() {
        std::env::set_var("FIX_AGENT_MAX_LINES", "20");
        let mut input = sample_input();
        input.classification = Some(Classification {
            error_type: ErrorType::Unknown,
            confidence: Confidence::Low,
            failing_tests: vec![],
            signals: vec![],
            summary: "x".to_string(),
        });
        input.fix_agent_instructions = Some(FixAgentInstructions {
            suspected_paths: vec!["tests/e2e/".to_string()],
            failing_tests: vec![],
            suspected_root_cause: String::new(),
            suggested_fix_direction: String::new(),
            key_log_snippets: KeyLogSnippets { playwright: String::new(), backend: String::new() },
        });

        let shell = ScriptedShell {
            numstat: "500\t10\ttests/e2e/a.spec.ts\n".to_string(),
            diff: "diff --git a b\n".to_string(),
        };
        let (patch, metadata) = run(&input, &PathBuf::from("."), &shell).await;
        std::env::remove_var("FIX_AGENT_MAX_LINES");

        assert!(patch.is_empty());
        assert!(metadata.needs_manual_review);
        assert_eq!(metadata.risk_assessment.level, crate::model::RiskLevel::Critical);
    }
}
