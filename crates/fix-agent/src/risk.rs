//! Risk Assessor: a pure function from (error_type, changed files, diff
//! stats, validation) to a [`RiskAssessment`] (spec.md §4.4).

use crate::model::{DiffStats, RiskAssessment, RiskLevel, ValidationRecord};
use pipeline_core::model::ErrorType;

fn error_type_delta(error_type: ErrorType) -> i64 {
    match error_type {
        ErrorType::FrontendSelector => 1,
        ErrorType::FrontendTiming => 2,
        _ => 5,
    }
}

const CONFIG_EXTENSIONS: &[&str] = &[".json", ".yaml", ".yml"];

/// Classify the scope of a changed-file set, returning a label and its
/// scoring delta. Configuration/workflow changes dominate; an empty set
/// (no files touched) is treated as the safest, test-only scope.
fn classify_scope(changed_files: &[String]) -> (&'static str, i64) {
    let touches_config_or_workflow = changed_files.iter().any(|f| {
        f.starts_with(".github/") || CONFIG_EXTENSIONS.iter().any(|ext| f.ends_with(ext))
    });
    if touches_config_or_workflow {
        return ("infrastructure", 10);
    }

    if changed_files.is_empty() || changed_files.iter().all(|f| f.starts_with("tests/")) {
        return ("test-only", 0);
    }

    if changed_files
        .iter()
        .all(|f| f.starts_with("django/") || f.starts_with("praxi_backend/"))
    {
        return ("backend", 3);
    }

    ("infrastructure", 10)
}

fn size_delta(files_changed: usize, lines_total: usize) -> i64 {
    if files_changed == 0 {
        0
    } else if files_changed <= 2 && lines_total <= 50 {
        1
    } else if files_changed <= 4 && lines_total <= 150 {
        2
    } else {
        5
    }
}

fn validation_delta(validation: &ValidationRecord) -> i64 {
    if !validation.attempted {
        0
    } else if validation.ok {
        -2
    } else {
        3
    }
}

fn level_for_score(score: i64) -> RiskLevel {
    if score <= 2 {
        RiskLevel::Low
    } else if score <= 5 {
        RiskLevel::Medium
    } else if score <= 10 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Score a completed (or empty) change against the fixed factor table.
#[must_use]
pub fn assess(
    error_type: ErrorType,
    changed_files: &[String],
    diff_stats: &DiffStats,
    validation: &ValidationRecord,
) -> RiskAssessment {
    let et_delta = error_type_delta(error_type);
    let (scope_label, scope_delta) = classify_scope(changed_files);
    let sz_delta = size_delta(diff_stats.files_changed, diff_stats.lines_total);
    let val_delta = validation_delta(validation);

    let score = et_delta + scope_delta + sz_delta + val_delta;
    let level = level_for_score(score);

    let validation_label = if !validation.attempted {
        "not-attempted"
    } else if validation.ok {
        "ok"
    } else {
        "failed"
    };

    let auto_merge_eligible = level == RiskLevel::Low
        && scope_label == "test-only"
        && diff_stats.files_changed <= 3
        && diff_stats.lines_total <= 100
        && (validation.ok || !validation.attempted);

    let factors = vec![
        format!("error_type:{}:{:+}", error_type.token(), et_delta),
        format!("scope:{scope_label}:{scope_delta:+}"),
        format!(
            "size:files={}:lines={}:{:+}",
            diff_stats.files_changed, diff_stats.lines_total, sz_delta
        ),
        format!("validation:{validation_label}:{val_delta:+}"),
        format!("auto_merge_eligible:{auto_merge_eligible}"),
    ];

    RiskAssessment {
        level,
        score,
        factors,
        auto_merge_eligible,
    }
}

/// A critical-risk assessment used whenever a guardrail fires or the input
/// lacked a usable classification.
#[must_use]
pub fn critical(reason: &str) -> RiskAssessment {
    RiskAssessment {
        level: RiskLevel::Critical,
        score: i64::from(u16::MAX),
        factors: vec![reason.to_string()],
        auto_merge_eligible: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_validation() -> ValidationRecord {
        ValidationRecord {
            attempted: true,
            command: Some("npx playwright test".to_string()),
            exit_code: Some(0),
            ok: true,
        }
    }

    #[test]
    fn low_risk_eligible_example() {
        let stats = DiffStats {
            files_changed: 1,
            lines_added: 4,
            lines_deleted: 0,
            lines_total: 4,
        };
        let assessment = assess(
            ErrorType::FrontendSelector,
            &["tests/e2e/x.spec.ts".to_string()],
            &stats,
            &ok_validation(),
        );
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 0);
        assert!(assessment.auto_merge_eligible);
    }

    #[test]
    fn scope_monotonicity_infra_never_scores_lower_than_test_only() {
        let stats = DiffStats {
            files_changed: 1,
            lines_added: 4,
            lines_deleted: 0,
            lines_total: 4,
        };
        let validation = ValidationRecord::not_attempted();
        let test_only = assess(
            ErrorType::FrontendTiming,
            &["tests/e2e/x.spec.ts".to_string()],
            &stats,
            &validation,
        );
        let infra = assess(
            ErrorType::FrontendTiming,
            &[".github/workflows/e2e.yml".to_string()],
            &stats,
            &validation,
        );
        assert!(infra.score >= test_only.score);
    }

    #[test]
    fn failed_validation_never_decreases_score_relative_to_ok() {
        let stats = DiffStats {
            files_changed: 1,
            lines_added: 4,
            lines_deleted: 0,
            lines_total: 4,
        };
        let files = vec!["tests/e2e/x.spec.ts".to_string()];
        let ok = assess(ErrorType::FrontendSelector, &files, &stats, &ok_validation());
        let failed_validation = ValidationRecord {
            attempted: true,
            command: Some("npx playwright test".to_string()),
            exit_code: Some(1),
            ok: false,
        };
        let failed = assess(ErrorType::FrontendSelector, &files, &stats, &failed_validation);
        assert!(failed.score > ok.score);
        assert!(!failed.auto_merge_eligible);
    }
}
