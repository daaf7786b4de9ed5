//! Optional Playwright subset rerun (spec.md §4.3 "Optional validation").

use crate::git::Shell;
use crate::model::ValidationRecord;
use pipeline_core::model::ErrorType;
use std::path::Path;

/// Run the Playwright subset only when changes were made, spec paths
/// exist, and `error_type` is one the transform actually touches UI/test
/// timing for.
pub async fn maybe_validate(
    shell: &dyn Shell,
    repo_dir: &Path,
    error_type: ErrorType,
    changed_files: &[String],
    spec_paths: &[String],
) -> ValidationRecord {
    let applicable = matches!(error_type, ErrorType::FrontendTiming | ErrorType::FrontendSelector);
    if changed_files.is_empty() || spec_paths.is_empty() || !applicable {
        return ValidationRecord::not_attempted();
    }

    let command = format!(
        "npx playwright test {} --max-failures=1 --workers=1",
        spec_paths.join(" ")
    );

    match shell.playwright_test(repo_dir, spec_paths).await {
        Ok(output) => ValidationRecord {
            attempted: true,
            command: Some(command),
            exit_code: Some(output.code),
            ok: output.success(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "playwright validation subprocess failed to run");
            ValidationRecord {
                attempted: true,
                command: Some(command),
                exit_code: None,
                ok: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::CommandOutput;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct FakeShell {
        result: Mutex<Option<CommandOutput>>,
    }

    #[async_trait]
    impl Shell for FakeShell {
        async fn git_diff(&self, _repo_dir: &Path) -> anyhow::Result<CommandOutput> {
            unreachable!()
        }
        async fn git_diff_numstat(&self, _repo_dir: &Path) -> anyhow::Result<CommandOutput> {
            unreachable!()
        }
        async fn git_checkout(&self, _repo_dir: &Path, _paths: &[String]) -> anyhow::Result<CommandOutput> {
            unreachable!()
        }
        async fn playwright_test(&self, _repo_dir: &Path, _specs: &[String]) -> anyhow::Result<CommandOutput> {
            Ok(self.result.lock().unwrap().take().unwrap())
        }
    }

    #[tokio::test]
    async fn skipped_when_no_changed_files() {
        let shell = FakeShell { result: Mutex::new(None) };
        let record = maybe_validate(
            &shell,
            &PathBuf::from("."),
            ErrorType::FrontendTiming,
            &[],
            &["tests/e2e/a.spec.ts".to_string()],
        )
        .await;
        assert!(!record.attempted);
    }

    #[tokio::test]
    async fn skipped_for_non_applicable_error_type() {
        let shell = FakeShell { result: Mutex::new(None) };
        let record = maybe_validate(
            &shell,
            &PathBuf::from("."),
            ErrorType::Backend500,
            &["tests/e2e/a.spec.ts".to_string()],
            &["tests/e2e/a.spec.ts".to_string()],
        )
        .await;
        assert!(!record.attempted);
    }

    #[tokio::test]
    async fn runs_and_records_exit_code() {
        let shell = FakeShell {
            result: Mutex::new(Some(CommandOutput {
                code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })),
        };
        let record = maybe_validate(
            &shell,
            &PathBuf::from("."),
            ErrorType::FrontendSelector,
            &["tests/e2e/a.spec.ts".to_string()],
            &["tests/e2e/a.spec.ts".to_string()],
        )
        .await;
        assert!(record.attempted);
        assert!(record.ok);
        assert_eq!(record.exit_code, Some(0));
    }
}
