//! Subprocess invocation for `git` and the Playwright CLI.
//!
//! Isolated behind [`Shell`] so the driver's guardrail/risk logic can be
//! exercised without a real working tree; the field shapes returned here
//! (`code`, `stdout`, `stderr`) are what the metadata record persists.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// The result of a single subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// The subset of shell operations the Fix-Agent needs.
#[async_trait]
pub trait Shell: Send + Sync {
    async fn git_diff(&self, repo_dir: &Path) -> anyhow::Result<CommandOutput>;
    async fn git_diff_numstat(&self, repo_dir: &Path) -> anyhow::Result<CommandOutput>;
    async fn git_checkout(&self, repo_dir: &Path, paths: &[String]) -> anyhow::Result<CommandOutput>;
    async fn playwright_test(&self, repo_dir: &Path, specs: &[String]) -> anyhow::Result<CommandOutput>;
}

/// Real shell: runs actual subprocesses in `repo_dir`.
pub struct RealShell;

#[async_trait]
impl Shell for RealShell {
    async fn git_diff(&self, repo_dir: &Path) -> anyhow::Result<CommandOutput> {
        run("git", &["diff", "HEAD"], repo_dir).await
    }

    async fn git_diff_numstat(&self, repo_dir: &Path) -> anyhow::Result<CommandOutput> {
        run("git", &["diff", "--numstat", "HEAD"], repo_dir).await
    }

    async fn git_checkout(&self, repo_dir: &Path, paths: &[String]) -> anyhow::Result<CommandOutput> {
        let mut args = vec!["checkout".to_string(), "--".to_string()];
        args.extend(paths.iter().cloned());
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        run("git", &args_ref, repo_dir).await
    }

    async fn playwright_test(&self, repo_dir: &Path, specs: &[String]) -> anyhow::Result<CommandOutput> {
        let mut args = vec!["playwright".to_string(), "test".to_string()];
        args.extend(specs.iter().cloned());
        args.push("--max-failures=1".to_string());
        args.push("--workers=1".to_string());
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        run("npx", &args_ref, repo_dir).await
    }
}

async fn run(program: &str, args: &[&str], repo_dir: &Path) -> anyhow::Result<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .current_dir(repo_dir)
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("failed to spawn `{program}`: {e}"))?;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
