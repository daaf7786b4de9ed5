//! Fix-Agent binary entry point: three CLI stages sharing one process.

mod driver;
mod git;
mod input;
mod model;
mod patch_engine;
mod pr;
mod risk;
mod validation;

use clap::{Parser, Subcommand};
use git::RealShell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fix-agent")]
#[command(about = "Applies narrowly-scoped code transforms under guardrails and emits a reviewable patch")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a FixAgentInput from the run context and an upstream classification.
    PrepareInput {
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Apply the patch engine, run optional validation, and write patch + metadata.
    ApplyAndValidate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Decide whether a completed patch is eligible for automated PR staging.
    CreatePr {
        #[arg(long)]
        metadata: PathBuf,
        #[arg(long)]
        patch: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PrepareInput { out_dir, out } => {
            std::fs::create_dir_all(&out_dir)?;
            let fix_input = input::prepare_input().await;
            let json = serde_json::to_string_pretty(&fix_input)?;
            let out_path = if out.is_absolute() { out } else { out_dir.join(out) };
            std::fs::write(&out_path, json)?;
            tracing::info!(path = %out_path.display(), "wrote fix-agent input");
        }
        Commands::ApplyAndValidate { input: input_path, out_dir } => {
            let raw = std::fs::read_to_string(&input_path)?;
            let fix_input: model::FixAgentInput = serde_json::from_str(&raw)?;
            std::fs::create_dir_all(&out_dir)?;

            let repo_dir = std::env::current_dir()?;
            let shell = RealShell;
            let (patch_text, metadata) = driver::run(&fix_input, &repo_dir, &shell).await;

            let patch_path = out_dir.join(format!("patch-{}.diff", metadata.run_id));
            let metadata_path = out_dir.join(format!("metadata-{}.json", metadata.run_id));
            std::fs::write(&patch_path, &patch_text)?;
            std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;
            tracing::info!(
                patch = %patch_path.display(),
                metadata = %metadata_path.display(),
                needs_manual_review = metadata.needs_manual_review,
                "fix-agent driver completed"
            );
        }
        Commands::CreatePr { metadata, patch, dry_run } => {
            pr::run_create_pr(&metadata, &patch, dry_run)?;
        }
    }

    Ok(())
}
