//! Downstream dispatch of self-heal/fix-agent triggers (spec.md §4.2).
//!
//! Modeled as a pluggable interface so the reference persist-only behavior
//! can later be swapped for a queue publish or webhook fire without
//! touching the handler.

use pipeline_core::model::{FixAgentDispatch, SelfHealDispatch, Triggers};
use std::io;

/// A sink for the two dispatch payloads produced on a failed run.
pub trait Dispatcher {
    /// Called exactly once per failed run, in this order relative to the
    /// caller's own bookkeeping: after `analysis.json` has been written.
    ///
    /// # Errors
    /// Returns an error if either payload could not be persisted.
    fn dispatch(
        &self,
        self_heal: &SelfHealDispatch,
        fix_agent: &FixAgentDispatch,
        triggers: &Triggers,
    ) -> io::Result<()>;
}

/// Reference dispatcher: writes the three payloads to the run directory and
/// does nothing else (no queue publish, no webhook).
pub struct FsDispatcher<'a> {
    pub run_store: &'a pipeline_core::artifact_store::RunStore,
}

impl Dispatcher for FsDispatcher<'_> {
    fn dispatch(
        &self,
        self_heal: &SelfHealDispatch,
        fix_agent: &FixAgentDispatch,
        triggers: &Triggers,
    ) -> io::Result<()> {
        let self_heal_json = serde_json::to_string_pretty(self_heal)?;
        self.run_store.write_atomic("self-heal.json", &self_heal_json)?;

        let fix_agent_json = serde_json::to_string_pretty(fix_agent)?;
        self.run_store.write_atomic("fix-agent.json", &fix_agent_json)?;

        let triggers_json = serde_json::to_string_pretty(triggers)?;
        self.run_store.write_atomic("triggers.json", &triggers_json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::artifact_store::RunStore;
    use pipeline_core::model::{
        Classification, Confidence, DispatchArtifactPaths, ErrorType, FixAgentInstructions,
        KeyLogSnippets, RunMetadata, SelfHealPlan,
    };
    use std::path::PathBuf;

    fn sample_classification() -> Classification {
        Classification {
            error_type: ErrorType::Unknown,
            confidence: Confidence::Low,
            failing_tests: vec![],
            signals: vec![],
            summary: "unknown failure".to_string(),
        }
    }

    #[test]
    fn fs_dispatcher_writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let run_store = RunStore::new(dir.path(), "run-1").unwrap();
        let dispatcher = FsDispatcher { run_store: &run_store };

        let run = RunMetadata {
            run_id: "run-1".to_string(),
            job_name: "e2e".to_string(),
            branch: "main".to_string(),
            commit: "abc".to_string(),
            status: "failed".to_string(),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        };
        let storage = DispatchArtifactPaths {
            playwright_log_path: PathBuf::from("playwright.log"),
            backend_log_path: PathBuf::from("backend.log"),
            analysis_path: PathBuf::from("analysis.json"),
        };
        let self_heal = SelfHealDispatch {
            run: run.clone(),
            classification: sample_classification(),
            self_heal_plan: SelfHealPlan {
                what_to_inspect: vec![],
                what_to_change: vec![],
                tests_to_rerun: vec![],
            },
            storage: storage.clone(),
        };
        let fix_agent = FixAgentDispatch {
            run,
            classification: sample_classification(),
            fix_agent_instructions: FixAgentInstructions {
                suspected_paths: vec![],
                failing_tests: vec![],
                suspected_root_cause: String::new(),
                suggested_fix_direction: String::new(),
                key_log_snippets: KeyLogSnippets {
                    playwright: String::new(),
                    backend: String::new(),
                },
            },
            storage,
        };
        let triggers = Triggers {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            self_heal_dispatched: true,
            fix_agent_dispatched: true,
        };

        dispatcher.dispatch(&self_heal, &fix_agent, &triggers).unwrap();

        assert!(run_store.path("self-heal.json").exists());
        assert!(run_store.path("fix-agent.json").exists());
        assert!(run_store.path("triggers.json").exists());
    }
}
