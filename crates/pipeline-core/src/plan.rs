//! Self-heal plan derivation (spec.md §4.2 "Plan derivation").

use crate::model::{ErrorType, SelfHealPlan};

const FULL_PLAYWRIGHT_RERUN: &str = "Re-run the full Playwright suite";

/// Build the human-readable remediation plan for an [`ErrorType`].
#[must_use]
pub fn derive_plan(error_type: ErrorType) -> SelfHealPlan {
    let mut tests_to_rerun = vec![FULL_PLAYWRIGHT_RERUN.to_string()];

    let (what_to_inspect, what_to_change): (Vec<String>, Vec<String>) = match error_type {
        ErrorType::FrontendSelector => (
            vec![
                "Playwright locator expressions in the failing spec files".to_string(),
                "Recent DOM/markup changes to the affected pages".to_string(),
            ],
            vec![
                "Narrow ambiguous locators (add `.first()`, role selectors, or test ids)"
                    .to_string(),
            ],
        ),
        ErrorType::FrontendTiming => (
            vec![
                "Slow network calls or animations in the affected pages".to_string(),
                "Playwright default test/navigation timeouts".to_string(),
            ],
            vec!["Increase `test.setTimeout` or add explicit waits for async UI".to_string()],
        ),
        ErrorType::Backend500 => {
            tests_to_rerun.push("Re-run the failing backend endpoint's integration tests".to_string());
            (
                vec![
                    "Backend stack trace and the endpoint that returned a 5xx".to_string(),
                    "Recent backend deploys or config changes".to_string(),
                ],
                vec!["Fix the backend exception or misconfiguration causing the 5xx".to_string()],
            )
        }
        ErrorType::BackendMigration => {
            tests_to_rerun.push("Run pending Django migrations".to_string());
            (
                vec![
                    "Unapplied or conflicting Django migrations".to_string(),
                    "Model/schema drift against the test database".to_string(),
                ],
                vec!["Generate and apply the missing migration".to_string()],
            )
        }
        ErrorType::AuthSession => {
            tests_to_rerun.push("Run the authentication/session validator".to_string());
            (
                vec![
                    "Session/cookie handling and CSRF token plumbing".to_string(),
                    "Test fixtures' credentials and login flow".to_string(),
                ],
                vec!["Repair the auth/session handshake used by the failing flow".to_string()],
            )
        }
        ErrorType::BackendException => {
            tests_to_rerun.push("Re-run the backend unit tests for the failing module".to_string());
            (
                vec!["The Python traceback and the module it originates from".to_string()],
                vec!["Fix the unhandled exception raised by the backend".to_string()],
            )
        }
        ErrorType::InfraNetwork => (
            vec![
                "CI runner network/DNS health and service readiness checks".to_string(),
                "Whether the backend service was up when Playwright connected".to_string(),
            ],
            vec!["Add a readiness wait or retry around the flaky network call".to_string()],
        ),
        ErrorType::MissingLogs => (
            vec!["Why the CI job produced empty logs".to_string()],
            vec!["Fix log capture/upload in the workflow before re-triaging".to_string()],
        ),
        ErrorType::Unknown => (
            vec!["Full Playwright and backend logs for an unrecognized signature".to_string()],
            vec!["Manual triage required; no automated signature matched".to_string()],
        ),
    };

    SelfHealPlan {
        what_to_inspect,
        what_to_change,
        tests_to_rerun,
    }
}
