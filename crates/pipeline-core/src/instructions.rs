//! Fix-Agent instruction derivation (spec.md §4.2 "Instruction derivation").

use crate::model::{
    Classification, ErrorType, FixAgentInstructions, KeyLogSnippets, MAX_ROOT_CAUSE_LEN,
    MAX_SNIPPET_LEN,
};
use regex::Regex;
use std::sync::LazyLock;

/// Workflow files that orchestrate the pipeline; always appended to
/// `suspected_paths` regardless of error type.
const ORCHESTRATING_WORKFLOW_PATHS: &[&str] = &[".github/workflows/e2e.yml"];

static TRACEBACK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Traceback \(most recent call last\):").unwrap());
static FIVE_XX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)internal server error|\b5(0[0-9]|1[0-1])\b").unwrap()
});
static DB_ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)OperationalError|IntegrityError|no such table|relation .* does not exist").unwrap());
static PLAYWRIGHT_SIGNAL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error|timeout|navigation failed|strict mode violation").unwrap()
});

fn cap(s: String, max: usize) -> String {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

/// Seed `suspected_paths` from the error type, then append the
/// orchestrating workflow paths, deduplicating while preserving order.
#[must_use]
pub fn seed_suspected_paths(error_type: ErrorType) -> Vec<String> {
    let mut paths: Vec<String> = match error_type {
        ErrorType::FrontendSelector | ErrorType::FrontendTiming => vec![
            "tests/e2e/".to_string(),
            "playwright.config.ts".to_string(),
        ],
        ErrorType::Backend500
        | ErrorType::BackendMigration
        | ErrorType::BackendException
        | ErrorType::AuthSession => vec!["django/".to_string(), "praxi_backend/".to_string()],
        ErrorType::InfraNetwork | ErrorType::Unknown | ErrorType::MissingLogs => Vec::new(),
    };

    for p in ORCHESTRATING_WORKFLOW_PATHS {
        paths.push((*p).to_string());
    }

    dedup_preserve_order(paths)
}

fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

/// Pick the first error/timeout/navigation signal window from the
/// Playwright log.
#[must_use]
pub fn extract_playwright_snippet(log: &str) -> String {
    for (i, line) in log.lines().enumerate() {
        if PLAYWRIGHT_SIGNAL_LINE.is_match(line) {
            let window: Vec<&str> = log.lines().skip(i).take(40).collect();
            return cap(window.join("\n"), MAX_SNIPPET_LEN);
        }
    }
    cap(tail(log, MAX_SNIPPET_LEN), MAX_SNIPPET_LEN)
}

/// Prefer a traceback window, else a 5xx window, else a DB-error window,
/// else the last `MAX_SNIPPET_LEN` chars.
#[must_use]
pub fn extract_backend_snippet(log: &str) -> String {
    if let Some(window) = windowed_match(log, &TRACEBACK_LINE) {
        return cap(window, MAX_SNIPPET_LEN);
    }
    if let Some(window) = windowed_match(log, &FIVE_XX_LINE) {
        return cap(window, MAX_SNIPPET_LEN);
    }
    if let Some(window) = windowed_match(log, &DB_ERROR_LINE) {
        return cap(window, MAX_SNIPPET_LEN);
    }
    cap(tail(log, MAX_SNIPPET_LEN), MAX_SNIPPET_LEN)
}

fn windowed_match(log: &str, pattern: &Regex) -> Option<String> {
    let lines: Vec<&str> = log.lines().collect();
    let idx = lines.iter().position(|l| pattern.is_match(l))?;
    Some(lines[idx..(idx + 40).min(lines.len())].join("\n"))
}

fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let start = s.len() - max;
    let mut start = start;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

fn suggested_fix_direction(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::FrontendSelector => "Narrow the ambiguous Playwright locator with `.first()` or a more specific selector.",
        ErrorType::FrontendTiming => "Raise the Playwright test timeout or wait for the slow async UI explicitly.",
        ErrorType::Backend500 => "Fix the backend exception or misconfiguration producing the 5xx response.",
        ErrorType::BackendMigration => "Generate and apply the missing Django migration.",
        ErrorType::AuthSession => "Repair the session/CSRF handshake used by the failing flow.",
        ErrorType::InfraNetwork => "Add a readiness wait or retry around the flaky network call.",
        ErrorType::BackendException => "Fix the unhandled Python exception in the backend module.",
        ErrorType::MissingLogs => "Fix log capture/upload in the CI workflow before re-triaging.",
        ErrorType::Unknown => "No automated signature matched; manual triage is required.",
    }
}

/// Assemble the full [`FixAgentInstructions`] record for a classified run.
#[must_use]
pub fn derive_instructions(
    classification: &Classification,
    playwright_log: &str,
    backend_log: &str,
) -> FixAgentInstructions {
    let suspected_paths = seed_suspected_paths(classification.error_type);
    let suspected_root_cause = cap(classification.summary.clone(), MAX_ROOT_CAUSE_LEN);

    FixAgentInstructions {
        suspected_paths,
        failing_tests: classification.failing_tests.clone(),
        suspected_root_cause,
        suggested_fix_direction: suggested_fix_direction(classification.error_type).to_string(),
        key_log_snippets: KeyLogSnippets {
            playwright: extract_playwright_snippet(playwright_log),
            backend: extract_backend_snippet(backend_log),
        },
    }
}
