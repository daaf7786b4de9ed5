//! Deterministic, signal-based failure classifier (spec.md §4.2).
//!
//! First-match-wins over a fixed rule ordering. Every rule is a pure
//! function of the two raw log strings; nothing here touches the
//! filesystem or the network.

use crate::model::{Classification, Confidence, ErrorType, MAX_FAILING_TESTS};
use regex::Regex;
use std::sync::LazyLock;

static MIGRATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)django\.db\.migrations").unwrap(),
        Regex::new(r"(?i)no such table").unwrap(),
        Regex::new(r#"(?i)relation ".*" does not exist"#).unwrap(),
        Regex::new(r"(?i)you have \d+ unapplied migration").unwrap(),
        Regex::new(r"(?i)migration(s)? (is|are) not applied").unwrap(),
        Regex::new(r"(?i)InconsistentMigrationHistory").unwrap(),
    ]
});

static TRACEBACK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Traceback \(most recent call last\):").unwrap());

static FIVE_XX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)internal server error").unwrap(),
        Regex::new(r"\b5(0[0-9]|1[0-1])\b").unwrap(),
    ]
});

static AUTH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"\b401\b").unwrap(),
        Regex::new(r"\b403\b").unwrap(),
        Regex::new(r"(?i)csrf").unwrap(),
        Regex::new(r"(?i)forbidden").unwrap(),
        Regex::new(r"(?i)unauthorized").unwrap(),
        Regex::new(r"(?i)invalid credentials").unwrap(),
        Regex::new(r"(?i)login failed").unwrap(),
    ]
});

static NETWORK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"net::ERR_\w+").unwrap(),
        Regex::new(r"ECONN\w+").unwrap(),
        Regex::new(r"(?i)dns (lookup|resolution) failed").unwrap(),
        Regex::new(r"(?i)socket hang up").unwrap(),
        Regex::new(r"(?i)connection reset").unwrap(),
        Regex::new(r"ETIMEDOUT").unwrap(),
    ]
});

static SELECTOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)strict mode violation").unwrap(),
        Regex::new(r"(?i)locator\(").unwrap(),
        Regex::new(r"toHaveCount").unwrap(),
        Regex::new(r"toBeVisible").unwrap(),
    ]
});

static TIMING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)test timeout of \d+ms exceeded").unwrap(),
        Regex::new(r"(?i)timeout \d+ms exceeded").unwrap(),
        Regex::new(r"(?i)exceeded.*timeout").unwrap(),
    ]
});

static FAILING_TEST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\)\s+(.+?)\s*$").unwrap());

fn any_match(patterns: &[Regex], text: &str) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| p.is_match(text))
        .map(|p| p.as_str().to_string())
        .collect()
}

/// Classify a `(playwright_log, backend_log)` pair.
///
/// The rule ordering below is a contract (spec.md §4.2): the first rule
/// that matches wins, regardless of how many later rules would also
/// have matched.
#[must_use]
pub fn classify(playwright_log: &str, backend_log: &str) -> Classification {
    let failing_tests = extract_failing_tests(playwright_log);

    if playwright_log.trim().is_empty() && backend_log.trim().is_empty() {
        return Classification {
            error_type: ErrorType::MissingLogs,
            confidence: Confidence::Low,
            failing_tests,
            signals: vec!["empty-logs".to_string()],
            summary: "Both the Playwright and backend logs were empty.".to_string(),
        };
    }

    if !any_match(&MIGRATION_PATTERNS, backend_log).is_empty() {
        return Classification {
            error_type: ErrorType::BackendMigration,
            confidence: Confidence::High,
            failing_tests,
            signals: vec!["migration-signature".to_string()],
            summary: "Backend log shows a database migration/schema mismatch.".to_string(),
        };
    }

    if TRACEBACK_PATTERN.is_match(backend_log) {
        return Classification {
            error_type: ErrorType::BackendException,
            confidence: Confidence::High,
            failing_tests,
            signals: vec!["python-traceback".to_string()],
            summary: "Backend log contains an unhandled Python exception.".to_string(),
        };
    }

    if !any_match(&FIVE_XX_PATTERNS, backend_log).is_empty() {
        return Classification {
            error_type: ErrorType::Backend500,
            confidence: Confidence::Medium,
            failing_tests,
            signals: vec!["5xx-signature".to_string()],
            summary: "Backend log shows a 5xx server error.".to_string(),
        };
    }

    if !any_match(&AUTH_PATTERNS, playwright_log).is_empty()
        || !any_match(&AUTH_PATTERNS, backend_log).is_empty()
    {
        return Classification {
            error_type: ErrorType::AuthSession,
            confidence: Confidence::Medium,
            failing_tests,
            signals: vec!["auth-signature".to_string()],
            summary: "Logs show an authentication/session failure.".to_string(),
        };
    }

    if !any_match(&NETWORK_PATTERNS, playwright_log).is_empty()
        || !any_match(&NETWORK_PATTERNS, backend_log).is_empty()
    {
        return Classification {
            error_type: ErrorType::InfraNetwork,
            confidence: Confidence::Medium,
            failing_tests,
            signals: vec!["network-signature".to_string()],
            summary: "Logs show a network-level connection failure.".to_string(),
        };
    }

    if !any_match(&SELECTOR_PATTERNS, playwright_log).is_empty() {
        return Classification {
            error_type: ErrorType::FrontendSelector,
            confidence: Confidence::Medium,
            failing_tests,
            signals: vec!["selector-signature".to_string()],
            summary: "Playwright log shows a locator/selector failure.".to_string(),
        };
    }

    if !any_match(&TIMING_PATTERNS, playwright_log).is_empty() {
        return Classification {
            error_type: ErrorType::FrontendTiming,
            confidence: Confidence::Medium,
            failing_tests,
            signals: vec!["timeout-signature".to_string()],
            summary: "Playwright log shows a test timeout.".to_string(),
        };
    }

    Classification {
        error_type: ErrorType::Unknown,
        confidence: Confidence::Low,
        failing_tests,
        signals: vec!["no-known-signature".to_string()],
        summary: "No known failure signature was found in the logs.".to_string(),
    }
}

/// Extract failing test titles from `NN)  <title>` markers, preserving
/// first-occurrence order, deduplicated, capped at [`MAX_FAILING_TESTS`].
#[must_use]
pub fn extract_failing_tests(playwright_log: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for line in playwright_log.lines() {
        if let Some(caps) = FAILING_TEST_LINE.captures(line) {
            let title = caps[1].to_string();
            if seen.insert(title.clone()) {
                out.push(title);
                if out.len() >= MAX_FAILING_TESTS {
                    break;
                }
            }
        }
    }
    out
}
