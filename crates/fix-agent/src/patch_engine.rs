//! Patch Engine: conservative, file-scoped text transforms selected by
//! `error_type` (spec.md §4.3 "Patch Engine transforms").

use pipeline_core::model::ErrorType;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::{fs, io};

static STRICT_MODE_LOCATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)strict mode violation.*?locator\((?:"(.*?)"|'(.*?)')\)"#).unwrap()
});

/// Candidate files for editing: the union of extracted spec paths and
/// `suspected_paths`, filtered to the `tests/`/`django/` allowlist and
/// capped at `max_files`.
#[must_use]
pub fn select_candidate_files(
    extracted_spec_paths: &[String],
    suspected_paths: &[String],
    max_files: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for path in extracted_spec_paths.iter().chain(suspected_paths.iter()) {
        if !(path.starts_with("tests/") || path.starts_with("django/")) {
            continue;
        }
        if seen.insert(path.clone()) {
            out.push(path.clone());
        }
        if out.len() >= max_files {
            break;
        }
    }
    out
}

/// Extract strict-mode-violation locator selectors from a Playwright
/// snippet, deduplicated and order-preserving.
#[must_use]
pub fn extract_strict_mode_selectors(snippet: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    STRICT_MODE_LOCATOR
        .captures_iter(snippet)
        .map(|c| c.get(1).or_else(|| c.get(2)).unwrap().as_str().to_string())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// `frontend-timing`: insert `test.setTimeout(60000)` after the leading
/// import/blank-line block of every candidate file that imports the
/// Playwright test framework and does not already set a timeout.
///
/// # Errors
/// Returns an error if a candidate file cannot be rewritten.
pub fn apply_frontend_timing(repo_dir: &Path, candidates: &[String]) -> io::Result<Vec<String>> {
    let mut changed = Vec::new();
    for rel in candidates {
        let path = repo_dir.join(rel);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        if !content.contains("@playwright/test") || content.contains("test.setTimeout") {
            continue;
        }
        let updated = insert_after_leading_block(&content, "test.setTimeout(60000);\n");
        fs::write(&path, updated)?;
        changed.push(rel.clone());
    }
    Ok(changed)
}

fn insert_after_leading_block(content: &str, insertion: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut idx = 0;
    while idx < lines.len() {
        let trimmed = lines[idx].trim_start();
        if trimmed.starts_with("import ") || trimmed.is_empty() {
            idx += 1;
        } else {
            break;
        }
    }

    let mut out = String::new();
    for line in &lines[..idx] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(insertion);
    for line in &lines[idx..] {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// `frontend-selector`: replace exact-match `page.locator('<sel>')`
/// expressions (both quote styles) with a `.first()`-suffixed version,
/// guarded against double-application. Stops after the first file that
/// changes.
///
/// # Errors
/// Returns an error if a changed file cannot be rewritten.
pub fn apply_frontend_selector(
    repo_dir: &Path,
    candidates: &[String],
    selectors: &[String],
) -> io::Result<Vec<String>> {
    for rel in candidates {
        let path = repo_dir.join(rel);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };

        let mut updated = content.clone();
        let mut file_changed = false;
        for selector in selectors {
            for quote in ['\'', '"'] {
                let needle = format!("page.locator({quote}{selector}{quote})");
                let replacement = format!("page.locator({quote}{selector}{quote}).first()");
                let (next, changed) = replace_guarded(&updated, &needle, &replacement);
                updated = next;
                file_changed |= changed;
            }
        }

        if file_changed {
            fs::write(&path, updated)?;
            return Ok(vec![rel.clone()]);
        }
    }
    Ok(Vec::new())
}

/// Replace every occurrence of `needle` with `replacement`, unless it is
/// already immediately followed by `.first()`.
fn replace_guarded(content: &str, needle: &str, replacement: &str) -> (String, bool) {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    let mut changed = false;
    while let Some(pos) = rest.find(needle) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + needle.len()..];
        if after.starts_with(".first()") {
            out.push_str(needle);
        } else {
            out.push_str(replacement);
            changed = true;
        }
        rest = after;
    }
    out.push_str(rest);
    (out, changed)
}

/// Run the transform selected by `error_type`. Other error types make no
/// edits, per the engine's conservative design.
///
/// # Errors
/// Returns an error if a file write fails.
pub fn apply(
    error_type: ErrorType,
    repo_dir: &Path,
    candidates: &[String],
    playwright_snippet: &str,
) -> io::Result<Vec<String>> {
    match error_type {
        ErrorType::FrontendTiming => apply_frontend_timing(repo_dir, candidates),
        ErrorType::FrontendSelector => {
            let selectors = extract_strict_mode_selectors(playwright_snippet);
            if selectors.is_empty() {
                Ok(Vec::new())
            } else {
                apply_frontend_selector(repo_dir, candidates, &selectors)
            }
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_selection_filters_allowlist_and_caps() {
        let extracted = vec!["tests/e2e/a.spec.ts".to_string(), "node_modules/x.ts".to_string()];
        let suspected = vec!["django/views.py".to_string(), "playwright.config.ts".to_string()];
        let out = select_candidate_files(&extracted, &suspected, 4);
        assert_eq!(out, vec!["tests/e2e/a.spec.ts".to_string(), "django/views.py".to_string()]);
    }

    #[test]
    fn candidate_selection_respects_max_files() {
        let extracted: Vec<String> = (0..10).map(|i| format!("tests/e2e/{i}.spec.ts")).collect();
        let out = select_candidate_files(&extracted, &[], 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn extracts_strict_mode_selector() {
        let snippet = "Error: strict mode violation: locator('button.submit') resolved to 2 elements";
        let selectors = extract_strict_mode_selectors(snippet);
        assert_eq!(selectors, vec!["button.submit".to_string()]);
    }

    #[test]
    fn timing_transform_inserts_after_imports() {
        let dir = tempfile::tempdir().unwrap();
        let rel = "tests/e2e/x.spec.ts";
        let full = dir.path().join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, "import { test } from '@playwright/test';\n\ntest('x', async () => {});\n").unwrap();

        let changed = apply_frontend_timing(dir.path(), &[rel.to_string()]).unwrap();
        assert_eq!(changed, vec![rel.to_string()]);
        let contents = fs::read_to_string(&full).unwrap();
        assert!(contents.contains("test.setTimeout(60000);"));
        assert!(contents.find("test.setTimeout").unwrap() < contents.find("test('x'").unwrap());
    }

    #[test]
    fn timing_transform_skips_files_with_existing_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let rel = "tests/e2e/x.spec.ts";
        let full = dir.path().join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        let original = "import { test } from '@playwright/test';\ntest.setTimeout(30000);\n";
        fs::write(&full, original).unwrap();

        let changed = apply_frontend_timing(dir.path(), &[rel.to_string()]).unwrap();
        assert!(changed.is_empty());
        assert_eq!(fs::read_to_string(&full).unwrap(), original);
    }

    #[test]
    fn selector_transform_guards_double_application() {
        let dir = tempfile::tempdir().unwrap();
        let rel = "tests/e2e/x.spec.ts";
        let full = dir.path().join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, "await page.locator('button.submit').click();\n").unwrap();

        let selectors = vec!["button.submit".to_string()];
        let changed = apply_frontend_selector(dir.path(), &[rel.to_string()], &selectors).unwrap();
        assert_eq!(changed, vec![rel.to_string()]);
        let once = fs::read_to_string(&full).unwrap();
        assert!(once.contains("page.locator('button.submit').first()"));

        let changed_again = apply_frontend_selector(dir.path(), &[rel.to_string()], &selectors).unwrap();
        assert!(changed_again.is_empty());
        assert_eq!(fs::read_to_string(&full).unwrap(), once);
    }

    #[test]
    fn selector_transform_stops_after_first_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let rel_a = "tests/e2e/a.spec.ts";
        let rel_b = "tests/e2e/b.spec.ts";
        for rel in [rel_a, rel_b] {
            let full = dir.path().join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, "await page.locator('button.submit').click();\n").unwrap();
        }

        let selectors = vec!["button.submit".to_string()];
        let changed = apply_frontend_selector(
            dir.path(),
            &[rel_a.to_string(), rel_b.to_string()],
            &selectors,
        )
        .unwrap();
        assert_eq!(changed, vec![rel_a.to_string()]);
        assert!(!fs::read_to_string(dir.path().join(rel_b)).unwrap().contains(".first()"));
    }
}
