//! Filesystem-backed artifact store (spec.md §4.5, §6 "Persisted state layout").

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum retained tail of a normalized log, in bytes.
pub const MAX_LOG_BYTES: usize = 512 * 1024;

/// Maximum length of a normalized `run_id`.
pub const MAX_RUN_ID_LEN: usize = 128;

/// Candidate roots tried, in order, when resolving where to store logs.
const CANDIDATE_ROOTS: &[&str] = &["/logs", "logs", "/tmp/logs"];

/// Normalize a raw `run_id` into a filesystem-safe token: only
/// `[A-Za-z0-9._-]`, truncated to [`MAX_RUN_ID_LEN`]; an empty result
/// becomes `"unknown"`.
#[must_use]
pub fn normalize_run_id(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let truncated = truncate_chars(&filtered, MAX_RUN_ID_LEN);
    if truncated.is_empty() {
        "unknown".to_string()
    } else {
        truncated
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Convert CRLF to LF and keep only the last [`MAX_LOG_BYTES`] bytes,
/// never splitting a UTF-8 multi-byte sequence.
#[must_use]
pub fn normalize_log(raw: &str) -> String {
    let lf = raw.replace("\r\n", "\n");
    if lf.len() <= MAX_LOG_BYTES {
        return lf;
    }
    let mut start = lf.len() - MAX_LOG_BYTES;
    while start < lf.len() && !lf.is_char_boundary(start) {
        start += 1;
    }
    lf[start..].to_string()
}

/// Resolve the first writable logs root out of `/logs`, `./logs`,
/// `/tmp/logs`, creating it (and its parents) if needed.
///
/// # Errors
/// Returns an error if none of the candidate roots can be created.
pub fn resolve_logs_root() -> io::Result<PathBuf> {
    let mut last_err = None;
    for candidate in CANDIDATE_ROOTS {
        let path = PathBuf::from(candidate);
        match fs::create_dir_all(&path) {
            Ok(()) => return Ok(path),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("no candidate logs root succeeded")))
}

/// A per-run artifact directory under a resolved logs root.
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    /// Build a store rooted at `logs_root/normalize_run_id(run_id)`,
    /// creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the run directory cannot be created.
    pub fn new(logs_root: &Path, run_id: &str) -> io::Result<Self> {
        let run_dir = logs_root.join(normalize_run_id(run_id));
        fs::create_dir_all(&run_dir)?;
        Ok(Self { root: run_dir })
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Write `contents` to `name` atomically: write to a sibling temp
    /// file, then rename over the target. A concurrent reader observes
    /// either the previous file or the complete new one.
    ///
    /// # Errors
    /// Returns an error if the temp file cannot be written or renamed.
    pub fn write_atomic(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let target = self.path(name);
        let tmp = self.root.join(format!(".{name}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_run_id_charset() {
        assert_eq!(normalize_run_id("abc/123 def"), "abc123def");
        assert_eq!(normalize_run_id(""), "unknown");
        assert_eq!(normalize_run_id("!!!"), "unknown");
    }

    #[test]
    fn truncates_run_id_length() {
        let long = "a".repeat(500);
        let norm = normalize_run_id(&long);
        assert_eq!(norm.len(), MAX_RUN_ID_LEN);
    }

    #[test]
    fn crlf_converted_to_lf() {
        let out = normalize_log("a\r\nb\r\n");
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn truncation_preserves_utf8_boundary() {
        let mut raw = String::new();
        // Pad with ascii then finish with a multi-byte char straddling the
        // truncation boundary to exercise the rewind logic.
        raw.push_str(&"x".repeat(MAX_LOG_BYTES - 1));
        raw.push('é'); // 2-byte UTF-8 char
        raw.push_str(&"y".repeat(10));
        let out = normalize_log(&raw);
        assert!(out.len() <= MAX_LOG_BYTES);
        assert!(std::str::from_utf8(out.as_bytes()).is_ok());
    }

    #[test]
    fn atomic_write_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStore::new(dir.path(), "run-1").unwrap();
        let path = store.write_atomic("foo.txt", "hello").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}
