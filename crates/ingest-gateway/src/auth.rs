//! Bearer token extraction and constant-time comparison.
//!
//! Grounded in the HMAC webhook verification pattern used across the
//! monorepo's integration services, which reach for `subtle` for the
//! same reason: a naive `==` leaks timing information about how many
//! leading bytes matched.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Extract the bearer token from an `Authorization` header, if present.
#[must_use]
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

/// Compare two secrets in constant time.
#[must_use]
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret123"));
        assert_eq!(extract_bearer(&headers).as_deref(), Some("secret123"));
    }

    #[test]
    fn missing_header_returns_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn constant_time_compare_matches_and_mismatches() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
    }
}
