//! Forwarding the validated bundle to the Log Processor (spec.md §4.1).

use crate::error::AppError;
use pipeline_core::model::LogBundle;
use std::time::Duration;

/// Hard cap on the total time spent on the forward, per spec.md §5.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the `/process-logs` URL from a configured upstream base/full URL.
///
/// If the configured value already ends with `/process-logs`, it is used
/// as-is; otherwise a trailing slash is stripped and `/process-logs` is
/// appended. Query parameters, if any, are treated as opaque (spec.md §9
/// open question) and left where they are, which only matters for the
/// already-ends-with-`/process-logs` case.
#[must_use]
pub fn build_upstream_url(configured: &str) -> String {
    if configured.ends_with("/process-logs") {
        return configured.to_string();
    }
    let trimmed = configured.trim_end_matches('/');
    format!("{trimmed}/process-logs")
}

/// Forward the bundle upstream with a hard timeout, returning the
/// upstream's parsed JSON body on 2xx.
///
/// # Errors
/// Returns [`AppError::UpstreamFailed`] on timeout, transport failure, or
/// a non-2xx upstream response.
pub async fn forward_bundle(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    bundle: &LogBundle,
) -> Result<serde_json::Value, AppError> {
    let request = client
        .post(url)
        .bearer_auth(token)
        .json(bundle)
        .timeout(FORWARD_TIMEOUT);

    let response = match tokio::time::timeout(FORWARD_TIMEOUT, request.send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            return Err(AppError::UpstreamFailed {
                status: None,
                body: None,
                message: Some(format!("transport error: {e}")),
            })
        }
        Err(_) => {
            return Err(AppError::UpstreamFailed {
                status: None,
                body: None,
                message: Some("upstream request timed out after 15s".to_string()),
            })
        }
    };

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(AppError::UpstreamFailed {
            status: Some(status.as_u16()),
            body: Some(text),
            message: None,
        });
    }

    Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::Null))
}
