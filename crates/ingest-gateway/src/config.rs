//! Environment-sourced configuration (spec.md §6 "Environment variables").

use anyhow::{Context, Result};

/// Ingest Gateway configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer secret callers must present. `None` means "not configured",
    /// which the handler turns into a 500 on every request rather than a
    /// silent pass-through.
    pub agent_token: Option<String>,
    /// Base URL (or full `/process-logs` URL) of the Log Processor.
    pub developer_agent_url: Option<String>,
    /// Bearer secret sent to the Log Processor.
    pub developer_agent_token: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `AGENT_TOKEN`, `DEVELOPER_AGENT_URL` and `DEVELOPER_AGENT_TOKEN` are
    /// required for the gateway to do anything useful; their absence is a
    /// startup error rather than a silent pass-through, per the ambient
    /// configuration policy (spec.md §9). `BIND_ADDR` is optional.
    ///
    /// # Errors
    /// Returns an error if a required variable is set but not valid UTF-8.
    pub fn from_env() -> Result<Self> {
        let agent_token = optional_var("AGENT_TOKEN").context("reading AGENT_TOKEN")?;
        let developer_agent_url =
            optional_var("DEVELOPER_AGENT_URL").context("reading DEVELOPER_AGENT_URL")?;
        let developer_agent_token =
            optional_var("DEVELOPER_AGENT_TOKEN").context("reading DEVELOPER_AGENT_TOKEN")?;
        let bind_addr =
            optional_var("BIND_ADDR")?.unwrap_or_else(|| "0.0.0.0:8081".to_string());

        if agent_token.is_none() {
            tracing::warn!("AGENT_TOKEN is not set; every request will be rejected as misconfigured");
        }
        if developer_agent_url.is_none() {
            tracing::warn!("DEVELOPER_AGENT_URL is not set; forwarding will fail as misconfigured");
        }

        Ok(Self {
            agent_token,
            developer_agent_url,
            developer_agent_token,
            bind_addr,
        })
    }
}

fn optional_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e @ std::env::VarError::NotUnicode(_)) => {
            Err(anyhow::anyhow!("{name} is not valid UTF-8: {e}"))
        }
    }
}
