//! Environment-sourced configuration (spec.md §6 "Environment variables").

use anyhow::{Context, Result};

/// Log Processor configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer secret callers (the Ingest Gateway) must present. This is
    /// the same secret the Gateway sends as its upstream token
    /// (`DEVELOPER_AGENT_TOKEN`), not its own inbound `AGENT_TOKEN`.
    pub agent_token: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set but not valid UTF-8.
    pub fn from_env() -> Result<Self> {
        let agent_token =
            optional_var("DEVELOPER_AGENT_TOKEN").context("reading DEVELOPER_AGENT_TOKEN")?;
        let bind_addr =
            optional_var("BIND_ADDR")?.unwrap_or_else(|| "0.0.0.0:8082".to_string());

        if agent_token.is_none() {
            tracing::warn!("DEVELOPER_AGENT_TOKEN is not set; every request will be rejected as misconfigured");
        }

        Ok(Self {
            agent_token,
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
