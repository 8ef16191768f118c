//! Process signal files
//!
//! On successful startup the service writes a ready file describing the
//! build; on terminal failure it writes a termination file with the error.
//! Paths come from configuration with environment-variable fallback, and
//! both writes are best-effort from the caller's point of view.

use serde::Serialize;
use std::env;

use crate::config::SignalSettings;
use crate::error::{Result, ServiceError};

/// Build identification written to the ready file
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub build: String,
    pub build_date: String,
}

impl BuildInfo {
    /// Assemble build info from compile-time and environment values
    pub fn current(version: &str) -> Self {
        Self {
            version: version.to_string(),
            build: env::var("BUILD_ID").unwrap_or_else(|_| "dev".to_string()),
            build_date: env::var("BUILD_DATE").unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}

fn resolve(path: &Option<String>, env_var: &str) -> Option<String> {
    path.clone().or_else(|| env::var(env_var).ok())
}

/// Write the ready file if a path is configured
pub fn write_ready_file(settings: &SignalSettings, info: &BuildInfo) -> Result<()> {
    let Some(path) = resolve(&settings.ready_file, "READY_FILE_PATH") else {
        tracing::debug!("No ready file configured, skipping");
        return Ok(());
    };
    let body = serde_json::to_string(info)?;
    std::fs::write(&path, body)
        .map_err(|e| ServiceError::config(format!("Failed to write ready file {path}: {e}")))?;
    tracing::info!(path = %path, "Ready file written");
    Ok(())
}

/// Write the termination file if a path is configured
pub fn write_termination_file(settings: &SignalSettings, error: &str) -> Result<()> {
    let Some(path) = resolve(&settings.termination_file, "TERMINATION_LOG_PATH") else {
        tracing::debug!("No termination file configured, skipping");
        return Ok(());
    };
    std::fs::write(&path, error).map_err(|e| {
        ServiceError::config(format!("Failed to write termination file {path}: {e}"))
    })?;
    tracing::info!(path = %path, "Termination file written");
    Ok(())
}
