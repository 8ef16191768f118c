//! Error types for runtime backends

use thiserror::Error;

/// Runtime error types
///
/// Configuration errors are produced while building worker task specs,
/// before anything launches; launch errors happen afterwards. The
/// coordinator marks the job failed on either, but only configuration
/// errors are guaranteed to leave no workers behind.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid runtime or provider configuration
    #[error("Runtime configuration error: {0}")]
    Config(String),

    /// Worker launch failed after validation
    #[error("Failed to launch worker: {0}")]
    Launch(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kubernetes(#[from] kube::Error),

    /// Callback transport error from the local backend
    #[error("Callback transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend does not implement resource cleanup
    #[error("Resource cleanup is not supported by the {0} runtime")]
    DeleteUnsupported(&'static str),
}

impl RuntimeError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RuntimeError::Config(msg.into())
    }

    /// Create a launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        RuntimeError::Launch(msg.into())
    }

    /// Whether this error was raised before any worker launched
    pub fn is_config(&self) -> bool {
        matches!(self, RuntimeError::Config(_))
    }
}

/// Convenience result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
