//! Runtime dispatcher for evaluation workers
//!
//! A [`Runtime`] launches one worker per benchmark of an admitted job and,
//! when supported, cleans worker resources up on hard delete. Two backends
//! exist: Kubernetes for real deployments and an in-process local backend
//! for integration testing. Both build their tasks through
//! [`task::build_tasks`], so validation and the worker contract cannot
//! diverge between them.

use std::sync::Arc;

use async_trait::async_trait;

use shared::config::RuntimeSettings;
use shared::models::EvaluationJob;
use shared::providers::ProviderRegistry;

pub mod error;
pub mod kubernetes;
pub mod local;
pub mod task;

pub use error::{RuntimeError, RuntimeResult};
pub use kubernetes::KubernetesRuntime;
pub use local::LocalRuntime;

/// A worker launch backend
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Backend name used in logs and configuration
    fn name(&self) -> &'static str;

    /// Launch one worker per benchmark of the job.
    ///
    /// Implementations validate every benchmark before launching anything,
    /// so a configuration error never leaves a partial fan-out behind.
    async fn run_evaluation_job(&self, job: &EvaluationJob) -> RuntimeResult<()>;

    /// Best-effort cleanup of worker resources on hard delete
    async fn delete_evaluation_job_resources(&self, _job: &EvaluationJob) -> RuntimeResult<()> {
        Err(RuntimeError::DeleteUnsupported(self.name()))
    }
}

/// Construct the runtime backend selected by configuration
pub async fn new_runtime(
    settings: &RuntimeSettings,
    registry: Arc<ProviderRegistry>,
) -> RuntimeResult<Arc<dyn Runtime>> {
    match settings.backend.as_str() {
        "kubernetes" => Ok(Arc::new(
            KubernetesRuntime::connect(settings, registry).await?,
        )),
        "local" => Ok(Arc::new(LocalRuntime::new(settings, registry))),
        other => Err(RuntimeError::config(format!(
            "unsupported runtime backend: {other}"
        ))),
    }
}
