//! Job lifecycle coordinator
//!
//! Admits evaluation jobs, fans workers out through the runtime, and
//! routes status events into the persistence engine. Dispatch is
//! fire-and-forget: the HTTP response never waits on worker startup, and
//! the spawned task installs a panic boundary that marks the job failed
//! instead of taking the process down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use validator::Validate;

use eval_runtime::Runtime;
use shared::error::{Result, ServiceError};
use shared::models::{codes, BenchmarkStatusEvent, EvaluationJob, JobConfig, JobState};

use crate::services::tracker::ExperimentTracker;
use crate::storage::EvaluationStorage;

/// Coordinates job admission, dispatch, retrieval, and deletion
pub struct EvaluationService {
    storage: Arc<dyn EvaluationStorage>,
    runtime: Arc<dyn Runtime>,
    tracker: Option<Arc<dyn ExperimentTracker>>,
}

impl EvaluationService {
    pub fn new(
        storage: Arc<dyn EvaluationStorage>,
        runtime: Arc<dyn Runtime>,
        tracker: Option<Arc<dyn ExperimentTracker>>,
    ) -> Self {
        Self {
            storage,
            runtime,
            tracker,
        }
    }

    /// Admit a job: validate, optionally create a tracking experiment,
    /// persist the pending row, and dispatch workers asynchronously.
    pub async fn create_evaluation(&self, config: JobConfig) -> Result<EvaluationJob> {
        config.validate().map_err(|e| {
            ServiceError::validation(format!("Invalid evaluation job configuration: {e}"))
        })?;

        let (experiment_id, experiment_url) = self.create_experiment(&config).await;

        let job = self
            .storage
            .create_job(config, experiment_id, experiment_url)
            .await?;
        tracing::info!(job_id = %job.id, benchmarks = job.config.benchmarks.len(), "Evaluation job created");

        self.dispatch(job.clone());
        Ok(job)
    }

    /// Create a tracking experiment when a tracker is configured.
    /// Tracker failures are logged and the job proceeds untracked.
    async fn create_experiment(&self, config: &JobConfig) -> (Option<String>, Option<String>) {
        let Some(tracker) = &self.tracker else {
            return (None, None);
        };
        let meta = config.experiment.as_ref();
        let name = meta
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| format!("eval-{}", config.model.name));

        match tracker
            .create_experiment(&name, meta.and_then(|m| m.tags.as_ref()))
            .await
        {
            Ok(experiment) => (Some(experiment.id), Some(experiment.url)),
            Err(e) => {
                tracing::warn!(error = %e, experiment = %name, "Experiment creation failed, continuing without tracking");
                (None, None)
            }
        }
    }

    /// Fan the job out to the runtime on its own task. Dispatch errors and
    /// panics mark the job failed; the job id in the stored message keeps
    /// the failure observable to polling clients.
    fn dispatch(&self, job: EvaluationJob) {
        let storage = Arc::clone(&self.storage);
        let runtime = Arc::clone(&self.runtime);

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(runtime.run_evaluation_job(&job))
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "worker dispatch panicked".to_string(),
            };

            tracing::error!(job_id = %job.id, error = %failure, "Evaluation job dispatch failed");
            let message = format!("Failed to dispatch evaluation job {}: {failure}", job.id);
            if let Err(e) = storage
                .update_overall_state(&job.id, JobState::Failed, &message, codes::EVALUATION_JOB_FAILED)
                .await
            {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job as failed after dispatch error");
            }
        });
    }

    pub async fn get_job(&self, id: &str) -> Result<EvaluationJob> {
        self.storage.get_job(id).await
    }

    pub async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
        status_filter: Option<JobState>,
    ) -> Result<(Vec<EvaluationJob>, i64)> {
        self.storage.list_jobs(limit, offset, status_filter).await
    }

    /// Soft delete cancels; hard delete removes the row and then asks the
    /// runtime to clean worker resources up, best-effort.
    pub async fn delete_job(&self, id: &str, hard: bool) -> Result<()> {
        if !hard {
            return self.storage.delete_job(id, false).await;
        }

        let job = self.storage.get_job(id).await?;
        self.storage.delete_job(id, true).await?;

        match self.runtime.delete_evaluation_job_resources(&job).await {
            Ok(()) => {}
            Err(e) if matches!(e, eval_runtime::RuntimeError::DeleteUnsupported(_)) => {
                tracing::debug!(job_id = %id, runtime = self.runtime.name(), "Runtime does not support resource cleanup");
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Worker resource cleanup failed");
            }
        }
        Ok(())
    }

    /// Callback intake: validate the event and apply it transactionally
    pub async fn apply_status_event(
        &self,
        id: &str,
        event: &BenchmarkStatusEvent,
    ) -> Result<EvaluationJob> {
        event.validate()?;
        let job = self.storage.update_job(id, event).await?;
        tracing::debug!(
            job_id = %id,
            benchmark = %event.id,
            state = %job.status.state,
            "Applied benchmark status event"
        );
        Ok(job)
    }
}
