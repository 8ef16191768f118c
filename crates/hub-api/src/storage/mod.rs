//! Persistence engine
//!
//! One `evaluations` row per job; the entity column holds the JSON
//! document with the job's config, status, and results. Two interchangeable
//! stores implement [`EvaluationStorage`] over SQLite and PostgreSQL, both
//! driven by the dialect-aware statement factory. Every mutation runs in a
//! transaction that serializes updates per row, and every writer keeps the
//! denormalized `status` column in sync with the entity.

pub mod postgres;
pub mod sqlite;
pub mod statements;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shared::config::DatabaseSettings;
use shared::error::{Result, ServiceError};
use shared::models::{BenchmarkStatusEvent, EvaluationJob, JobEntity, JobState};

use statements::Dialect;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;

/// Persistence operations over evaluation jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EvaluationStorage: Send + Sync {
    /// Insert a new pending job and read it back in one transaction
    async fn create_job(
        &self,
        config: shared::models::JobConfig,
        experiment_id: Option<String>,
        experiment_url: Option<String>,
    ) -> Result<EvaluationJob>;

    async fn get_job(&self, id: &str) -> Result<EvaluationJob>;

    /// Page of jobs ordered by id descending, plus the total count under
    /// the same filter
    async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
        status_filter: Option<JobState>,
    ) -> Result<(Vec<EvaluationJob>, i64)>;

    /// Soft delete cancels the job; hard delete removes the row
    async fn delete_job(&self, id: &str, hard: bool) -> Result<()>;

    /// Overwrite the overall state and message, leaving benchmarks alone
    async fn update_overall_state(
        &self,
        id: &str,
        state: JobState,
        message: &str,
        code: &str,
    ) -> Result<EvaluationJob>;

    /// Apply one benchmark status event under a transaction
    async fn update_job(&self, id: &str, event: &BenchmarkStatusEvent) -> Result<EvaluationJob>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;

    /// Close the underlying pool
    async fn close(&self);
}

/// Construct the store selected by the configured driver
pub async fn new_storage(settings: &DatabaseSettings) -> Result<Arc<dyn EvaluationStorage>> {
    match Dialect::parse(&settings.driver)? {
        Dialect::Sqlite => Ok(Arc::new(SqliteStorage::connect(settings).await?)),
        Dialect::Postgres => Ok(Arc::new(PostgresStorage::connect(settings).await?)),
    }
}

/// Coerce a transaction body's future into the boxed form the
/// `with_transaction` helpers expect.
pub(crate) fn boxed<'a, T: Send + 'a>(
    fut: impl std::future::Future<Output = Result<T>> + Send + 'a,
) -> futures_util::future::BoxFuture<'a, Result<T>> {
    Box::pin(fut)
}

pub(crate) fn encode_entity(job: &EvaluationJob) -> Result<String> {
    serde_json::to_string(&job.entity())
        .map_err(|e| ServiceError::internal(format!("Failed to marshal job entity: {e}")))
}

pub(crate) fn decode_entity(raw: &str) -> Result<JobEntity> {
    serde_json::from_str(raw)
        .map_err(|e| ServiceError::internal(format!("Failed to unmarshal job entity: {e}")))
}

pub(crate) fn encode_entity_value(job: &EvaluationJob) -> Result<serde_json::Value> {
    serde_json::to_value(job.entity())
        .map_err(|e| ServiceError::internal(format!("Failed to marshal job entity: {e}")))
}

pub(crate) fn decode_entity_value(raw: serde_json::Value) -> Result<JobEntity> {
    serde_json::from_value(raw)
        .map_err(|e| ServiceError::internal(format!("Failed to unmarshal job entity: {e}")))
}

pub(crate) fn assemble_job(
    id: String,
    tenant_id: String,
    experiment_id: Option<String>,
    entity: JobEntity,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> EvaluationJob {
    EvaluationJob::from_parts(id, tenant_id, experiment_id, entity, created_at, updated_at)
}

/// Shared soft-delete gate: cancelling a terminal job is a conflict
pub(crate) fn ensure_cancellable(job: &EvaluationJob) -> Result<()> {
    if job.status.state.is_terminal() {
        return Err(ServiceError::conflict(format!(
            "Evaluation job {} is already {} and cannot be cancelled",
            job.id, job.status.state
        )));
    }
    Ok(())
}
