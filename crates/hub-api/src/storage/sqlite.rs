//! SQLite store
//!
//! The entity document is stored as a TEXT column. Transactions serialize
//! per-row updates; the guarded `with_transaction` helper commits unless
//! the body failed with a rollback-tagged error.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

use async_trait::async_trait;
use shared::config::DatabaseSettings;
use shared::error::{Result, ServiceError};
use shared::merge;
use shared::models::{codes, BenchmarkStatusEvent, EvaluationJob, JobConfig, JobState};

use super::statements::Statements;
use super::{boxed, decode_entity, encode_entity, ensure_cancellable, EvaluationStorage};

/// SQLite-backed evaluation store
pub struct SqliteStorage {
    pool: SqlitePool,
    stmts: Statements,
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    #[allow(dead_code)]
    status: String,
    experiment_id: Option<String>,
    entity: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<EvaluationJob> {
        let entity = decode_entity(&self.entity)?;
        Ok(super::assemble_job(
            self.id,
            self.tenant_id,
            self.experiment_id,
            entity,
            self.created_at,
            self.updated_at,
        ))
    }
}

impl SqliteStorage {
    /// Open the pool, apply pool limits, and ensure the schema exists
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let stmts = Statements::new(&settings.driver)?;
        let options = SqliteConnectOptions::from_str(&settings.url)
            .map_err(|e| ServiceError::config(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_open_conns)
            .min_connections(settings.max_idle_conns)
            .max_lifetime(Duration::from_secs(settings.conn_max_lifetime_seconds))
            .connect_with(options)
            .await?;

        for ddl in stmts.create_schema() {
            sqlx::query(&ddl).execute(&pool).await?;
        }

        tracing::info!(
            max_connections = settings.max_open_conns,
            "SQLite storage ready"
        );
        Ok(Self { pool, stmts })
    }

    /// Run `body` in a transaction. Commit when the body returns Ok or a
    /// service error that did not opt into rollback; roll back otherwise.
    /// Commit and rollback failures surface as database errors.
    async fn with_transaction<T, F>(&self, name: &str, resource_id: &str, body: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut SqliteConnection) -> BoxFuture<'t, Result<T>> + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;
        let out = body(&mut *tx).await;
        let rollback = out.as_ref().err().map(ServiceError::wants_rollback).unwrap_or(false);
        if rollback {
            tx.rollback().await.map_err(|e| {
                ServiceError::database(format!("Rollback failed for {name} on {resource_id}: {e}"))
            })?;
        } else {
            tx.commit().await.map_err(|e| {
                ServiceError::database(format!("Commit failed for {name} on {resource_id}: {e}"))
            })?;
        }
        out
    }
}

#[async_trait]
impl EvaluationStorage for SqliteStorage {
    async fn create_job(
        &self,
        config: JobConfig,
        experiment_id: Option<String>,
        experiment_url: Option<String>,
    ) -> Result<EvaluationJob> {
        let job = EvaluationJob::new(config, experiment_id, experiment_url);
        let entity = encode_entity(&job)?;
        let insert = self.stmts.insert_job();
        let select = self.stmts.select_job();
        let id = job.id.clone();

        self.with_transaction("create_job", &id, move |conn| {
            boxed(async move {
                sqlx::query(&insert)
                    .bind(&job.id)
                    .bind(&job.tenant_id)
                    .bind(job.status.state.to_string())
                    .bind(&job.experiment_id)
                    .bind(&entity)
                    .bind(job.created_at)
                    .bind(job.updated_at)
                    .execute(&mut *conn)
                    .await?;

                let row: JobRow = sqlx::query_as(&select)
                    .bind(&job.id)
                    .fetch_one(&mut *conn)
                    .await?;
                row.into_job()
            })
        })
        .await
    }

    async fn get_job(&self, id: &str) -> Result<EvaluationJob> {
        let select = self.stmts.select_job();
        let row: Option<JobRow> = sqlx::query_as(&select)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| ServiceError::not_found("Evaluation job", id))?
            .into_job()
    }

    async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
        status_filter: Option<JobState>,
    ) -> Result<(Vec<EvaluationJob>, i64)> {
        let filtered = status_filter.is_some();
        let count_sql = self.stmts.count_jobs(filtered);
        let list_sql = self.stmts.list_jobs(filtered);
        let status = status_filter.map(|s| s.to_string());

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(status) = &status {
            count_query = count_query.bind(status);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut list_query = sqlx::query_as::<_, JobRow>(&list_sql);
        if let Some(status) = &status {
            list_query = list_query.bind(status);
        }
        let rows = list_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let jobs = rows
            .into_iter()
            .map(JobRow::into_job)
            .collect::<Result<Vec<_>>>()?;
        Ok((jobs, total))
    }

    async fn delete_job(&self, id: &str, hard: bool) -> Result<()> {
        if hard {
            let delete = self.stmts.delete_job();
            let result = sqlx::query(&delete).bind(id).execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(ServiceError::not_found("Evaluation job", id));
            }
            return Ok(());
        }

        let job = self.get_job(id).await?;
        ensure_cancellable(&job)?;
        self.update_overall_state(
            id,
            JobState::Cancelled,
            "Evaluation job cancelled",
            codes::EVALUATION_JOB_CANCELLED,
        )
        .await?;
        Ok(())
    }

    async fn update_overall_state(
        &self,
        id: &str,
        state: JobState,
        message: &str,
        code: &str,
    ) -> Result<EvaluationJob> {
        let select = self.stmts.select_job();
        let update = self.stmts.update_status_and_entity();
        let id_owned = id.to_string();
        let message = message.to_string();
        let code = code.to_string();

        self.with_transaction("update_overall_state", id, move |conn| {
            boxed(async move {
                let row: Option<JobRow> = sqlx::query_as(&select)
                    .bind(&id_owned)
                    .fetch_optional(&mut *conn)
                    .await?;
                let mut job = row
                    .ok_or_else(|| {
                        ServiceError::not_found("Evaluation job", &id_owned).with_rollback()
                    })?
                    .into_job()?;

                job.status.state = state;
                job.status.message = message;
                job.status.code = code;
                job.updated_at = Utc::now();

                let entity = encode_entity(&job)?;
                sqlx::query(&update)
                    .bind(state.to_string())
                    .bind(&entity)
                    .bind(job.updated_at)
                    .bind(&id_owned)
                    .execute(&mut *conn)
                    .await?;
                Ok(job)
            })
        })
        .await
    }

    async fn update_job(&self, id: &str, event: &BenchmarkStatusEvent) -> Result<EvaluationJob> {
        let select = self.stmts.select_job();
        let update = self.stmts.update_status_and_entity();
        let id_owned = id.to_string();
        let event = event.clone();

        self.with_transaction("update_job", id, move |conn| {
            boxed(async move {
                let row: Option<JobRow> = sqlx::query_as(&select)
                    .bind(&id_owned)
                    .fetch_optional(&mut *conn)
                    .await?;
                let mut job = row
                    .ok_or_else(|| {
                        ServiceError::not_found("Evaluation job", &id_owned).with_rollback()
                    })?
                    .into_job()?;

                merge::apply_status_event(&mut job, &event)?;
                job.updated_at = Utc::now();

                let entity = encode_entity(&job)?;
                sqlx::query(&update)
                    .bind(job.status.state.to_string())
                    .bind(&entity)
                    .bind(job.updated_at)
                    .bind(&id_owned)
                    .execute(&mut *conn)
                    .await?;
                Ok(job)
            })
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
