//! Local runtime backend
//!
//! Runs workers in-process for integration testing and single-node
//! development. Workers still report through the same HTTP callback
//! endpoint the Kubernetes workers use, so the intake path is identical
//! in both modes.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use shared::config::RuntimeSettings;
use shared::models::EvaluationJob;
use shared::providers::ProviderRegistry;

use crate::error::{RuntimeError, RuntimeResult};
use crate::task::{build_tasks, BenchmarkTask};
use crate::Runtime;

/// Runtime backend executing workers as in-process tasks
pub struct LocalRuntime {
    client: reqwest::Client,
    settings: RuntimeSettings,
    registry: std::sync::Arc<ProviderRegistry>,
}

impl LocalRuntime {
    pub fn new(settings: &RuntimeSettings, registry: std::sync::Arc<ProviderRegistry>) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings: settings.clone(),
            registry,
        }
    }
}

#[async_trait]
impl Runtime for LocalRuntime {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn run_evaluation_job(&self, job: &EvaluationJob) -> RuntimeResult<()> {
        let tasks = build_tasks(job, &self.registry, &self.settings)?;

        for task in tasks {
            let client = self.client.clone();
            tokio::spawn(async move {
                let benchmark = task.task.benchmark_id.clone();
                let job_id = task.task.id.clone();
                if let Err(e) = execute_worker(&client, &task).await {
                    tracing::error!(
                        job_id = %job_id,
                        benchmark = %benchmark,
                        error = %e,
                        "Local worker failed"
                    );
                }
            });
        }
        Ok(())
    }
}

/// Run one benchmark in-process: report `running`, then `completed` with a
/// placeholder metric set.
async fn execute_worker(client: &reqwest::Client, task: &BenchmarkTask) -> RuntimeResult<()> {
    let url = task.task.events_url();

    post_event(
        client,
        &url,
        json!({
            "benchmark_status_event": {
                "provider_id": task.provider_id,
                "id": task.task.benchmark_id,
                "status": "running",
                "started_at": Utc::now(),
            }
        }),
    )
    .await?;

    post_event(
        client,
        &url,
        json!({
            "benchmark_status_event": {
                "provider_id": task.provider_id,
                "id": task.task.benchmark_id,
                "status": "completed",
                "completed_at": Utc::now(),
                "metrics": {
                    "examples_requested": task.task.num_examples,
                },
            }
        }),
    )
    .await
}

async fn post_event(
    client: &reqwest::Client,
    url: &str,
    body: serde_json::Value,
) -> RuntimeResult<()> {
    let response = client.post(url).json(&body).send().await?;
    if !response.status().is_success() {
        return Err(RuntimeError::launch(format!(
            "callback endpoint returned {} for {url}",
            response.status()
        )));
    }
    Ok(())
}
