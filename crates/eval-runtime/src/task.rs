//! Per-benchmark worker task construction
//!
//! Turns an admitted job into one launchable task per benchmark. All
//! validation happens here, before any backend touches its orchestrator,
//! so a misconfigured job fails fast without leaving stray workers.

use std::collections::HashMap;

use shared::config::RuntimeSettings;
use shared::models::EvaluationJob;
use shared::providers::ProviderRegistry;
use shared::tasks::{coerce_to_i64, env_keys, EvaluationTask, DEFAULT_RETRY_ATTEMPTS};

use crate::error::{RuntimeError, RuntimeResult};

/// Parameter promoted to the task's top-level `num_examples` field
const NUM_EXAMPLES_PARAM: &str = "num_examples";
/// Parameter converted to the task's `timeout_seconds` field
const TIMEOUT_MINUTES_PARAM: &str = "timeout_minutes";

/// Container resource requests and limits for a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResources {
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
}

impl Default for TaskResources {
    fn default() -> Self {
        Self {
            cpu_request: "250m".to_string(),
            memory_request: "512Mi".to_string(),
            cpu_limit: "1".to_string(),
            memory_limit: "2Gi".to_string(),
        }
    }
}

/// One launchable worker: payload plus container placement details
#[derive(Debug, Clone)]
pub struct BenchmarkTask {
    pub task: EvaluationTask,
    /// Provider owning the benchmark; echoed in status events
    pub provider_id: String,
    pub image: String,
    pub entrypoint: Option<Vec<String>>,
    /// Provider-level namespace override; backends fall back to the
    /// runtime namespace, then to `default`
    pub namespace: Option<String>,
    pub resources: TaskResources,
}

impl BenchmarkTask {
    /// Environment handed to the worker container, including the full
    /// serialized task payload.
    pub fn env(&self) -> RuntimeResult<Vec<(String, String)>> {
        let spec = serde_json::to_string(&self.task)?;
        let mut env = vec![
            (env_keys::JOB_ID.to_string(), self.task.id.clone()),
            (
                env_keys::BENCHMARK_ID.to_string(),
                self.task.benchmark_id.clone(),
            ),
            (env_keys::MODEL_URL.to_string(), self.task.model.url.clone()),
            (
                env_keys::MODEL_NAME.to_string(),
                self.task.model.name.clone(),
            ),
            (
                env_keys::CALLBACK_URL.to_string(),
                self.task.callback_url.clone(),
            ),
            (
                env_keys::RETRY_ATTEMPTS.to_string(),
                self.task.retry_attempts.to_string(),
            ),
            (env_keys::TASK_SPEC.to_string(), spec),
        ];
        if let Some(timeout) = self.task.timeout_seconds {
            env.push((env_keys::TIMEOUT_SECONDS.to_string(), timeout.to_string()));
        }
        Ok(env)
    }
}

/// Build one task per benchmark, validating the whole job first.
pub fn build_tasks(
    job: &EvaluationJob,
    registry: &ProviderRegistry,
    settings: &RuntimeSettings,
) -> RuntimeResult<Vec<BenchmarkTask>> {
    let callback_url = settings.callback_url.clone().ok_or_else(|| {
        RuntimeError::config(
            "worker callback URL is not configured; set runtime.callback_url or EVAL_HUB_CALLBACK_URL",
        )
    })?;

    let retry_attempts = job
        .config
        .retry_attempts
        .or(settings.default_retry_attempts)
        .unwrap_or(DEFAULT_RETRY_ATTEMPTS);

    let mut tasks = Vec::with_capacity(job.config.benchmarks.len());
    for benchmark in &job.config.benchmarks {
        let provider = registry.get(&benchmark.provider_id).ok_or_else(|| {
            RuntimeError::config(format!("unknown provider: {}", benchmark.provider_id))
        })?;
        let runtime = provider.runtime.as_ref().ok_or_else(|| {
            RuntimeError::config(format!(
                "provider {} has no runtime descriptor",
                provider.id
            ))
        })?;
        if runtime.image.is_empty() {
            return Err(RuntimeError::config(format!(
                "provider {} has an empty worker image",
                provider.id
            )));
        }

        let defaults = registry
            .benchmark(&benchmark.provider_id, &benchmark.id)
            .map(|b| b.parameters.clone())
            .unwrap_or_default();
        if defaults.is_empty() && benchmark.parameters.is_empty() {
            return Err(RuntimeError::config(format!(
                "benchmark ({}, {}) has no parameters from catalog or job config",
                benchmark.provider_id, benchmark.id
            )));
        }

        let mut params: HashMap<_, _> = defaults;
        params.extend(benchmark.parameters.clone());

        let num_examples = match params.remove(NUM_EXAMPLES_PARAM) {
            Some(value) => Some(coerce_to_i64(&value).ok_or_else(|| {
                RuntimeError::config(format!(
                    "benchmark ({}, {}): num_examples is not an integer: {value}",
                    benchmark.provider_id, benchmark.id
                ))
            })?),
            None => None,
        };
        let timeout_seconds = match params.remove(TIMEOUT_MINUTES_PARAM) {
            Some(value) => Some(
                coerce_to_i64(&value)
                    .map(|minutes| minutes * 60)
                    .ok_or_else(|| {
                        RuntimeError::config(format!(
                            "benchmark ({}, {}): timeout_minutes is not an integer: {value}",
                            benchmark.provider_id, benchmark.id
                        ))
                    })?,
            ),
            None => None,
        };

        tasks.push(BenchmarkTask {
            provider_id: benchmark.provider_id.clone(),
            task: EvaluationTask {
                id: job.id.clone(),
                benchmark_id: benchmark.id.clone(),
                benchmark_config: params,
                num_examples,
                callback_url: callback_url.clone(),
                model: job.config.model.clone(),
                timeout_seconds,
                retry_attempts,
            },
            image: runtime.image.clone(),
            entrypoint: runtime.entrypoint.clone(),
            namespace: runtime.namespace.clone(),
            resources: TaskResources {
                cpu_request: runtime
                    .cpu_request
                    .clone()
                    .unwrap_or_else(|| TaskResources::default().cpu_request),
                memory_request: runtime
                    .memory_request
                    .clone()
                    .unwrap_or_else(|| TaskResources::default().memory_request),
                cpu_limit: runtime
                    .cpu_limit
                    .clone()
                    .unwrap_or_else(|| TaskResources::default().cpu_limit),
                memory_limit: runtime
                    .memory_limit
                    .clone()
                    .unwrap_or_else(|| TaskResources::default().memory_limit),
            },
        });
    }

    Ok(tasks)
}
