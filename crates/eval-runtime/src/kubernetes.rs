//! Kubernetes runtime backend
//!
//! Launches one `batch/v1` Job per benchmark. Every object carries
//! `eval-hub/job-id` and `eval-hub/benchmark-id` labels so resource
//! cleanup can delete by selector.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;

use shared::config::RuntimeSettings;
use shared::models::EvaluationJob;
use shared::providers::ProviderRegistry;

use crate::error::RuntimeResult;
use crate::task::{build_tasks, BenchmarkTask};
use crate::Runtime;

const MANAGED_BY: &str = "eval-hub";
const JOB_ID_LABEL: &str = "eval-hub/job-id";
const BENCHMARK_LABEL: &str = "eval-hub/benchmark-id";
const FALLBACK_NAMESPACE: &str = "default";

/// Runtime backend launching workers as Kubernetes Jobs
pub struct KubernetesRuntime {
    client: Client,
    settings: RuntimeSettings,
    registry: std::sync::Arc<ProviderRegistry>,
}

impl KubernetesRuntime {
    /// Connect using the ambient kubeconfig or in-cluster credentials
    pub async fn connect(
        settings: &RuntimeSettings,
        registry: std::sync::Arc<ProviderRegistry>,
    ) -> RuntimeResult<Self> {
        let client = Client::try_default().await?;
        Ok(Self {
            client,
            settings: settings.clone(),
            registry,
        })
    }

    fn namespace_for(&self, task: &BenchmarkTask) -> String {
        task.namespace
            .clone()
            .or_else(|| self.settings.namespace.clone())
            .unwrap_or_else(|| FALLBACK_NAMESPACE.to_string())
    }
}

#[async_trait]
impl Runtime for KubernetesRuntime {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn run_evaluation_job(&self, job: &EvaluationJob) -> RuntimeResult<()> {
        // All tasks are validated before the first API call.
        let tasks = build_tasks(job, &self.registry, &self.settings)?;

        for task in &tasks {
            let namespace = self.namespace_for(task);
            let spec = build_job_object(task)?;
            let api: Api<Job> = Api::namespaced(self.client.clone(), &namespace);
            let name = spec.metadata.name.clone().unwrap_or_default();
            api.create(&PostParams::default(), &spec).await?;
            tracing::info!(
                job_id = %job.id,
                benchmark = %task.task.benchmark_id,
                namespace = %namespace,
                worker = %name,
                "Launched evaluation worker"
            );
        }
        Ok(())
    }

    async fn delete_evaluation_job_resources(&self, job: &EvaluationJob) -> RuntimeResult<()> {
        let selector = format!("{JOB_ID_LABEL}={}", job.id);
        let mut namespaces: Vec<String> = vec![self
            .settings
            .namespace
            .clone()
            .unwrap_or_else(|| FALLBACK_NAMESPACE.to_string())];
        for benchmark in &job.config.benchmarks {
            if let Some(ns) = self
                .registry
                .get(&benchmark.provider_id)
                .and_then(|p| p.runtime.as_ref())
                .and_then(|r| r.namespace.clone())
            {
                if !namespaces.contains(&ns) {
                    namespaces.push(ns);
                }
            }
        }

        for namespace in namespaces {
            let api: Api<Job> = Api::namespaced(self.client.clone(), &namespace);
            api.delete_collection(
                &DeleteParams::default(),
                &ListParams::default().labels(&selector),
            )
            .await?;
            tracing::info!(job_id = %job.id, namespace = %namespace, "Deleted worker resources");
        }
        Ok(())
    }
}

/// Build the Kubernetes Job object for one benchmark task.
pub fn build_job_object(task: &BenchmarkTask) -> RuntimeResult<Job> {
    let env: Vec<EnvVar> = task
        .env()?
        .into_iter()
        .map(|(name, value)| EnvVar {
            name,
            value: Some(value),
            value_from: None,
        })
        .collect();

    let labels = BTreeMap::from([
        (
            "app.kubernetes.io/managed-by".to_string(),
            MANAGED_BY.to_string(),
        ),
        (JOB_ID_LABEL.to_string(), task.task.id.clone()),
        (
            BENCHMARK_LABEL.to_string(),
            sanitize_name(&task.task.benchmark_id),
        ),
    ]);

    let container = Container {
        name: "evaluation-worker".to_string(),
        image: Some(task.image.clone()),
        command: task.entrypoint.clone(),
        env: Some(env),
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(task.resources.cpu_request.clone())),
                (
                    "memory".to_string(),
                    Quantity(task.resources.memory_request.clone()),
                ),
            ])),
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(task.resources.cpu_limit.clone())),
                (
                    "memory".to_string(),
                    Quantity(task.resources.memory_limit.clone()),
                ),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(worker_name(&task.task.id, &task.task.benchmark_id)),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(task.task.retry_attempts as i32),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    restart_policy: Some("Never".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// DNS-1123 compliant worker name: `eval-{job prefix}-{benchmark}`
fn worker_name(job_id: &str, benchmark_id: &str) -> String {
    let prefix: String = job_id.chars().take(8).collect();
    let name = format!("eval-{}-{}", sanitize_name(&prefix), sanitize_name(benchmark_id));
    name.chars().take(63).collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

fn sanitize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskResources;
    use shared::models::ModelRef;
    use shared::tasks::{env_keys, EvaluationTask};
    use std::collections::HashMap;

    fn task() -> BenchmarkTask {
        BenchmarkTask {
            provider_id: "lm_evaluation_harness".to_string(),
            task: EvaluationTask {
                id: "123e4567-e89b-12d3-a456-426614174000".to_string(),
                benchmark_id: "arc_easy".to_string(),
                benchmark_config: HashMap::new(),
                num_examples: Some(100),
                callback_url: "http://hub:8080".to_string(),
                model: ModelRef {
                    url: "http://model:8000".to_string(),
                    name: "llama".to_string(),
                    configuration: None,
                },
                timeout_seconds: Some(900),
                retry_attempts: 3,
            },
            image: "quay.io/eval-hub/lm-eval:latest".to_string(),
            entrypoint: Some(vec!["python".to_string(), "-m".to_string(), "worker".to_string()]),
            namespace: None,
            resources: TaskResources::default(),
        }
    }

    #[test]
    fn test_worker_name_is_dns_safe() {
        let name = worker_name("123e4567-e89b-12d3-a456-426614174000", "ARC_Easy");
        assert_eq!(name, "eval-123e4567-arc-easy");
        assert!(name.len() <= 63);
    }

    #[test]
    fn test_job_object_carries_contract() {
        let job = build_job_object(&task()).unwrap();

        let labels = job.metadata.labels.as_ref().unwrap();
        assert_eq!(
            labels[JOB_ID_LABEL],
            "123e4567-e89b-12d3-a456-426614174000"
        );

        let spec = job.spec.as_ref().unwrap();
        assert_eq!(spec.backoff_limit, Some(3));

        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));

        let container = &pod.containers[0];
        assert_eq!(
            container.image.as_deref(),
            Some("quay.io/eval-hub/lm-eval:latest")
        );
        assert_eq!(
            container.command.as_ref().unwrap()[0],
            "python".to_string()
        );

        let env = container.env.as_ref().unwrap();
        let lookup = |key: &str| {
            env.iter()
                .find(|e| e.name == key)
                .and_then(|e| e.value.clone())
        };
        assert_eq!(
            lookup(env_keys::CALLBACK_URL).as_deref(),
            Some("http://hub:8080")
        );
        assert_eq!(lookup(env_keys::TIMEOUT_SECONDS).as_deref(), Some("900"));
        let payload = lookup(env_keys::TASK_SPEC).unwrap();
        let decoded: EvaluationTask = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.num_examples, Some(100));
    }

    #[test]
    fn test_default_resources_applied() {
        let job = build_job_object(&task()).unwrap();
        let pod = job.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.as_ref().unwrap();
        assert_eq!(
            resources.requests.as_ref().unwrap()["cpu"],
            Quantity("250m".to_string())
        );
        assert_eq!(
            resources.limits.as_ref().unwrap()["memory"],
            Quantity("2Gi".to_string())
        );
    }
}
