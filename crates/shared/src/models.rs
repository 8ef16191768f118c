//! Evaluation job aggregate and the JSON entity persisted with it
//!
//! The `evaluations` row embeds one [`JobEntity`]: the immutable
//! [`JobConfig`], the evolving [`JobStatus`], and the accumulated
//! [`JobResults`]. The `status` column is a denormalized copy of
//! `entity.status.state` kept consistent by every writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ServiceError;

/// Tenant tag used until multi-tenancy lands
pub const DEFAULT_TENANT: &str = "default";

/// Stable message codes attached to the overall job status
pub mod codes {
    pub const EVALUATION_JOB_CREATED: &str = "EVALUATION_JOB_CREATED";
    pub const EVALUATION_JOB_UPDATED: &str = "EVALUATION_JOB_UPDATED";
    pub const EVALUATION_JOB_COMPLETED: &str = "EVALUATION_JOB_COMPLETED";
    pub const EVALUATION_JOB_FAILED: &str = "EVALUATION_JOB_FAILED";
    pub const EVALUATION_JOB_PARTIALLY_FAILED: &str = "EVALUATION_JOB_PARTIALLY_FAILED";
    pub const EVALUATION_JOB_CANCELLED: &str = "EVALUATION_JOB_CANCELLED";
}

/// Overall state of an evaluation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    PartiallyFailed,
    Cancelled,
}

impl JobState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::PartiallyFailed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::PartiallyFailed => "partially_failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobState {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "partially_failed" => Ok(JobState::PartiallyFailed),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(ServiceError::validation(format!(
                "Unknown job state: {other}"
            ))),
        }
    }
}

/// State of a single benchmark within a job
///
/// Shares symbols with [`JobState`] but is a distinct type: a benchmark is
/// never `partially_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BenchmarkState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BenchmarkState::Completed | BenchmarkState::Failed | BenchmarkState::Cancelled
        )
    }
}

impl fmt::Display for BenchmarkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BenchmarkState::Pending => "pending",
            BenchmarkState::Running => "running",
            BenchmarkState::Completed => "completed",
            BenchmarkState::Failed => "failed",
            BenchmarkState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BenchmarkState {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BenchmarkState::Pending),
            "running" => Ok(BenchmarkState::Running),
            "completed" => Ok(BenchmarkState::Completed),
            "failed" => Ok(BenchmarkState::Failed),
            "cancelled" => Ok(BenchmarkState::Cancelled),
            other => Err(ServiceError::validation(format!(
                "Unknown benchmark state: {other}"
            ))),
        }
    }
}

/// Reference to the model under evaluation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ModelRef {
    /// Inference endpoint URL
    #[validate(length(min = 1, message = "model url is required"))]
    pub url: String,
    /// Logical model name passed to workers
    #[validate(length(min = 1, message = "model name is required"))]
    pub name: String,
    /// Free-form model configuration forwarded verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub configuration: Option<HashMap<String, Value>>,
}

/// Reference to one benchmark to run, keyed by `(provider_id, id)`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct BenchmarkRef {
    #[validate(length(min = 1, message = "benchmark id is required"))]
    pub id: String,
    #[validate(length(min = 1, message = "benchmark provider_id is required"))]
    pub provider_id: String,
    /// Untyped benchmark parameters, passed through to the worker
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: HashMap<String, Value>,
}

impl BenchmarkRef {
    /// Whether this reference matches the given benchmark key
    pub fn matches(&self, provider_id: &str, id: &str) -> bool {
        self.provider_id == provider_id && self.id == id
    }
}

/// Optional experiment-tracker metadata supplied at creation time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExperimentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

/// Immutable evaluation job configuration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct JobConfig {
    #[validate(nested)]
    pub model: ModelRef,
    /// Ordered, non-empty list of benchmarks to run
    #[validate(
        length(min = 1, message = "at least one benchmark is required"),
        nested,
        custom(function = "validate_unique_benchmarks")
    )]
    pub benchmarks: Vec<BenchmarkRef>,
    /// Per-job override for the worker retry budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<ExperimentMeta>,
}

impl JobConfig {
    /// Whether `(provider_id, id)` appears in the benchmark list
    pub fn contains_benchmark(&self, provider_id: &str, id: &str) -> bool {
        self.benchmarks.iter().any(|b| b.matches(provider_id, id))
    }
}

fn validate_unique_benchmarks(benchmarks: &[BenchmarkRef]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for b in benchmarks {
        if !seen.insert((b.provider_id.as_str(), b.id.as_str())) {
            let mut err = ValidationError::new("duplicate_benchmark");
            err.message = Some(
                format!("duplicate benchmark: ({}, {})", b.provider_id, b.id).into(),
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Human message plus stable code attached to a failed benchmark
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Status of one benchmark within a job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkStatus {
    pub provider_id: String,
    pub id: String,
    pub state: BenchmarkState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorMessage>,
}

/// Overall job status: the aggregate state plus per-benchmark detail
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStatus {
    pub state: JobState,
    pub message: String,
    pub code: String,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkStatus>,
}

/// Result payload reported by one benchmark's worker
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResult {
    pub provider_id: String,
    pub id: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metrics: HashMap<String, Value>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub artifacts: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_path: Option<String>,
}

/// Aggregated results across all benchmarks of a job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobResults {
    pub total_evaluations: u32,
    pub completed_evaluations: u32,
    pub failed_evaluations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_url: Option<String>,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkResult>,
}

impl JobResults {
    fn new(experiment_url: Option<String>) -> Self {
        Self {
            total_evaluations: 0,
            completed_evaluations: 0,
            failed_evaluations: 0,
            experiment_url,
            benchmarks: Vec::new(),
        }
    }
}

/// The JSON document stored in the row's entity column
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobEntity {
    pub config: JobConfig,
    pub status: JobStatus,
    pub results: JobResults,
}

/// A fully materialized evaluation job resource
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvaluationJob {
    pub id: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    pub config: JobConfig,
    pub status: JobStatus,
    pub results: JobResults,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EvaluationJob {
    /// Build a fresh pending job from a validated configuration
    pub fn new(
        config: JobConfig,
        experiment_id: Option<String>,
        experiment_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: DEFAULT_TENANT.to_string(),
            experiment_id,
            status: JobStatus {
                state: JobState::Pending,
                message: "Evaluation job created".to_string(),
                code: codes::EVALUATION_JOB_CREATED.to_string(),
                benchmarks: Vec::new(),
            },
            results: JobResults::new(experiment_url),
            config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reassemble a job from its row columns and decoded entity
    pub fn from_parts(
        id: String,
        tenant_id: String,
        experiment_id: Option<String>,
        entity: JobEntity,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            experiment_id,
            config: entity.config,
            status: entity.status,
            results: entity.results,
            created_at,
            updated_at,
        }
    }

    /// The entity document persisted in the row
    pub fn entity(&self) -> JobEntity {
        JobEntity {
            config: self.config.clone(),
            status: self.status.clone(),
            results: self.results.clone(),
        }
    }
}

/// Status event POSTed by a worker for one benchmark
///
/// `status` stays a string at this layer so unknown states surface as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkStatusEvent {
    pub provider_id: String,
    pub id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub metrics: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub artifacts: Option<HashMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<ErrorMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_path: Option<String>,
}

impl BenchmarkStatusEvent {
    /// Validate required fields and parse the state string
    pub fn validate(&self) -> crate::error::Result<BenchmarkState> {
        if self.provider_id.is_empty() {
            return Err(ServiceError::validation(
                "Status event is missing provider_id",
            ));
        }
        if self.id.is_empty() {
            return Err(ServiceError::validation("Status event is missing id"));
        }
        self.status.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::Validate;

    fn config_with(benchmarks: Vec<BenchmarkRef>) -> JobConfig {
        JobConfig {
            model: ModelRef {
                url: "http://model:8000".to_string(),
                name: "llama".to_string(),
                configuration: None,
            },
            benchmarks,
            retry_attempts: None,
            experiment: None,
        }
    }

    fn benchmark(provider: &str, id: &str) -> BenchmarkRef {
        BenchmarkRef {
            id: id.to_string(),
            provider_id: provider.to_string(),
            parameters: HashMap::new(),
        }
    }

    #[test]
    fn test_job_state_round_trip() {
        for s in [
            "pending",
            "running",
            "completed",
            "failed",
            "partially_failed",
            "cancelled",
        ] {
            let state: JobState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
    }

    #[test]
    fn test_unknown_states_rejected() {
        assert!("exploded".parse::<JobState>().is_err());
        assert!("partially_failed".parse::<BenchmarkState>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(BenchmarkState::Completed.is_terminal());
        assert!(!BenchmarkState::Running.is_terminal());
    }

    #[test]
    fn test_config_requires_benchmarks() {
        let config = config_with(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_duplicate_benchmarks() {
        let config = config_with(vec![
            benchmark("lm_evaluation_harness", "arc_easy"),
            benchmark("lm_evaluation_harness", "arc_easy"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate benchmark"));
    }

    #[test]
    fn test_config_rejects_missing_model_fields() {
        let mut config = config_with(vec![benchmark("ragas", "faithfulness")]);
        config.model.url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        let config = config_with(vec![
            benchmark("lm_evaluation_harness", "arc_easy"),
            benchmark("ragas", "faithfulness"),
        ]);
        assert!(config.validate().is_ok());
        assert!(config.contains_benchmark("ragas", "faithfulness"));
        assert!(!config.contains_benchmark("ragas", "arc_easy"));
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = EvaluationJob::new(
            config_with(vec![benchmark("garak", "prompt_injection")]),
            None,
            Some("http://mlflow/#/experiments/7".to_string()),
        );
        assert_eq!(job.status.state, JobState::Pending);
        assert_eq!(job.status.code, codes::EVALUATION_JOB_CREATED);
        assert_eq!(job.tenant_id, DEFAULT_TENANT);
        assert_eq!(job.results.total_evaluations, 0);
        assert!(job.status.benchmarks.is_empty());
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_entity_round_trip() {
        let job = EvaluationJob::new(config_with(vec![benchmark("guidellm", "latency")]), None, None);
        let encoded = serde_json::to_string(&job.entity()).unwrap();
        let decoded: JobEntity = serde_json::from_str(&encoded).unwrap();
        let restored = EvaluationJob::from_parts(
            job.id.clone(),
            job.tenant_id.clone(),
            None,
            decoded,
            job.created_at,
            job.updated_at,
        );
        assert_eq!(restored.config.benchmarks.len(), 1);
        assert_eq!(restored.status.state, JobState::Pending);
    }

    #[test]
    fn test_event_validation() {
        let mut event = BenchmarkStatusEvent {
            provider_id: "lm_evaluation_harness".to_string(),
            id: "arc_easy".to_string(),
            status: "running".to_string(),
            started_at: None,
            completed_at: None,
            metrics: None,
            artifacts: None,
            error_message: None,
            external_run_id: None,
            logs_path: None,
        };
        assert_eq!(event.validate().unwrap(), BenchmarkState::Running);

        event.status = "launching".to_string();
        assert!(event.validate().is_err());

        event.status = "running".to_string();
        event.provider_id = String::new();
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_event_deserializes_metrics() {
        let event: BenchmarkStatusEvent = serde_json::from_value(json!({
            "provider_id": "lm_evaluation_harness",
            "id": "arc_easy",
            "status": "completed",
            "completed_at": "2025-01-01T00:05:00Z",
            "metrics": {"acc": 0.85}
        }))
        .unwrap();
        assert_eq!(event.metrics.unwrap()["acc"], json!(0.85));
    }
}
