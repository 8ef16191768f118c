//! Worker task contract
//!
//! [`EvaluationTask`] is the JSON payload handed to every worker, serialized
//! into the `EVAL_TASK_SPEC` environment variable alongside the flat
//! variables in [`env_keys`]. Workers report back by POSTing status events
//! to `{callback_url}/api/v1/evaluations/jobs/{id}/events`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::models::ModelRef;

/// Environment variable the hub reads its own callback base URL from
pub const CALLBACK_URL_ENV: &str = "EVAL_HUB_CALLBACK_URL";

/// Worker retry budget when neither the job nor the deployment overrides it
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Environment variable names of the worker contract
pub mod env_keys {
    pub const JOB_ID: &str = "EVAL_JOB_ID";
    pub const BENCHMARK_ID: &str = "EVAL_BENCHMARK_ID";
    pub const MODEL_URL: &str = "EVAL_MODEL_URL";
    pub const MODEL_NAME: &str = "EVAL_MODEL_NAME";
    pub const CALLBACK_URL: &str = "EVAL_CALLBACK_URL";
    pub const TIMEOUT_SECONDS: &str = "EVAL_TIMEOUT_SECONDS";
    pub const RETRY_ATTEMPTS: &str = "EVAL_RETRY_ATTEMPTS";
    pub const TASK_SPEC: &str = "EVAL_TASK_SPEC";
}

/// Per-benchmark payload sent to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTask {
    /// Evaluation job id
    pub id: String,
    pub benchmark_id: String,
    /// Benchmark parameters minus the promoted fields
    #[serde(default)]
    pub benchmark_config: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_examples: Option<i64>,
    pub callback_url: String,
    pub model: ModelRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i64>,
    pub retry_attempts: u32,
}

impl EvaluationTask {
    /// The full callback endpoint workers POST status events to
    pub fn events_url(&self) -> String {
        format!(
            "{}/api/v1/evaluations/jobs/{}/events",
            self.callback_url.trim_end_matches('/'),
            self.id
        )
    }
}

/// Coerce a heterogeneous numeric parameter to an integer.
///
/// Benchmark parameters are untyped; `num_examples` arrives as whatever
/// integer or float representation the client's serializer produced.
/// Non-numeric values and floats with a fractional part are rejected.
pub fn coerce_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).ok()
            } else {
                n.as_f64().and_then(|f| {
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Some(f as i64)
                    } else {
                        None
                    }
                })
            }
        }
        _ => None,
    }
}
