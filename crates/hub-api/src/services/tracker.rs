//! Experiment tracker client
//!
//! Optional integration with an MLflow-compatible tracking server. The
//! coordinator creates one experiment per job when a tracker is
//! configured; tracker failures degrade the job to running without
//! experiment metadata rather than failing creation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use shared::config::TrackerSettings;
use shared::error::{Result, ServiceError};

/// A created experiment: external id plus a browsable URL
#[derive(Debug, Clone)]
pub struct Experiment {
    pub id: String,
    pub url: String,
}

/// Experiment tracking seam
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    async fn create_experiment(
        &self,
        name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<Experiment>;
}

/// MLflow REST client
pub struct MlflowTracker {
    client: reqwest::Client,
    base_url: String,
}

impl MlflowTracker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[async_trait]
impl ExperimentTracker for MlflowTracker {
    async fn create_experiment(
        &self,
        name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<Experiment> {
        let tags: Vec<serde_json::Value> = tags
            .map(|t| {
                t.iter()
                    .map(|(key, value)| json!({"key": key, "value": value}))
                    .collect()
            })
            .unwrap_or_default();

        let response = self
            .client
            .post(format!("{}/api/2.0/mlflow/experiments/create", self.base_url))
            .json(&json!({"name": name, "tags": tags}))
            .send()
            .await
            .map_err(|e| ServiceError::upstream(format!("Experiment tracker unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ServiceError::upstream(format!(
                "Experiment tracker returned {}",
                response.status()
            )));
        }

        let body: CreateExperimentResponse = response.json().await.map_err(|e| {
            ServiceError::upstream(format!("Invalid experiment tracker response: {e}"))
        })?;

        Ok(Experiment {
            url: format!("{}/#/experiments/{}", self.base_url, body.experiment_id),
            id: body.experiment_id,
        })
    }
}

/// Build the tracker selected by configuration, if any
pub fn new_tracker(settings: &TrackerSettings) -> Result<Option<std::sync::Arc<dyn ExperimentTracker>>> {
    if !settings.enabled {
        return Ok(None);
    }
    let base_url = settings.base_url.clone().ok_or_else(|| {
        ServiceError::config("tracker.enabled requires tracker.base_url to be set")
    })?;
    Ok(Some(std::sync::Arc::new(MlflowTracker::new(base_url))))
}
