//! Common test utilities for integration tests
//!
//! Builds the full service against an in-memory SQLite store and a
//! recording runtime, so tests drive the real HTTP surface without a
//! container orchestrator.

use std::sync::{Arc, Mutex};

use actix_web::web;
use async_trait::async_trait;

use eval_runtime::{Runtime, RuntimeResult};
use hub_api::services::EvaluationService;
use hub_api::storage::{EvaluationStorage, SqliteStorage};
use shared::config::DatabaseSettings;
use shared::models::EvaluationJob;
use shared::providers::ProviderRegistry;

pub const CATALOG: &str = r#"
providers:
  - id: lm_evaluation_harness
    name: LM Evaluation Harness
    runtime:
      image: quay.io/eval-hub/lm-eval:latest
    benchmarks:
      - id: arc_easy
        category: reasoning
        tags: [multiple_choice]
        parameters:
          num_fewshot: 0
      - id: hellaswag
        category: reasoning
  - id: garak
    runtime:
      image: quay.io/eval-hub/garak:latest
    benchmarks:
      - id: prompt_injection
        category: security
"#;

/// Runtime stub recording which jobs were dispatched
pub struct RecordingRuntime {
    pub dispatched: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Runtime for RecordingRuntime {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn run_evaluation_job(&self, job: &EvaluationJob) -> RuntimeResult<()> {
        self.dispatched.lock().unwrap().push(job.id.clone());
        Ok(())
    }
}

/// Everything a test needs to assemble the actix application
pub struct TestContext {
    pub service: web::Data<EvaluationService>,
    pub storage_data: web::Data<Arc<dyn EvaluationStorage>>,
    pub registry_data: web::Data<ProviderRegistry>,
    pub dispatched: Arc<Mutex<Vec<String>>>,
}

impl TestContext {
    pub async fn new() -> Self {
        let settings = DatabaseSettings {
            driver: "sqlite".to_string(),
            url: "sqlite::memory:".to_string(),
            // A single connection keeps the in-memory database alive and
            // shared across the whole test.
            max_open_conns: 1,
            max_idle_conns: 1,
            conn_max_lifetime_seconds: 600,
        };
        let storage: Arc<dyn EvaluationStorage> = Arc::new(
            SqliteStorage::connect(&settings)
                .await
                .expect("sqlite storage"),
        );

        let registry = Arc::new(ProviderRegistry::from_yaml(CATALOG).expect("catalog"));
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let runtime = Arc::new(RecordingRuntime {
            dispatched: Arc::clone(&dispatched),
        });

        let service = web::Data::new(EvaluationService::new(
            Arc::clone(&storage),
            runtime,
            None,
        ));

        Self {
            service,
            storage_data: web::Data::new(storage),
            registry_data: web::Data::from(registry),
            dispatched,
        }
    }
}

/// App assembly shared by every integration test
#[macro_export]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(hub_api::middleware::TransactionIdMiddleware::new())
                .app_data(
                    actix_web::web::JsonConfig::default()
                        .error_handler(hub_api::handlers::helpers::json_error_handler),
                )
                .app_data(
                    actix_web::web::QueryConfig::default()
                        .error_handler(hub_api::handlers::helpers::query_error_handler),
                )
                .app_data($ctx.service.clone())
                .app_data($ctx.storage_data.clone())
                .app_data($ctx.registry_data.clone())
                .configure(hub_api::routes::configure),
        )
        .await
    };
}
