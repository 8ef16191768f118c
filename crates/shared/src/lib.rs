//! Shared library for the Eval Hub services
//!
//! This crate provides the pieces every component agrees on:
//! - The evaluation job aggregate and its persisted JSON entity
//! - The status-merge engine that folds worker events into job state
//! - The worker task contract (payload and environment variables)
//! - The provider registry
//! - Layered YAML configuration
//! - The service error taxonomy
//! - Tracing bootstrap and process signal files

pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod providers;
pub mod signals;
pub mod tasks;

// Re-export commonly used types
pub use config::Settings;
pub use error::{ErrorKind, Result, ServiceError};
pub use models::{BenchmarkStatusEvent, EvaluationJob, JobConfig, JobState};
pub use providers::ProviderRegistry;

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shared=debug,hub_api=debug,eval_runtime=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
