//! OpenAPI documentation configuration

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

/// OpenAPI documentation for the Eval Hub API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Eval Hub API",
        version = "1.0.0",
        description = "Evaluation orchestration service: accepts requests to run benchmarks \
against a target language model, dispatches provider-specific workers, and exposes the \
evaluation job lifecycle. The service is a control plane; workers report progress back \
through the job events callback.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Development server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Evaluation Jobs", description = "Evaluation job lifecycle and worker callbacks"),
        (name = "Catalog", description = "Benchmark provider catalog")
    ),
    paths(
        handlers::health_check,
        handlers::create_evaluation_job,
        handlers::list_evaluation_jobs,
        handlers::get_evaluation_job,
        handlers::delete_evaluation_job,
        handlers::post_job_event,
        handlers::list_providers,
        handlers::get_provider,
        handlers::list_benchmarks,
    ),
    components(schemas(
        shared::models::EvaluationJob,
        shared::models::JobConfig,
        shared::models::ModelRef,
        shared::models::BenchmarkRef,
        shared::models::ExperimentMeta,
        shared::models::JobStatus,
        shared::models::JobState,
        shared::models::BenchmarkStatus,
        shared::models::BenchmarkState,
        shared::models::ErrorMessage,
        shared::models::JobResults,
        shared::models::BenchmarkResult,
        shared::models::BenchmarkStatusEvent,
        shared::providers::ProviderDescriptor,
        shared::providers::ProviderRuntimeSpec,
        shared::providers::BenchmarkDescriptor,
        shared::providers::BenchmarkListing,
        models::ErrorResponse,
        models::Page,
        models::JobListResponse,
        models::UpdateEvaluationJobRequest,
        models::ProvidersResponse,
        models::BenchmarksResponse,
        models::HealthResponse,
    ))
)]
pub struct ApiDoc;
