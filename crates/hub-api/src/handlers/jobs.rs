//! Evaluation job handlers

use actix_web::{web, HttpRequest, HttpResponse, Responder};

use shared::models::JobConfig;

use crate::handlers::helpers::error_response;
use crate::models::{
    DeleteJobQuery, ErrorResponse, JobListResponse, ListJobsQuery, Page,
};
use crate::services::EvaluationService;

/// Create an evaluation job
///
/// Validates the configuration, persists the pending job, and dispatches
/// one worker per benchmark asynchronously. Returns 202 with the created
/// resource; poll the job to observe progress.
#[utoipa::path(
    post,
    path = "/api/v1/evaluations/jobs",
    tag = "Evaluation Jobs",
    request_body = JobConfig,
    responses(
        (status = 202, description = "Job accepted", body = shared::models::EvaluationJob),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn create_evaluation_job(
    service: web::Data<EvaluationService>,
    req_http: HttpRequest,
    body: web::Json<JobConfig>,
) -> impl Responder {
    match service.create_evaluation(body.into_inner()).await {
        Ok(job) => HttpResponse::Accepted().json(job),
        Err(e) => error_response(&req_http, &e),
    }
}

/// List evaluation jobs
///
/// Returns a page of jobs ordered by id descending. `status_filter`
/// restricts both the items and the total count.
#[utoipa::path(
    get,
    path = "/api/v1/evaluations/jobs",
    tag = "Evaluation Jobs",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum items per page (1-100)"),
        ("offset" = Option<i64>, Query, description = "Number of items to skip"),
        ("status_filter" = Option<String>, Query, description = "Overall state to filter by")
    ),
    responses(
        (status = 200, description = "Page of jobs", body = JobListResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
pub async fn list_evaluation_jobs(
    service: web::Data<EvaluationService>,
    req_http: HttpRequest,
    query: web::Query<ListJobsQuery>,
) -> impl Responder {
    let status_filter = match query.validate() {
        Ok(filter) => filter,
        Err(e) => return error_response(&req_http, &e),
    };

    match service
        .list_jobs(query.limit, query.offset, status_filter)
        .await
    {
        Ok((items, total)) => HttpResponse::Ok().json(JobListResponse {
            page: Page {
                limit: query.limit,
                offset: query.offset,
                total,
            },
            items,
        }),
        Err(e) => error_response(&req_http, &e),
    }
}

/// Get an evaluation job
#[utoipa::path(
    get,
    path = "/api/v1/evaluations/jobs/{id}",
    tag = "Evaluation Jobs",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job resource", body = shared::models::EvaluationJob),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
pub async fn get_evaluation_job(
    service: web::Data<EvaluationService>,
    req_http: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    match service.get_job(&path.into_inner()).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(e) => error_response(&req_http, &e),
    }
}

/// Delete an evaluation job
///
/// `hard_delete=false` (the default) cancels the job; cancelling an
/// already terminal job is a conflict. `hard_delete=true` removes the row
/// and cleans worker resources up best-effort.
#[utoipa::path(
    delete,
    path = "/api/v1/evaluations/jobs/{id}",
    tag = "Evaluation Jobs",
    params(
        ("id" = String, Path, description = "Job ID"),
        ("hard_delete" = Option<bool>, Query, description = "Remove the row instead of cancelling")
    ),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job already terminal", body = ErrorResponse)
    )
)]
pub async fn delete_evaluation_job(
    service: web::Data<EvaluationService>,
    req_http: HttpRequest,
    path: web::Path<String>,
    query: web::Query<DeleteJobQuery>,
) -> impl Responder {
    match service.delete_job(&path.into_inner(), query.hard_delete).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&req_http, &e),
    }
}
