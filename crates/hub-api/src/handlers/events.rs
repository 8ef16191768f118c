//! Callback intake
//!
//! Workers POST benchmark status events here. The endpoint sits behind
//! whatever ingress policy the operator provides; no authentication
//! happens in the service itself.

use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::handlers::helpers::error_response;
use crate::models::{ErrorResponse, UpdateEvaluationJobRequest};
use crate::services::EvaluationService;

/// Apply a benchmark status event to a job
///
/// Rejects malformed events with 400 and events referencing an unknown job
/// or benchmark with 404. Valid events run through the status-merge engine
/// under a transaction; duplicates are accepted and ignored.
#[utoipa::path(
    post,
    path = "/api/v1/evaluations/jobs/{id}/events",
    tag = "Evaluation Jobs",
    params(("id" = String, Path, description = "Job ID")),
    request_body = UpdateEvaluationJobRequest,
    responses(
        (status = 204, description = "Event applied"),
        (status = 400, description = "Malformed event", body = ErrorResponse),
        (status = 404, description = "Job or benchmark unknown", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn post_job_event(
    service: web::Data<EvaluationService>,
    req_http: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateEvaluationJobRequest>,
) -> impl Responder {
    let job_id = path.into_inner();
    let event = &body.benchmark_status_event;

    match service.apply_status_event(&job_id, event).await {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&req_http, &e),
    }
}
