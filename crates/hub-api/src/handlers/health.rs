//! Health check and documentation endpoints

use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::models::HealthResponse;
use crate::openapi::ApiDoc;
use crate::storage::EvaluationStorage;

/// Health check endpoint
///
/// Reports service liveness and storage connectivity.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
pub async fn health_check(storage: web::Data<Arc<dyn EvaluationStorage>>) -> impl Responder {
    let database = match storage.ping().await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let response = HealthResponse {
        status: if database == "connected" {
            "healthy"
        } else {
            "unhealthy"
        }
        .to_string(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if database == "connected" {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// OpenAPI document rendered as YAML
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(doc) => HttpResponse::Ok()
            .content_type("application/yaml")
            .body(doc),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI document");
            HttpResponse::InternalServerError().finish()
        }
    }
}
