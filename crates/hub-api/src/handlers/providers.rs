//! Provider and benchmark catalog handlers

use actix_web::{web, HttpRequest, HttpResponse, Responder};

use shared::error::ServiceError;
use shared::providers::ProviderRegistry;

use crate::handlers::helpers::error_response;
use crate::models::{BenchmarksQuery, BenchmarksResponse, ErrorResponse, ProvidersResponse};

/// List benchmark providers
#[utoipa::path(
    get,
    path = "/api/v1/evaluations/providers",
    tag = "Catalog",
    responses(
        (status = 200, description = "Provider catalog", body = ProvidersResponse)
    )
)]
pub async fn list_providers(registry: web::Data<ProviderRegistry>) -> impl Responder {
    HttpResponse::Ok().json(ProvidersResponse {
        providers: registry.providers().to_vec(),
    })
}

/// Get a single provider
#[utoipa::path(
    get,
    path = "/api/v1/evaluations/providers/{id}",
    tag = "Catalog",
    params(("id" = String, Path, description = "Provider ID")),
    responses(
        (status = 200, description = "Provider descriptor", body = shared::providers::ProviderDescriptor),
        (status = 404, description = "Provider not found", body = ErrorResponse)
    )
)]
pub async fn get_provider(
    registry: web::Data<ProviderRegistry>,
    req_http: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    let id = path.into_inner();
    match registry.get(&id) {
        Some(provider) => HttpResponse::Ok().json(provider),
        None => error_response(&req_http, &ServiceError::not_found("Provider", &id)),
    }
}

/// List benchmarks across providers
///
/// All filters are conjunctive; `tags` takes a comma-separated list and
/// every tag must match.
#[utoipa::path(
    get,
    path = "/api/v1/evaluations/benchmarks",
    tag = "Catalog",
    params(
        ("provider_id" = Option<String>, Query, description = "Restrict to one provider"),
        ("category" = Option<String>, Query, description = "Benchmark category"),
        ("tags" = Option<String>, Query, description = "Comma-separated tags, all required"),
        ("id" = Option<String>, Query, description = "Benchmark id")
    ),
    responses(
        (status = 200, description = "Benchmark catalog", body = BenchmarksResponse)
    )
)]
pub async fn list_benchmarks(
    registry: web::Data<ProviderRegistry>,
    query: web::Query<BenchmarksQuery>,
) -> impl Responder {
    HttpResponse::Ok().json(BenchmarksResponse {
        benchmarks: registry.benchmarks(&query.to_filter()),
    })
}
