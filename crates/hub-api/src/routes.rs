//! Route configuration for the API

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::middleware;
use crate::openapi::ApiDoc;

/// Configure all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .service(
                web::scope("/evaluations")
                    .route("/jobs", web::post().to(handlers::create_evaluation_job))
                    .route("/jobs", web::get().to(handlers::list_evaluation_jobs))
                    .route("/jobs/{id}", web::get().to(handlers::get_evaluation_job))
                    .route(
                        "/jobs/{id}",
                        web::delete().to(handlers::delete_evaluation_job),
                    )
                    .route(
                        "/jobs/{id}/events",
                        web::post().to(handlers::post_job_event),
                    )
                    .route("/providers", web::get().to(handlers::list_providers))
                    .route("/providers/{id}", web::get().to(handlers::get_provider))
                    .route("/benchmarks", web::get().to(handlers::list_benchmarks)),
            ),
    )
    .route("/metrics", web::get().to(middleware::metrics_handler))
    .route("/openapi.yaml", web::get().to(handlers::openapi_yaml))
    .service(SwaggerUi::new("/docs/{_:.*}").url("/openapi.json", ApiDoc::openapi()));
}
