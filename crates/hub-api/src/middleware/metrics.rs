//! Prometheus metrics middleware
//!
//! Records per-request counters and duration histograms with normalized
//! path labels, and exposes the scrape endpoint. Job ids are collapsed to
//! `{id}` so label cardinality stays bounded.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::{
    future::{ready, Ready},
    time::Instant,
};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder once at startup
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("Failed to install Prometheus recorder");

            describe_counter!(
                "http_requests_total",
                "Total number of HTTP requests processed"
            );
            describe_histogram!(
                "http_request_duration_seconds",
                "HTTP request duration in seconds"
            );

            handle
        })
        .clone()
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> HttpResponse {
    let Some(handle) = PROMETHEUS_HANDLE.get() else {
        return HttpResponse::ServiceUnavailable().body("metrics recorder not initialized");
    };
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(handle.render())
}

/// Actix middleware recording request metrics
#[derive(Clone, Default)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for PrometheusMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = PrometheusMetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PrometheusMetricsService { service }))
    }
}

pub struct PrometheusMetricsService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for PrometheusMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = normalize_path(req.path());
        let skip = req.path() == "/metrics" || req.path() == "/api/v1/health";

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;

            match result {
                Ok(response) => {
                    if !skip {
                        record(&method, &path, response.status().as_u16(), start);
                    }
                    Ok(response.map_into_left_body())
                }
                Err(e) => {
                    if !skip {
                        let status = e.as_response_error().status_code().as_u16();
                        record(&method, &path, status, start);
                    }
                    Err(e)
                }
            }
        })
    }
}

fn record(method: &str, path: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels[..]).increment(1);
    histogram!("http_request_duration_seconds", &labels[..]).record(start.elapsed().as_secs_f64());
}

/// Collapse UUID path segments so labels stay low-cardinality
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| {
            let is_uuid =
                part.len() == 36 && part.chars().filter(|c| *c == '-').count() == 4;
            if is_uuid {
                "{id}".to_string()
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().body("ok")
    }

    #[::core::prelude::v1::test]
    fn test_normalize_path_collapses_job_ids() {
        assert_eq!(
            normalize_path(
                "/api/v1/evaluations/jobs/123e4567-e89b-12d3-a456-426614174000/events"
            ),
            "/api/v1/evaluations/jobs/{id}/events"
        );
        assert_eq!(
            normalize_path("/api/v1/evaluations/providers"),
            "/api/v1/evaluations/providers"
        );
    }

    #[actix_web::test]
    async fn test_middleware_passes_requests_through() {
        let app = test::init_service(
            App::new()
                .wrap(PrometheusMetrics::new())
                .route("/test", web::get().to(ok_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
