//! Transaction ID middleware
//!
//! Every request carries a correlation id: the `X-Global-Transaction-Id`
//! header when the client sent one, a fresh UUID otherwise. The id is
//! stored in request extensions, echoed on the response, and surfaced as
//! the `trace` field of error bodies.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
};
use uuid::Uuid;

pub const TRANSACTION_ID_HEADER: &str = "x-global-transaction-id";

/// Correlation id stored in request extensions
#[derive(Debug, Clone)]
pub struct TransactionId(pub String);

/// Transaction ID middleware factory
pub struct TransactionIdMiddleware;

impl TransactionIdMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransactionIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for TransactionIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TransactionIdService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TransactionIdService {
            service: Rc::new(service),
        }))
    }
}

pub struct TransactionIdService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for TransactionIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let transaction_id = req
                .headers()
                .get(TRANSACTION_ID_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            req.extensions_mut()
                .insert(TransactionId(transaction_id.clone()));

            let mut res = service.call(req).await?;

            if let Ok(value) = HeaderValue::try_from(&transaction_id) {
                res.headers_mut()
                    .insert(HeaderName::from_static(TRANSACTION_ID_HEADER), value);
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn echo_handler(req: actix_web::HttpRequest) -> HttpResponse {
        let id = req
            .extensions()
            .get::<TransactionId>()
            .map(|t| t.0.clone())
            .unwrap_or_default();
        HttpResponse::Ok().body(id)
    }

    #[actix_web::test]
    async fn test_generates_transaction_id() {
        let app = test::init_service(
            App::new()
                .wrap(TransactionIdMiddleware::new())
                .route("/test", web::get().to(echo_handler)),
        )
        .await;

        let req = test::TestRequest::get().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;

        let header = resp
            .headers()
            .get(TRANSACTION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(header).is_ok());
    }

    #[actix_web::test]
    async fn test_echoes_client_transaction_id() {
        let app = test::init_service(
            App::new()
                .wrap(TransactionIdMiddleware::new())
                .route("/test", web::get().to(echo_handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/test")
            .insert_header(("X-Global-Transaction-Id", "txn-42"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(
            resp.headers()
                .get(TRANSACTION_ID_HEADER)
                .unwrap()
                .to_str()
                .unwrap(),
            "txn-42"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body, "txn-42");
    }
}
