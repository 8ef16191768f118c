//! Common handler helpers
//!
//! Every error response carries `{message, code, trace}`. Database and
//! internal failures are logged with their real cause but reach the
//! client with a generic message.

use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use uuid::Uuid;

use shared::error::{ErrorKind, ServiceError};

use crate::middleware::transaction_id::{TransactionId, TRANSACTION_ID_HEADER};
use crate::models::ErrorResponse;

/// Correlation id for the current request.
///
/// Prefers the middleware extension, falls back to the raw header, and
/// generates a UUID when neither is present (e.g. in JSON error handlers
/// that run before the middleware extension is readable).
pub fn trace_id(req: &HttpRequest) -> String {
    if let Some(id) = req.extensions().get::<TransactionId>() {
        return id.0.clone();
    }
    req.headers()
        .get(TRANSACTION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Convert a service error into its HTTP response
pub fn error_response(req: &HttpRequest, err: &ServiceError) -> HttpResponse {
    let trace = trace_id(req);
    let status = actix_web::http::StatusCode::from_u16(err.http_status())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);

    let message = match err.kind {
        ErrorKind::Database | ErrorKind::Internal | ErrorKind::Config => {
            tracing::error!(trace = %trace, error = %err, "Request failed");
            "An internal error occurred".to_string()
        }
        _ => {
            tracing::debug!(trace = %trace, error = %err, "Request rejected");
            err.to_string()
        }
    };

    HttpResponse::build(status).json(ErrorResponse::new(message, err.code(), trace))
}

/// 400 response used by the JSON extractor error handler
pub fn malformed_body_response(req: &HttpRequest, detail: &str) -> HttpResponse {
    error_response(
        req,
        &ServiceError::validation(format!("Invalid request body: {detail}")),
    )
}

/// JSON extractor error handler keeping the `{message, code, trace}` shape
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    req: &HttpRequest,
) -> actix_web::Error {
    let response = malformed_body_response(req, &err.to_string());
    actix_web::error::InternalError::from_response(err, response).into()
}

/// Query extractor error handler keeping the `{message, code, trace}` shape
pub fn query_error_handler(
    err: actix_web::error::QueryPayloadError,
    req: &HttpRequest,
) -> actix_web::Error {
    let response = error_response(
        req,
        &ServiceError::validation(format!("Invalid query parameters: {err}")),
    );
    actix_web::error::InternalError::from_response(err, response).into()
}
