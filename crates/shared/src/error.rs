//! Error types for the application
//!
//! Every error that crosses a component boundary is a [`ServiceError`]: a
//! kind with a stable machine-readable code and HTTP status, plus a human
//! message. Transactional writers consult [`ServiceError::wants_rollback`]
//! to decide between commit and rollback.

use thiserror::Error;

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error kinds with stable codes and HTTP statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request body or query parameters failed validation
    Validation,
    /// Job, provider, or referenced benchmark does not exist
    NotFound,
    /// Illegal state transition (e.g. cancelling a terminal job)
    Conflict,
    /// HTTP method not supported on this resource
    MethodNotAllowed,
    /// Catalog stub endpoints
    NotImplemented,
    /// SQL or marshalling failure inside the persistence engine
    Database,
    /// Unexpected invariant violation
    Internal,
    /// Experiment tracker or other upstream collaborator failure
    Upstream,
    /// Invalid or missing configuration
    Config,
}

impl ErrorKind {
    /// Stable machine-readable code surfaced in error responses
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Upstream => "UPSTREAM_ERROR",
            ErrorKind::Config => "CONFIGURATION_ERROR",
        }
    }

    /// HTTP status the kind maps to
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Database | ErrorKind::Internal | ErrorKind::Config => 500,
            ErrorKind::Upstream => 502,
        }
    }
}

/// Application error carrying a kind, a message, and a rollback tag
///
/// Service errors commit the surrounding transaction by default so that
/// read-only work done before the failure is preserved; errors produced
/// mid-mutation opt into rollback with [`ServiceError::with_rollback`].
/// Errors converted from `sqlx` or `serde_json` always roll back.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    rollback: bool,
}

impl ServiceError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            rollback: false,
        }
    }

    /// Create a Validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    /// Create a NotFound error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("{} not found: {}", entity.into(), id.into()),
        )
    }

    /// Create a Conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    /// Create a Database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, msg)
    }

    /// Create an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Create an Upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, msg)
    }

    /// Create a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, msg)
    }

    /// Tag this error so the surrounding transaction rolls back
    pub fn with_rollback(mut self) -> Self {
        self.rollback = true;
        self
    }

    /// Whether a transaction observing this error must roll back
    pub fn wants_rollback(&self) -> bool {
        self.rollback
    }

    /// Stable machine-readable code for error responses
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// HTTP status for error responses
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(format!("Database error: {err}")).with_rollback()
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("Serialization error: {err}")).with_rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_stable() {
        assert_eq!(ErrorKind::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::NotFound.code(), "NOT_FOUND");
        assert_eq!(ErrorKind::Conflict.code(), "CONFLICT");
        assert_eq!(ErrorKind::Database.code(), "DATABASE_ERROR");
        assert_eq!(ErrorKind::Upstream.code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_kind_http_statuses() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::MethodNotAllowed.http_status(), 405);
        assert_eq!(ErrorKind::NotImplemented.http_status(), 501);
        assert_eq!(ErrorKind::Database.http_status(), 500);
        assert_eq!(ErrorKind::Upstream.http_status(), 502);
    }

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("Evaluation job", "abc-123");
        assert_eq!(err.to_string(), "Evaluation job not found: abc-123");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_service_errors_commit_by_default() {
        assert!(!ServiceError::validation("bad request").wants_rollback());
        assert!(!ServiceError::not_found("job", "x").wants_rollback());
    }

    #[test]
    fn test_with_rollback_opts_in() {
        let err = ServiceError::not_found("benchmark", "x").with_rollback();
        assert!(err.wants_rollback());
    }

    #[test]
    fn test_plain_errors_always_roll_back() {
        let sql_err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(sql_err.wants_rollback());
        assert_eq!(sql_err.kind, ErrorKind::Database);

        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let svc_err: ServiceError = json_err.into();
        assert!(svc_err.wants_rollback());
        assert_eq!(svc_err.kind, ErrorKind::Internal);
    }
}
