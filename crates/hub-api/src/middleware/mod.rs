//! HTTP middleware

pub mod metrics;
pub mod transaction_id;

pub use metrics::{init_metrics, metrics_handler, PrometheusMetrics};
pub use transaction_id::{TransactionId, TransactionIdMiddleware};
