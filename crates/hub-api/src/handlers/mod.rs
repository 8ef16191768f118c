//! Request handlers for API endpoints

pub mod events;
pub mod health;
pub mod helpers;
pub mod jobs;
pub mod providers;

// Re-export handlers so route configuration and the OpenAPI document can
// reference them (the __path_* types generated by utoipa come along).
pub use events::*;
pub use health::*;
pub use jobs::*;
pub use providers::*;
