//! Service layer: job lifecycle coordination and external collaborators

pub mod coordinator;
pub mod tracker;

pub use coordinator::EvaluationService;
pub use tracker::{new_tracker, ExperimentTracker, MlflowTracker};
