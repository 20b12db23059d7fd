//! Application layer for conclave
//!
//! This crate contains the workflow engine, the retry executor, port
//! definitions, and application configuration. It depends only on the
//! domain layer.

pub mod config;
pub mod ports;
pub mod retry;
pub mod use_cases;

// Re-export commonly used types
pub use config::EngineConfig;
pub use ports::{
    event_subscriber::{EventError, EventStream, EventSubscriber},
    planning_api::{ApiError, PlanningApi},
    workflow_logger::{NoWorkflowLogger, WorkflowLogEntry, WorkflowLogEvent, WorkflowLogger},
};
pub use retry::{RetryError, RetryPolicy, Retryable, retry_with_backoff};
pub use use_cases::workflow::{WorkflowEngine, WorkflowError, WorkflowHandle};
