//! Logging infrastructure: structured workflow journal.
//!
//! Provides [`JsonlWorkflowLogger`], a JSONL file writer that implements
//! the [`WorkflowLogger`](conclave_application::WorkflowLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlWorkflowLogger;
