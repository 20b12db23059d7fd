//! Workflow domain
//!
//! The explicit state struct driven by the engine's single writer, the
//! inbound event kinds it merges, and its lifecycle status.

pub mod event;
pub mod state;
pub mod status;

pub use event::WorkflowEvent;
pub use state::{ApplyOutcome, DEFAULT_MAX_EVENTS, WorkflowState};
pub use status::WorkflowStatus;
